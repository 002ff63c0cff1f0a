//! Per-player credit ledger.
//!
//! Players get an entry lazily, at the starting balance, the first time
//! credits move for them. The whole map is persisted as a JSON object of
//! steam id → balance.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::storage;
use crate::types::{Credits, SteamId};

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    balances: BTreeMap<SteamId, Credits>,
    starting_credits: Credits,
}

impl Ledger {
    pub fn new(starting_credits: Credits) -> Self {
        Self::from_balances(BTreeMap::new(), starting_credits)
    }

    pub fn from_balances(balances: BTreeMap<SteamId, Credits>, starting_credits: Credits) -> Self {
        Self {
            balances,
            starting_credits,
        }
    }

    /// Load from disk. A missing or malformed file yields an empty ledger;
    /// new players then start at the default balance.
    pub fn load(path: &Path, starting_credits: Credits) -> Self {
        match storage::load_json::<BTreeMap<SteamId, Credits>>(path) {
            Ok(Some(balances)) => {
                info!(players = balances.len(), path = %path.display(), "Loaded credits");
                Self::from_balances(balances, starting_credits)
            }
            Ok(None) => Self::new(starting_credits),
            Err(e) => {
                error!(error = %e, path = %path.display(), "Could not load credits, starting empty");
                Self::new(starting_credits)
            }
        }
    }

    /// Rewrite the whole ledger file.
    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_json(path, &self.balances)?;
        info!(players = self.balances.len(), path = %path.display(), "Credits saved");
        Ok(())
    }

    /// Current balance, or the starting balance for players with no entry.
    pub fn balance(&self, player: SteamId) -> Credits {
        self.balances
            .get(&player)
            .copied()
            .unwrap_or(self.starting_credits)
    }

    pub fn contains(&self, player: SteamId) -> bool {
        self.balances.contains_key(&player)
    }

    /// Balance entry, created at the starting balance if absent.
    pub fn entry(&mut self, player: SteamId) -> &mut Credits {
        self.balances.entry(player).or_insert(self.starting_credits)
    }

    /// Balances saturate at the `Credits` bounds instead of wrapping.
    pub fn debit(&mut self, player: SteamId, amount: Credits) {
        let balance = self.entry(player);
        match balance.checked_sub(amount) {
            Some(next) => *balance = next,
            None => {
                warn!(player, amount, balance = *balance, "Debit clamped at the minimum balance");
                *balance = balance.saturating_sub(amount);
            }
        }
    }

    pub fn credit(&mut self, player: SteamId, amount: Credits) {
        let balance = self.entry(player);
        match balance.checked_add(amount) {
            Some(next) => *balance = next,
            None => {
                warn!(player, amount, balance = *balance, "Credit clamped at the maximum balance");
                *balance = balance.saturating_add(amount);
            }
        }
    }

    pub fn balances(&self) -> &BTreeMap<SteamId, Credits> {
        &self.balances
    }

    pub fn starting_credits(&self) -> Credits {
        self.starting_credits
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
