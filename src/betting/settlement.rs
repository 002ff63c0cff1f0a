//! Pot settlement.
//!
//! Given the wagers active when a match ends and the winning team, works
//! out what every bettor gets back. Stakes were already debited when the
//! betting window closed, so a payout is the full amount credited back:
//!
//! - everyone on the winner: stakes are returned, nobody profits
//! - everyone on the loser: nothing is paid, stakes stay forfeited
//! - mixed: winners split the pot in proportion to their stake,
//!   `payout = round(pot * stake / W)` with `W` the winning stake total
//!
//! Rounding follows the configured [`RoundingPolicy`]. Rounding half-way
//! cases up can push the total past the pot; the excess is taken back one
//! credit at a time from the winners rounded up the most (lowest steam id
//! first on ties), so payouts never exceed the pot.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

use crate::types::{Credits, SteamId, Team};

// ---------------------------------------------------------------------------
// Wagers and rounding
// ---------------------------------------------------------------------------

/// One player's stake on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub team: Team,
    pub amount: Credits,
}

impl Wager {
    pub fn new(team: Team, amount: Credits) -> Self {
        Self { team, amount }
    }
}

/// How fractional proportional payouts become whole credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Round half to even (banker's rounding).
    #[default]
    HalfEven,
    /// Round half away from zero.
    HalfUp,
    /// Always round down.
    Floor,
}

impl RoundingPolicy {
    fn strategy(&self) -> RoundingStrategy {
        match self {
            RoundingPolicy::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingPolicy::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingPolicy::Floor => RoundingStrategy::ToZero,
        }
    }

    /// Round to a whole number of credits.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(0, self.strategy())
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingPolicy::HalfEven => write!(f, "half_even"),
            RoundingPolicy::HalfUp => write!(f, "half_up"),
            RoundingPolicy::Floor => write!(f, "floor"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settlement result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Empty pot, nothing to distribute.
    NoBets,
    /// Every wager was on the winner; stakes are refunded.
    AllWon,
    /// Every wager was on the loser; stakes stay forfeited.
    AllLost,
    /// Winners split the pot.
    Split,
}

/// One bettor's line in the settlement report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEntry {
    pub player: SteamId,
    pub team: Team,
    pub stake: Credits,
    /// Credited back at settlement.
    pub payout: Credits,
    /// Net change over the whole window: `payout - stake`.
    pub delta: Credits,
}

impl SettlementEntry {
    pub fn won(&self) -> bool {
        self.payout > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: Outcome,
    pub winner: Team,
    pub pot: Credits,
    /// Sum of the stakes on the winning team.
    pub winning_stake: Credits,
    /// Winners first, then losers; ascending steam id within each group.
    pub entries: Vec<SettlementEntry>,
}

impl Settlement {
    /// Total credited back to bettors.
    pub fn total_paid(&self) -> Credits {
        saturating_sum(self.entries.iter().map(|e| e.payout))
    }

    /// Credits of the pot nobody received (rounding remainder or
    /// forfeited stakes when everyone lost).
    pub fn unallocated(&self) -> Credits {
        self.pot - self.total_paid()
    }

    pub fn payout(&self, player: SteamId) -> Credits {
        self.entries
            .iter()
            .find(|e| e.player == player)
            .map(|e| e.payout)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Sum of all stakes, saturating at `Credits::MAX`.
pub fn pot(wagers: &BTreeMap<SteamId, Wager>) -> Credits {
    saturating_sum(wagers.values().map(|w| w.amount))
}

fn saturating_sum(amounts: impl Iterator<Item = Credits>) -> Credits {
    let mut clamped = false;
    let total = amounts.fold(0 as Credits, |acc, amount| {
        acc.checked_add(amount).unwrap_or_else(|| {
            clamped = true;
            acc.saturating_add(amount)
        })
    });
    if clamped {
        warn!(total, "Stake total clamped at the maximum");
    }
    total
}

/// Compute every bettor's payout. Pure: the caller applies the payouts.
pub fn settle(
    wagers: &BTreeMap<SteamId, Wager>,
    winner: Team,
    rounding: RoundingPolicy,
) -> Settlement {
    let pot = pot(wagers);
    let winning_stake = saturating_sum(
        wagers
            .values()
            .filter(|w| w.team == winner)
            .map(|w| w.amount),
    );

    let teams: BTreeSet<Team> = wagers.values().map(|w| w.team).collect();
    let outcome = if pot == 0 {
        Outcome::NoBets
    } else if !teams.contains(&winner.opposite()) {
        Outcome::AllWon
    } else if !teams.contains(&winner) || winning_stake == 0 {
        Outcome::AllLost
    } else {
        Outcome::Split
    };

    let payouts: BTreeMap<SteamId, Credits> = match outcome {
        Outcome::NoBets | Outcome::AllLost => BTreeMap::new(),
        Outcome::AllWon => wagers.iter().map(|(id, w)| (*id, w.amount)).collect(),
        Outcome::Split => split_pot(wagers, winner, pot, winning_stake, rounding),
    };

    let mut entries: Vec<SettlementEntry> = wagers
        .iter()
        .map(|(id, w)| {
            let payout = payouts.get(id).copied().unwrap_or(0);
            SettlementEntry {
                player: *id,
                team: w.team,
                stake: w.amount,
                payout,
                delta: payout.saturating_sub(w.amount),
            }
        })
        .collect();
    // stable: ids stay ascending within each group
    entries.sort_by_key(|e| e.team != winner);

    Settlement {
        outcome,
        winner,
        pot,
        winning_stake,
        entries,
    }
}

fn split_pot(
    wagers: &BTreeMap<SteamId, Wager>,
    winner: Team,
    pot: Credits,
    winning_stake: Credits,
    rounding: RoundingPolicy,
) -> BTreeMap<SteamId, Credits> {
    let pot_dec = Decimal::from(pot);
    let total = Decimal::from(winning_stake);

    // (player, payout, how far rounding moved it up)
    let mut shares: Vec<(SteamId, Credits, Decimal)> = wagers
        .iter()
        .filter(|(_, w)| w.team == winner)
        .map(|(id, w)| {
            let stake = Decimal::from(w.amount);
            let exact = match pot_dec.checked_mul(stake) {
                Some(product) => product / total,
                None => stake / total * pot_dec,
            };
            let rounded = rounding.round(exact);
            (*id, rounded.to_i64().unwrap_or(0), rounded - exact)
        })
        .collect();

    let mut excess = saturating_sum(shares.iter().map(|(_, p, _)| *p)).saturating_sub(pot);
    if excess > 0 {
        shares.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        while excess > 0 {
            let before = excess;
            for share in shares.iter_mut() {
                if excess == 0 {
                    break;
                }
                if share.1 > 0 {
                    share.1 -= 1;
                    excess -= 1;
                }
            }
            if excess == before {
                break;
            }
        }
    }

    shares.into_iter().map(|(id, payout, _)| (id, payout)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
