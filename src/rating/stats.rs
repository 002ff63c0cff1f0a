//! Per game type player statistics: rating, wins and losses, kills and
//! deaths.
//!
//! Persisted as `{game_type: {steam_id: [mu, sigma, wins, losses, kills,
//! deaths]}}`. Files written before kill tracking have four-column rows.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{error, info};

use super::trueskill::{MatchResult, Rating, TrueSkill};
use crate::types::{Player, SteamId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStats", into = "RawStats")]
pub struct PlayerRecord {
    pub rating: Rating,
    pub wins: u64,
    pub losses: u64,
    pub kills: u64,
    pub deaths: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawStats {
    Current(f64, f64, u64, u64, u64, u64),
    Legacy(f64, f64, u64, u64),
}

impl From<RawStats> for PlayerRecord {
    fn from(raw: RawStats) -> Self {
        let (mu, sigma, wins, losses, kills, deaths) = match raw {
            RawStats::Current(m, s, w, l, k, d) => (m, s, w, l, k, d),
            RawStats::Legacy(m, s, w, l) => (m, s, w, l, 0, 0),
        };
        PlayerRecord {
            rating: Rating::new(mu, sigma),
            wins,
            losses,
            kills,
            deaths,
        }
    }
}

impl From<PlayerRecord> for RawStats {
    fn from(r: PlayerRecord) -> Self {
        RawStats::Current(r.rating.mu, r.rating.sigma, r.wins, r.losses, r.kills, r.deaths)
    }
}

impl PlayerRecord {
    pub fn new(rating: Rating) -> Self {
        Self {
            rating,
            wins: 0,
            losses: 0,
            kills: 0,
            deaths: 0,
        }
    }

    /// Wins per loss, zero before the first loss.
    pub fn win_ratio(&self) -> f64 {
        ratio(self.wins, self.losses)
    }

    pub fn kill_ratio(&self) -> f64 {
        ratio(self.kills, self.deaths)
    }
}

fn ratio(a: u64, b: u64) -> f64 {
    if b > 0 {
        a as f64 / b as f64
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Stats database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsDb {
    game_types: BTreeMap<String, BTreeMap<SteamId, PlayerRecord>>,
}

impl StatsDb {
    /// Load from disk. A missing or malformed file yields empty stats.
    pub fn load(path: &Path) -> Self {
        match crate::storage::load_json::<StatsDb>(path) {
            Ok(Some(db)) => {
                info!(game_types = db.game_types.len(), path = %path.display(), "Loaded ratings");
                db
            }
            Ok(None) => Self::default(),
            Err(e) => {
                error!(error = %e, path = %path.display(), "Could not load ratings, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::storage::save_json(path, self)
    }

    pub fn get(&self, game_type: &str, player: SteamId) -> Option<&PlayerRecord> {
        self.game_types.get(game_type)?.get(&player)
    }

    /// Rating of `player`, the environment default if unrated.
    pub fn rating(&self, env: &TrueSkill, game_type: &str, player: SteamId) -> Rating {
        self.get(game_type, player)
            .map(|r| r.rating)
            .unwrap_or_else(|| env.rating())
    }

    /// Record entry, created with a fresh rating if absent.
    pub fn entry(&mut self, env: &TrueSkill, game_type: &str, player: SteamId) -> &mut PlayerRecord {
        self.game_types
            .entry(game_type.to_string())
            .or_default()
            .entry(player)
            .or_insert_with(|| PlayerRecord::new(env.rating()))
    }

    /// Every rated player of a game type.
    pub fn players(&self, game_type: &str) -> Vec<(SteamId, PlayerRecord)> {
        self.game_types
            .get(game_type)
            .map(|m| m.iter().map(|(id, r)| (*id, *r)).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.game_types.values().all(|m| m.is_empty())
    }

    /// Fold a finished match into the stats: wins and losses, kills and
    /// deaths, then the TrueSkill update. Returns each player's exposure
    /// change, red first.
    ///
    /// A team only gets a win with the strictly higher score, so a tie is
    /// a loss for both sides while the ratings treat it as a draw.
    pub fn record_match(
        &mut self,
        env: &TrueSkill,
        game_type: &str,
        red: &[Player],
        blue: &[Player],
        red_score: i64,
        blue_score: i64,
    ) -> Vec<(SteamId, f64)> {
        let result = MatchResult::from_scores(red_score, blue_score);

        // a player listed twice is only counted once
        let mut seen = HashSet::new();
        let red: Vec<&Player> = red.iter().filter(|p| seen.insert(p.steam_id)).collect();
        let blue: Vec<&Player> = blue.iter().filter(|p| seen.insert(p.steam_id)).collect();

        for (team, won) in [
            (&red, result == MatchResult::Won),
            (&blue, result == MatchResult::Lost),
        ] {
            for p in team.iter() {
                let record = self.entry(env, game_type, p.steam_id);
                if won {
                    record.wins += 1;
                } else {
                    record.losses += 1;
                }
                record.kills = record.kills.saturating_add(p.stats.kills);
                record.deaths = record.deaths.saturating_add(p.stats.deaths);
            }
        }

        let ratings = |team: &[&Player]| -> Vec<Rating> {
            team.iter()
                .map(|p| self.rating(env, game_type, p.steam_id))
                .collect()
        };
        let (new_red, new_blue) = env.rate(&ratings(&red), &ratings(&blue), result);

        let mut deltas = Vec::with_capacity(red.len() + blue.len());
        for (team, rated) in [(&red, new_red), (&blue, new_blue)] {
            for (p, rating) in team.iter().zip(rated) {
                let record = self.entry(env, game_type, p.steam_id);
                deltas.push((p.steam_id, rating.exposure() - record.rating.exposure()));
                record.rating = rating;
            }
        }
        deltas
    }
}
