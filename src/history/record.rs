//! Match records and the team-history queries over them.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

use crate::storage;
use crate::types::SteamId;

/// ISO week of `date` as `"YYYY-WW"`.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-{:02}", week.year(), week.week())
}

/// One finished match. Team id lists are kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "RawRecord")]
pub struct MatchRecord {
    pub week: String,
    pub map: String,
    pub game_type: String,
    pub red: Vec<SteamId>,
    pub blue: Vec<SteamId>,
    pub red_score: i64,
    pub blue_score: i64,
}

/// On-disk shape: a flat array. Older files have no map column.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Current(String, String, String, Vec<SteamId>, Vec<SteamId>, i64, i64),
    Legacy(String, String, Vec<SteamId>, Vec<SteamId>, i64, i64),
}

impl From<RawRecord> for MatchRecord {
    fn from(raw: RawRecord) -> Self {
        let (week, map, game_type, red, blue, red_score, blue_score) = match raw {
            RawRecord::Current(w, m, g, r, b, rs, bs) => (w, m, g, r, b, rs, bs),
            RawRecord::Legacy(w, g, r, b, rs, bs) => (w, String::new(), g, r, b, rs, bs),
        };
        MatchRecord::new(week, map, game_type, red, blue, red_score, blue_score)
    }
}

impl From<MatchRecord> for RawRecord {
    fn from(r: MatchRecord) -> Self {
        RawRecord::Current(r.week, r.map, r.game_type, r.red, r.blue, r.red_score, r.blue_score)
    }
}

impl MatchRecord {
    pub fn new(
        week: String,
        map: String,
        game_type: String,
        mut red: Vec<SteamId>,
        mut blue: Vec<SteamId>,
        red_score: i64,
        blue_score: i64,
    ) -> Self {
        red.sort_unstable();
        blue.sort_unstable();
        Self {
            week,
            map,
            game_type,
            red,
            blue,
            red_score,
            blue_score,
        }
    }

    /// Scores of `a` and `b` if this match was played between exactly those
    /// two line-ups, in either color. Both slices must be sorted.
    fn scores_for(&self, a: &[SteamId], b: &[SteamId]) -> Option<(i64, i64)> {
        if self.red == a && self.blue == b {
            Some((self.red_score, self.blue_score))
        } else if self.red == b && self.blue == a {
            Some((self.blue_score, self.red_score))
        } else {
            None
        }
    }
}

/// Record of two line-ups against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchupLine {
    pub team_a: Vec<SteamId>,
    pub team_b: Vec<SteamId>,
    pub wins_a: u32,
    pub wins_b: u32,
}

impl MatchupLine {
    pub fn games(&self) -> u32 {
        self.wins_a + self.wins_b
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matchups {
    pub week: Vec<MatchupLine>,
    pub all_time: Vec<MatchupLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    records: Vec<MatchRecord>,
}

impl History {
    pub fn new(records: Vec<MatchRecord>) -> Self {
        Self { records }
    }

    /// Load from disk. A missing or malformed file gives an empty history.
    pub fn load(path: &Path) -> Self {
        match storage::load_json::<Vec<MatchRecord>>(path) {
            Ok(Some(records)) => {
                info!(matches = records.len(), path = %path.display(), "Loaded history");
                Self::new(records)
            }
            Ok(None) => Self::default(),
            Err(e) => {
                error!(error = %e, path = %path.display(), "Could not load history, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_json(path, &self.records)?;
        info!(matches = self.records.len(), path = %path.display(), "History saved");
        Ok(())
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn push(&mut self, record: MatchRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Week of the oldest record.
    pub fn first_week(&self) -> Option<&str> {
        self.records.first().map(|r| r.week.as_str())
    }

    /// Wins of `team_a` and `team_b` against each other. `map` and `week`
    /// narrow the records considered when given. Draws count for nobody.
    pub fn teams_record(
        &self,
        game_type: &str,
        team_a: &[SteamId],
        team_b: &[SteamId],
        map: Option<&str>,
        week: Option<&str>,
    ) -> (u32, u32) {
        let mut a = team_a.to_vec();
        let mut b = team_b.to_vec();
        a.sort_unstable();
        b.sort_unstable();

        self.records
            .iter()
            .filter(|r| r.game_type == game_type)
            .filter(|r| map.map_or(true, |m| r.map == m))
            .filter(|r| week.map_or(true, |w| r.week == w))
            .filter_map(|r| r.scores_for(&a, &b))
            .fold((0, 0), |(wa, wb), (sa, sb)| match sa.cmp(&sb) {
                std::cmp::Ordering::Greater => (wa + 1, wb),
                std::cmp::Ordering::Less => (wa, wb + 1),
                std::cmp::Ordering::Equal => (wa, wb),
            })
    }

    /// Every way of splitting `players` into two teams of half the size,
    /// each pairing once, with its record this `week` and overall. Only
    /// lines with at least one decided game are kept, most played first.
    pub fn matchups(
        &self,
        players: &[SteamId],
        game_type: &str,
        map: Option<&str>,
        week: &str,
    ) -> Matchups {
        let mut result = Matchups::default();

        for (team_a, team_b) in team_splits(players) {
            let line = |(wins_a, wins_b)| MatchupLine {
                team_a: team_a.clone(),
                team_b: team_b.clone(),
                wins_a,
                wins_b,
            };
            let this_week = line(self.teams_record(game_type, &team_a, &team_b, map, Some(week)));
            let overall = line(self.teams_record(game_type, &team_a, &team_b, map, None));
            if this_week.games() > 0 {
                result.week.push(this_week);
            }
            if overall.games() > 0 {
                result.all_time.push(overall);
            }
        }

        result.week.sort_by(|x, y| y.games().cmp(&x.games()));
        result.all_time.sort_by(|x, y| y.games().cmp(&x.games()));
        result
    }
}

/// Every way of picking two disjoint teams of `players.len() / 2` from
/// `players`, each pairing once regardless of side. With an odd count one
/// player sits out of every split.
pub fn team_splits(players: &[SteamId]) -> Vec<(Vec<SteamId>, Vec<SteamId>)> {
    let teams = combinations(players, players.len() / 2);
    let mut seen = HashSet::new();
    let mut splits = Vec::new();

    for team_a in &teams {
        for team_b in &teams {
            if team_a.iter().any(|id| team_b.contains(id)) {
                continue;
            }
            let mut key = [sorted(team_a), sorted(team_b)];
            key.sort();
            if seen.insert(key) {
                splits.push((team_a.clone(), team_b.clone()));
            }
        }
    }
    splits
}

fn sorted(ids: &[SteamId]) -> Vec<SteamId> {
    let mut v = ids.to_vec();
    v.sort_unstable();
    v
}

/// All `k`-element combinations of `items`, in lexicographic index order.
fn combinations(items: &[SteamId], k: usize) -> Vec<Vec<SteamId>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i]).collect());

        // rightmost index that can still advance
        let Some(pos) = (0..k).rev().find(|&i| idx[i] < items.len() - k + i) else {
            return out;
        };
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}
