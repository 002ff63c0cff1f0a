//! Oloraculo: player ratings and team predictions.
//!
//! Keeps a TrueSkill rating plus win/loss and kill/death counts per player
//! and game type, updated whenever a match of an interesting game type is
//! won. `!oloraculo` ranks the possible splits of the current players by
//! match quality and `!oloraculo_ratings` lists everyone's standing.

pub mod stats;
pub mod trueskill;

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::history::record::team_splits;
use crate::host::text::clean_name;
use crate::host::GameHost;
use crate::plugin::Plugin;
use crate::types::{ChatCommand, EventKind, GameEvent, MatchEnd, SteamId};
use stats::StatsDb;
use trueskill::{Rating, TrueSkill};

const HEADER_COLOR: &str = "^2";
const RULE_WIDTH: usize = 80;
/// Prediction lines shown by `!oloraculo`.
const PREDICTIONS: usize = 4;

#[derive(Debug, Clone)]
pub struct RatingSettings {
    pub stats_path: PathBuf,
    /// Short game type names that are rated.
    pub game_types: Vec<String>,
    pub env: TrueSkill,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            stats_path: PathBuf::from("oloraculo_stats.json"),
            game_types: vec!["ad".to_string(), "ctf".to_string()],
            env: TrueSkill::default(),
        }
    }
}

/// One candidate split with its predicted quality.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub quality: f64,
    pub red: Vec<SteamId>,
    pub blue: Vec<SteamId>,
}

pub struct Oloraculo {
    settings: RatingSettings,
    stats: StatsDb,
}

impl Oloraculo {
    pub fn new(settings: RatingSettings) -> Self {
        let stats = StatsDb::load(&settings.stats_path);
        Self { settings, stats }
    }

    pub fn stats(&self) -> &StatsDb {
        &self.stats
    }

    fn log(&self, host: &dyn GameHost, msg: &str) {
        host.broadcast(&format!("{HEADER_COLOR}OlorACulo:^7 {msg}"));
    }

    fn header(&self, host: &dyn GameHost, title: &str) {
        host.broadcast(&format!("{HEADER_COLOR}{}", "=".repeat(RULE_WIDTH)));
        host.broadcast(&format!("{HEADER_COLOR}OlorACulo v3.0:^7 {title}"));
        host.broadcast(&format!("{HEADER_COLOR}{}", "-".repeat(RULE_WIDTH)));
    }

    fn is_interesting(&self, game_type: &str) -> bool {
        self.settings
            .game_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(game_type))
    }

    fn current_game_type(&self, host: &dyn GameHost) -> String {
        host.game().map(|g| g.game_type).unwrap_or_default()
    }

    /// Clean names of everyone connected.
    fn names(&self, host: &dyn GameHost) -> HashMap<SteamId, String> {
        host.players()
            .into_iter()
            .map(|p| (p.steam_id, clean_name(&p.name)))
            .collect()
    }

    /// Every split of `players` ranked by match quality, best first.
    pub fn predictions(&self, game_type: &str, players: &[SteamId]) -> Vec<Prediction> {
        let env = &self.settings.env;
        let ratings = |team: &[SteamId]| -> Vec<Rating> {
            team.iter()
                .map(|id| self.stats.rating(env, game_type, *id))
                .collect()
        };

        let mut predictions: Vec<Prediction> = team_splits(players)
            .into_iter()
            .map(|(red, blue)| Prediction {
                quality: env.quality(&ratings(&red), &ratings(&blue)),
                red,
                blue,
            })
            .collect();
        predictions.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then_with(|| a.red.cmp(&b.red))
        });
        predictions
    }

    // -- Lifecycle -----------------------------------------------------------

    fn on_match_start(&mut self, host: &dyn GameHost) {
        if !self.is_interesting(&self.current_game_type(host)) {
            return;
        }
        self.stats = StatsDb::load(&self.settings.stats_path);
        self.log(host, "Stats loaded.");
    }

    fn on_match_end(&mut self, end: &MatchEnd, host: &dyn GameHost) -> Result<()> {
        let game_type = if end.game_type.is_empty() {
            self.current_game_type(host)
        } else {
            end.game_type.clone()
        };
        if !self.is_interesting(&game_type) {
            return Ok(());
        }

        if end.aborted {
            self.log(host, "Not updating ratings: game was aborted.");
            return Ok(());
        }
        if end.max_score() < end.limit_for(&game_type) {
            self.log(host, "Not updating ratings: no team won.");
            return Ok(());
        }

        let teams = host.teams();
        if teams.is_empty() {
            debug!("Not updating ratings: one or more empty teams");
            return Ok(());
        }

        let deltas = self.stats.record_match(
            &self.settings.env,
            &game_type,
            &teams.red,
            &teams.blue,
            end.red_score,
            end.blue_score,
        );
        info!(%game_type, players = deltas.len(), "Ratings updated");

        let names = self.names(host);
        self.header(host, "match rating deltas (beta)");
        for (id, delta) in &deltas {
            host.broadcast(&format!("^5{:>12}^7: ^3{delta:5.2}^7", display_name(&names, *id)));
        }
        host.broadcast(" ");
        self.log(host, "Stats updated.");

        self.stats.save(&self.settings.stats_path)?;
        self.log(host, "Stats saved.");
        Ok(())
    }

    // -- Commands ------------------------------------------------------------

    fn on_predict(&self, host: &dyn GameHost) {
        let game_type = self.current_game_type(host);
        if !self.is_interesting(&game_type) {
            self.log(host, "This game type is not interesting. No predictions.");
            return;
        }

        let players = host.players();
        let mut present: Vec<SteamId> = players
            .iter()
            .filter(|p| p.team.is_some())
            .map(|p| p.steam_id)
            .collect();
        present.sort_unstable();
        if present.len() < 2 {
            self.log(host, "Cannot predict with less than 2 players.");
            return;
        }

        let names = self.names(host);
        let join = |ids: &[SteamId]| {
            ids.iter()
                .map(|id| display_name(&names, *id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.header(host, &format!("predictions ({game_type})"));
        for p in self.predictions(&game_type, &present).iter().take(PREDICTIONS) {
            host.broadcast(&format!(
                "^3{:.4}^7 : ^1{} ^7vs ^4{}^7",
                p.quality,
                join(&p.red),
                join(&p.blue)
            ));
        }
        host.broadcast(" ");
    }

    fn on_ratings(&self, host: &dyn GameHost) {
        let game_type = self.current_game_type(host);
        if !self.is_interesting(&game_type) {
            self.log(host, "This game type is not interesting. No ratings.");
            return;
        }

        let mut rows = self.stats.players(&game_type);
        rows.sort_by(|a, b| {
            b.1.rating
                .exposure()
                .total_cmp(&a.1.rating.exposure())
                .then(a.0.cmp(&b.0))
        });
        let max_wl = rows.iter().map(|(_, r)| r.wins.max(r.losses)).max().unwrap_or(0);
        let max_kd = rows.iter().map(|(_, r)| r.kills.max(r.deaths)).max().unwrap_or(0);

        let names = self.names(host);
        self.header(host, &format!("player ratings ({game_type})"));
        for (id, record) in &rows {
            host.broadcast(&format!(
                "^5{:>12}^7: ^3{:5.2}^7 · {} · {}",
                display_name(&names, *id),
                record.rating.exposure(),
                ratio_column("wl", max_wl, record.wins, record.losses, record.win_ratio()),
                ratio_column("kd", max_kd, record.kills, record.deaths, record.kill_ratio()),
            ));
        }
        host.broadcast(" ");
    }
}

/// Name of a connected player, or the tail of the steam id otherwise.
fn display_name(names: &HashMap<SteamId, String>, id: SteamId) -> String {
    match names.get(&id) {
        Some(name) => name.clone(),
        None => {
            let id = id.to_string();
            format!("...{}", id.get(8..).unwrap_or_default())
        }
    }
}

/// `title: ratio (a/b)` with both counts padded to the widest in the table.
fn ratio_column(title: &str, max: u64, a: u64, b: u64, ratio: f64) -> String {
    let width = max.to_string().len();
    let counts = format!("(^2{a:>width$}^7/^1{b:>width$}^7)");
    format!("{title}: ^3{ratio:5.2}^7 {counts:>11}")
}

impl Plugin for Oloraculo {
    fn name(&self) -> &'static str {
        "oloraculo"
    }

    fn hooks(&self) -> &'static [EventKind] {
        &[EventKind::MatchStart, EventKind::MatchEnd]
    }

    fn commands(&self) -> &'static [&'static str] {
        &["oloraculo", "oloraculo_ratings"]
    }

    fn handle_event(&mut self, event: &GameEvent, host: &dyn GameHost) -> Result<()> {
        match event {
            GameEvent::MatchStart => self.on_match_start(host),
            GameEvent::MatchEnd(end) => self.on_match_end(end, host)?,
            _ => {}
        }
        Ok(())
    }

    fn handle_command(&mut self, command: &ChatCommand, host: &dyn GameHost) -> Result<()> {
        match command.word().as_deref() {
            Some("oloraculo_ratings") => self.on_ratings(host),
            _ => self.on_predict(host),
        }
        Ok(())
    }
}
