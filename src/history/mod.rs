//! Funes: team history.
//!
//! Remembers the outcome of every finished match between two line-ups and
//! reports how the current teams have fared against each other. `!funes`
//! lists every possible split of the players on teams and can shuffle them
//! into one of the listed splits.

pub mod record;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::host::text::clean_name;
use crate::host::GameHost;
use crate::plugin::Plugin;
use crate::types::{ChatCommand, EventKind, GameEvent, MatchEnd, Player, SteamId, Team, Teams};
use record::{week_key, History, MatchRecord, MatchupLine};

const HEADER_COLOR: &str = "^2";
const RULE_WIDTH: usize = 80;

pub struct Funes {
    history_path: PathBuf,
    history: History,
    /// Line-up at match start.
    teams: Option<Teams>,
    clock: fn() -> NaiveDate,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl Funes {
    pub fn new(history_path: PathBuf) -> Self {
        let history = History::load(&history_path);
        Self {
            history_path,
            history,
            teams: None,
            clock: today,
        }
    }

    /// Replace the source of "today", for fixed-date reports.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn week(&self) -> String {
        week_key((self.clock)())
    }

    fn log(&self, host: &dyn GameHost, msg: &str) {
        host.broadcast(&format!("{HEADER_COLOR}Funes:^7 {msg}"));
    }

    fn header(&self, host: &dyn GameHost, title: &str) {
        host.broadcast(&format!("{HEADER_COLOR}{}", "=".repeat(RULE_WIDTH)));
        host.broadcast(&format!("{HEADER_COLOR}Funes:^7 {title}"));
        host.broadcast(&format!("{HEADER_COLOR}{}", "-".repeat(RULE_WIDTH)));
    }

    fn since(&self) -> String {
        self.history
            .first_week()
            .map(|w| w.replace('-', "w"))
            .unwrap_or_else(|| self.week().replace('-', "w"))
    }

    fn on_match_start(&mut self, host: &dyn GameHost) {
        self.history = History::load(&self.history_path);

        let teams = host.teams();
        if teams.is_empty() {
            self.teams = None;
            self.log(host, "Teams are empty on game start.");
            return;
        }
        self.teams = Some(teams.clone());

        let game = host.game().unwrap_or_default();
        let red = teams.ids(Team::Red);
        let blue = teams.ids(Team::Blue);
        let week = self.week();
        let (wr, wb) = self
            .history
            .teams_record(&game.game_type, &red, &blue, None, Some(&week));
        let (ar, ab) = self.history.teams_record(&game.game_type, &red, &blue, None, None);

        let names = |players: &[Player]| {
            let mut names: Vec<String> = players.iter().map(|p| clean_name(&p.name)).collect();
            names.sort();
            names.join(", ")
        };
        let red_names = names(&teams.red);
        let blue_names = names(&teams.blue);

        self.header(host, &format!("Teams history ({})", game.game_type));
        host.broadcast(&format!(
            "This week: ^1{red_names}^7 ^3{wr}^7 v ^3{wb}^7 ^4{blue_names}^7"
        ));
        host.broadcast(&format!(
            " All time: ^1{red_names}^7 ^3{ar}^7 v ^3{ab}^7 ^4{blue_names}^7 (since {})",
            self.since()
        ));
    }

    fn on_match_end(&mut self, end: &MatchEnd, host: &dyn GameHost) -> Result<()> {
        let start_teams = self.teams.take();

        if end.aborted {
            self.log(host, "Not updating history: game was aborted.");
            return Ok(());
        }

        let game = host.game().unwrap_or_default();
        let game_type = if end.game_type.is_empty() {
            game.game_type
        } else {
            end.game_type.clone()
        };
        let map = if end.map.is_empty() { game.map } else { end.map.clone() };

        if end.max_score() < end.limit_for(&game_type) {
            self.log(host, "Not updating history: no team won.");
            return Ok(());
        }

        let teams = start_teams.unwrap_or_else(|| host.teams());
        if teams.is_empty() {
            self.log(host, "Not updating history: one or more empty teams.");
            return Ok(());
        }

        self.history.push(MatchRecord::new(
            self.week(),
            map,
            game_type,
            teams.ids(Team::Red),
            teams.ids(Team::Blue),
            end.red_score,
            end.blue_score,
        ));
        info!(matches = self.history.len(), "History updated");
        self.history.save(&self.history_path)?;
        self.log(host, "History updated.");
        Ok(())
    }

    fn print_lines(
        &self,
        host: &dyn GameHost,
        title: &str,
        lines: &[MatchupLine],
        names: &HashMap<SteamId, String>,
        numbered: bool,
    ) {
        if lines.is_empty() {
            host.broadcast(&format!("{title}: no history with these players."));
            return;
        }
        host.broadcast(&format!("{title}:"));
        let join = |ids: &[SteamId]| {
            ids.iter()
                .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        for (i, line) in lines.iter().enumerate() {
            let prefix = if numbered { format!("^5{:>2}. ", i + 1) } else { String::new() };
            host.broadcast(&format!(
                "{prefix}^3{:>24}  ^2{}  ^7v  ^2{}  ^3{}",
                join(&line.team_a),
                line.wins_a,
                line.wins_b,
                join(&line.team_b)
            ));
        }
    }

    fn on_command(&mut self, command: &ChatCommand, host: &dyn GameHost) {
        let on_teams: Vec<_> = host
            .players()
            .into_iter()
            .filter(|p| p.team.is_some())
            .collect();
        if on_teams.len() < 2 {
            self.log(host, "No history for less than 2 players.");
            return;
        }

        let mut ids: Vec<SteamId> = on_teams.iter().map(|p| p.steam_id).collect();
        ids.sort_unstable();
        let names: HashMap<SteamId, String> = on_teams
            .iter()
            .map(|p| (p.steam_id, clean_name(&p.name)))
            .collect();
        let game = host.game().unwrap_or_default();
        let week = self.week();
        let since = self.since();

        let on_map = self
            .history
            .matchups(&ids, &game.game_type, Some(&game.map), &week);
        let all_maps = self.history.matchups(&ids, &game.game_type, None, &week);

        self.header(host, &format!("Teams history ({}, {})", game.game_type, game.map));
        self.print_lines(host, "This week", &on_map.week, &names, false);
        self.print_lines(host, &format!("Since {since}"), &on_map.all_time, &names, false);

        self.header(host, &format!("Teams history ({}, all maps)", game.game_type));
        self.print_lines(host, "This week", &all_maps.week, &names, false);
        self.print_lines(host, &format!("Since {since}"), &all_maps.all_time, &names, true);

        let args = command.args();
        let Some(choice) = args.get(1).and_then(|a| a.parse::<usize>().ok()) else {
            return;
        };
        let Some(line) = choice.checked_sub(1).and_then(|i| all_maps.all_time.get(i)) else {
            debug!(choice, lines = all_maps.all_time.len(), "No such matchup line");
            return;
        };

        info!(choice, red = ?line.team_a, blue = ?line.team_b, "Moving players to matchup");
        for id in &line.team_a {
            host.put(*id, Team::Red);
        }
        for id in &line.team_b {
            host.put(*id, Team::Blue);
        }
    }
}

impl Plugin for Funes {
    fn name(&self) -> &'static str {
        "funes"
    }

    fn hooks(&self) -> &'static [EventKind] {
        &[EventKind::MatchStart, EventKind::MatchEnd]
    }

    fn commands(&self) -> &'static [&'static str] {
        &["funes"]
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
        self.on_command(command, host);
        Ok(())
    }
}
