//! Console host used by the binary.
//!
//! Game text goes to stdout (optionally ANSI-colored); the roster and the
//! loaded game are kept up to date from feed directives.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::io::Write;
use tracing::{debug, warn};

use super::text::{strip_colors, to_ansi};
use super::GameHost;
use crate::types::{GameEvent, GameInfo, Player, SteamId, Team};

/// Host state updates carried by the event feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum HostDirective {
    /// Replace the whole roster.
    Roster { players: Vec<Player> },
    /// Load a game.
    Game { game: GameInfo },
    Connect { player: Player },
    Disconnect { steam_id: SteamId },
}

/// One line of the event feed read by the binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedLine {
    Directive(HostDirective),
    Event(GameEvent),
}

impl FeedLine {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).with_context(|| format!("Unrecognised feed line: {line}"))
    }
}

pub struct ConsoleHost {
    color: bool,
    players: RefCell<Vec<Player>>,
    game: RefCell<Option<GameInfo>>,
}

impl ConsoleHost {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            players: RefCell::new(Vec::new()),
            game: RefCell::new(None),
        }
    }

    pub fn apply(&self, directive: HostDirective) {
        debug!(?directive, "Host directive");
        match directive {
            HostDirective::Roster { players } => *self.players.borrow_mut() = players,
            HostDirective::Game { game } => *self.game.borrow_mut() = Some(game),
            HostDirective::Connect { player } => {
                let mut players = self.players.borrow_mut();
                players.retain(|p| p.steam_id != player.steam_id);
                players.push(player);
            }
            HostDirective::Disconnect { steam_id } => {
                self.players.borrow_mut().retain(|p| p.steam_id != steam_id);
            }
        }
    }

    fn render(&self, text: &str) -> String {
        if self.color {
            to_ansi(text)
        } else {
            strip_colors(text)
        }
    }

    fn write_line(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{line}") {
            warn!(error = %e, "Failed to write to stdout");
        }
    }

    fn name_of(&self, steam_id: SteamId) -> String {
        self.players
            .borrow()
            .iter()
            .find(|p| p.steam_id == steam_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| steam_id.to_string())
    }
}

impl GameHost for ConsoleHost {
    fn broadcast(&self, text: &str) {
        self.write_line(&self.render(text));
    }

    fn tell(&self, player: SteamId, text: &str) {
        let line = format!("[to {}] {}", self.name_of(player), self.render(text));
        self.write_line(&line);
    }

    fn players(&self) -> Vec<Player> {
        self.players.borrow().clone()
    }

    fn game(&self) -> Option<GameInfo> {
        self.game.borrow().clone()
    }

    fn put(&self, player: SteamId, team: Team) {
        for p in self.players.borrow_mut().iter_mut() {
            if p.steam_id == player {
                p.team = Some(team);
            }
        }
        self.write_line(&format!("[put {} on {team}]", self.name_of(player)));
    }
}
