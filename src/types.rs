//! Shared types for the plugin collection.
//!
//! These types form the data model used across all modules: players and
//! teams as the host reports them, the typed game events the dispatcher
//! routes, and the domain error enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Steam identifier of a player.
pub type SteamId = u64;

/// Ledger unit. Signed so that deltas can be represented directly.
pub type Credits = i64;

// ---------------------------------------------------------------------------
// Teams and players
// ---------------------------------------------------------------------------

/// One of the two playing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// The opposite team.
    pub fn opposite(&self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// Team name wrapped in its Quake color code.
    pub fn colored(&self) -> &'static str {
        match self {
            Team::Red => "^1red^7",
            Team::Blue => "^4blue^7",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => write!(f, "red"),
            Team::Blue => write!(f, "blue"),
        }
    }
}

/// Parse a side token as typed in chat (case-insensitive).
impl std::str::FromStr for Team {
    type Err = TimbaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "r" | "red" => Ok(Team::Red),
            "b" | "blue" => Ok(Team::Blue),
            other => Err(TimbaError::InvalidBet(format!("unknown team '{other}'"))),
        }
    }
}

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub steam_id: SteamId,
    pub name: String,
    /// `None` for spectators and players not yet on a team.
    #[serde(default)]
    pub team: Option<Team>,
    /// Frags and deaths in the current match.
    #[serde(default)]
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub kills: u64,
    pub deaths: u64,
}

impl Player {
    pub fn new(steam_id: SteamId, name: &str, team: Option<Team>) -> Self {
        Self {
            steam_id,
            name: name.to_string(),
            team,
            stats: PlayerStats::default(),
        }
    }

    pub fn with_stats(mut self, kills: u64, deaths: u64) -> Self {
        self.stats = PlayerStats { kills, deaths };
        self
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.team {
            Some(team) => write!(f, "{}:{} ({team})", self.steam_id, self.name),
            None => write!(f, "{}:{}", self.steam_id, self.name),
        }
    }
}

/// Red and blue rosters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub red: Vec<Player>,
    pub blue: Vec<Player>,
}

impl Teams {
    /// Split a roster by team, dropping spectators.
    pub fn from_players(players: &[Player]) -> Self {
        let mut teams = Teams::default();
        for p in players {
            match p.team {
                Some(Team::Red) => teams.red.push(p.clone()),
                Some(Team::Blue) => teams.blue.push(p.clone()),
                None => {}
            }
        }
        teams
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty() || self.blue.is_empty()
    }

    /// Sorted steam ids of one team.
    pub fn ids(&self, team: Team) -> Vec<SteamId> {
        let roster = match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        };
        let mut ids: Vec<SteamId> = roster.iter().map(|p| p.steam_id).collect();
        ids.sort_unstable();
        ids
    }
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// The host's view of the current game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Short factory name: "ad", "ctf", "ca", ...
    pub game_type: String,
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub red_score: i64,
    #[serde(default)]
    pub blue_score: i64,
}

/// Match-end payload, as the host reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEnd {
    #[serde(rename = "ABORTED", default)]
    pub aborted: bool,
    #[serde(rename = "TSCORE0", default)]
    pub red_score: i64,
    #[serde(rename = "TSCORE1", default)]
    pub blue_score: i64,
    #[serde(rename = "MAP", default)]
    pub map: String,
    #[serde(rename = "GAME_TYPE", default)]
    pub game_type: String,
    #[serde(rename = "CAPTURE_LIMIT", default)]
    pub capture_limit: i64,
    #[serde(rename = "ROUND_LIMIT", default)]
    pub round_limit: i64,
    #[serde(rename = "SCORE_LIMIT", default)]
    pub score_limit: i64,
    #[serde(rename = "FRAG_LIMIT", default)]
    pub frag_limit: i64,
}

impl MatchEnd {
    /// The team with the higher score, `None` on a draw.
    pub fn winner(&self) -> Option<Team> {
        match self.red_score.cmp(&self.blue_score) {
            std::cmp::Ordering::Greater => Some(Team::Red),
            std::cmp::Ordering::Less => Some(Team::Blue),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Score a team needs to win a game of the given type.
    pub fn limit_for(&self, game_type: &str) -> i64 {
        match game_type {
            "ctf" => self.capture_limit,
            "ca" => self.round_limit,
            "ad" => self.score_limit,
            _ => self.frag_limit,
        }
    }

    pub fn max_score(&self) -> i64 {
        self.red_score.max(self.blue_score)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A chat command typed by a player, e.g. `!timba red 100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCommand {
    pub player: Player,
    pub line: String,
}

impl ChatCommand {
    pub fn new(player: Player, line: &str) -> Self {
        Self {
            player,
            line: line.to_string(),
        }
    }

    /// Whitespace-separated tokens, command word included.
    pub fn args(&self) -> Vec<&str> {
        self.line.split_whitespace().collect()
    }

    /// Command word without the leading `!`, lower-cased.
    pub fn word(&self) -> Option<String> {
        self.line
            .split_whitespace()
            .next()
            .map(|w| w.trim_start_matches('!').to_lowercase())
            .filter(|w| !w.is_empty())
    }
}

/// Game-lifecycle callbacks delivered by the host, plus internal timer fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum GameEvent {
    #[serde(rename = "game_countdown")]
    Countdown,
    #[serde(rename = "game_start")]
    MatchStart,
    #[serde(rename = "game_end")]
    MatchEnd(MatchEnd),
    #[serde(rename = "command")]
    Command(ChatCommand),
    /// The betting window armed with this id ran out of time.
    #[serde(rename = "window_expired")]
    WindowExpired(Uuid),
}

/// Field-less discriminant of [`GameEvent`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Countdown,
    MatchStart,
    MatchEnd,
    Command,
    WindowExpired,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Countdown => EventKind::Countdown,
            GameEvent::MatchStart => EventKind::MatchStart,
            GameEvent::MatchEnd(_) => EventKind::MatchEnd,
            GameEvent::Command(_) => EventKind::Command,
            GameEvent::WindowExpired(_) => EventKind::WindowExpired,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimbaError {
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: Credits, available: Credits },

    #[error("Betting is closed")]
    BettingClosed,

    #[error("Unsupported game type: {0}")]
    UnsupportedGameType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
