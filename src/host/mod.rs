//! Host integration.
//!
//! Defines the `GameHost` trait, the slice of the game server's API the
//! plugins talk back to, and provides implementations for:
//! - `ConsoleHost`: stdout-backed host driven by the binary's event feed
//! - `RecordingHost`: in-memory host that records everything said

pub mod console;
pub mod recording;
pub mod text;

use crate::types::{GameInfo, Player, SteamId, Team, Teams};

/// Abstraction over the game server.
///
/// Handlers run synchronously on the host's event thread, so every call
/// here is expected to return immediately.
#[cfg_attr(test, mockall::automock)]
pub trait GameHost {
    /// Send a message to everyone on the server.
    fn broadcast(&self, text: &str);

    /// Send a private message to one player.
    fn tell(&self, player: SteamId, text: &str);

    /// Everyone currently connected, spectators included.
    fn players(&self) -> Vec<Player>;

    /// Current red and blue rosters.
    fn teams(&self) -> Teams {
        Teams::from_players(&self.players())
    }

    /// The game in progress, if the server has one loaded.
    fn game(&self) -> Option<GameInfo>;

    /// Move a player onto a team.
    fn put(&self, player: SteamId, team: Team);
}

pub use console::ConsoleHost;
pub use recording::RecordingHost;
