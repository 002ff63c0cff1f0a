//! In-memory host.
//!
//! Holds a roster and game info that callers control, and records every
//! broadcast and private message (with color codes stripped) so that
//! tests and dry runs can inspect what the plugins said.

use std::cell::RefCell;

use super::text::strip_colors;
use super::GameHost;
use crate::types::{GameInfo, Player, SteamId, Team};

#[derive(Debug, Default)]
pub struct RecordingHost {
    players: RefCell<Vec<Player>>,
    game: RefCell<Option<GameInfo>>,
    broadcasts: RefCell<Vec<String>>,
    private: RefCell<Vec<(SteamId, String)>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host with a game of the given type loaded.
    pub fn with_game(game_type: &str, map: &str) -> Self {
        let host = Self::new();
        host.set_game(GameInfo {
            game_type: game_type.to_string(),
            map: map.to_string(),
            ..Default::default()
        });
        host
    }

    pub fn set_game(&self, game: GameInfo) {
        *self.game.borrow_mut() = Some(game);
    }

    pub fn set_players(&self, players: Vec<Player>) {
        *self.players.borrow_mut() = players;
    }

    /// Put the given ids on red and blue, replacing the roster. Ids are
    /// looked up in `known`; unknown ids are skipped.
    pub fn set_teams(&self, known: &[Player], red: &[SteamId], blue: &[SteamId]) {
        let mut roster = Vec::new();
        for (ids, team) in [(red, Team::Red), (blue, Team::Blue)] {
            for id in ids {
                if let Some(p) = known.iter().find(|p| p.steam_id == *id) {
                    roster.push(Player {
                        team: Some(team),
                        ..p.clone()
                    });
                }
            }
        }
        self.set_players(roster);
    }

    /// Every broadcast so far, color codes stripped.
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.borrow().clone()
    }

    /// Private messages sent to one player, color codes stripped.
    pub fn told(&self, player: SteamId) -> Vec<String> {
        self.private
            .borrow()
            .iter()
            .filter(|(id, _)| *id == player)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Whether any broadcast contains `needle`.
    pub fn broadcast_contains(&self, needle: &str) -> bool {
        self.broadcasts.borrow().iter().any(|line| line.contains(needle))
    }

    pub fn clear_messages(&self) {
        self.broadcasts.borrow_mut().clear();
        self.private.borrow_mut().clear();
    }
}

impl GameHost for RecordingHost {
    fn broadcast(&self, text: &str) {
        self.broadcasts.borrow_mut().push(strip_colors(text));
    }

    fn tell(&self, player: SteamId, text: &str) {
        self.private.borrow_mut().push((player, strip_colors(text)));
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_messages_without_colors() {
        let host = RecordingHost::new();
        host.broadcast("^2Timba:^7 hi");
        host.tell(10, "You have ^3100^7 credits.");
        host.tell(11, "other");
        assert_eq!(host.broadcasts(), vec!["Timba: hi"]);
        assert_eq!(host.told(10), vec!["You have 100 credits."]);
        assert!(host.broadcast_contains("hi"));

        host.clear_messages();
        assert!(host.broadcasts().is_empty());
        assert!(host.told(10).is_empty());
    }

    #[test]
    fn test_set_teams_and_put() {
        let known = vec![
            Player::new(10, "a", None),
            Player::new(11, "b", None),
            Player::new(12, "c", None),
        ];
        let host = RecordingHost::new();
        host.set_teams(&known, &[10, 11], &[12, 99]);

        let teams = host.teams();
        assert_eq!(teams.ids(Team::Red), vec![10, 11]);
        assert_eq!(teams.ids(Team::Blue), vec![12]);

        host.put(10, Team::Blue);
        assert_eq!(host.teams().ids(Team::Blue), vec![10, 12]);
    }
}
