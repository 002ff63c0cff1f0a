//! Test server for integration testing.
//!
//! Wires the real plugins to a `RecordingHost` through a `Dispatcher`,
//! with ledger, history and ratings files under the temp dir. Everything said is
//! recorded on the host and the files are removed on drop.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use timba::betting::window::WindowTimer;
use timba::betting::{Timba, TimbaSettings};
use timba::history::record::MatchRecord;
use timba::history::Funes;
use timba::host::RecordingHost;
use timba::plugin::{Dispatcher, Plugin};
use timba::rating::stats::StatsDb;
use timba::rating::{Oloraculo, RatingSettings};
use timba::storage;
use timba::types::{ChatCommand, GameEvent, MatchEnd, Player, SteamId};

pub fn known_players() -> Vec<Player> {
    [
        (10, "]v[ - cthulhu"),
        (11, "==shub niggurath=="),
        (12, "Nyarlathotep"),
        (13, "Zoth-Ommog"),
        (14, "dagon"),
        (15, "hastur"),
    ]
    .into_iter()
    .map(|(id, name)| Player::new(id, name, None))
    .collect()
}

fn temp_path(kind: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("timba_it_{kind}_{}.json", uuid::Uuid::new_v4()));
    p
}

pub struct TestServer {
    pub host: RecordingHost,
    pub dispatcher: Dispatcher,
    pub ledger_path: PathBuf,
    pub history_path: PathBuf,
    pub stats_path: PathBuf,
    pub timer_rx: UnboundedReceiver<GameEvent>,
}

impl TestServer {
    /// Server running an "ad" game on campgrounds, with optional seed
    /// contents for the ledger and history files.
    pub fn new(ledger: Option<&str>, history: Option<&str>) -> Self {
        Self::with_window(ledger, history, Duration::from_secs(30))
    }

    pub fn with_window(ledger: Option<&str>, history: Option<&str>, window: Duration) -> Self {
        let ledger_path = temp_path("credits");
        let history_path = temp_path("history");
        let stats_path = temp_path("ratings");
        if let Some(contents) = ledger {
            std::fs::write(&ledger_path, contents).unwrap();
        }
        if let Some(contents) = history {
            std::fs::write(&history_path, contents).unwrap();
        }

        let (tx, timer_rx) = mpsc::unbounded_channel();
        let settings = TimbaSettings {
            ledger_path: ledger_path.clone(),
            window,
            ..TimbaSettings::default()
        };
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(Timba::new(settings, WindowTimer::new(tx))),
            Box::new(Funes::new(history_path.clone())),
            Box::new(Oloraculo::new(RatingSettings {
                stats_path: stats_path.clone(),
                ..RatingSettings::default()
            })),
        ];

        Self {
            host: RecordingHost::with_game("ad", "campgrounds"),
            dispatcher: Dispatcher::new(plugins).unwrap(),
            ledger_path,
            history_path,
            stats_path,
            timer_rx,
        }
    }

    pub fn teams(&self, red: &[SteamId], blue: &[SteamId]) {
        self.host.set_teams(&known_players(), red, blue);
    }

    /// Deliver an event, asserting no handler failed.
    pub fn event(&mut self, event: GameEvent) {
        assert_eq!(self.dispatcher.dispatch(&event, &self.host), 0, "{event:?}");
    }

    pub fn say(&mut self, player: SteamId, line: &str) {
        let name = known_players()
            .into_iter()
            .find(|p| p.steam_id == player)
            .map(|p| p.name)
            .unwrap_or_else(|| player.to_string());
        let command = ChatCommand::new(Player::new(player, &name, None), line);
        self.event(GameEvent::Command(command));
    }

    pub fn countdown(&mut self) {
        self.event(GameEvent::Countdown);
    }

    pub fn start(&mut self) {
        self.event(GameEvent::MatchStart);
    }

    /// Finish an "ad" match to a score limit of 15.
    pub fn end(&mut self, red: i64, blue: i64) {
        self.event(GameEvent::MatchEnd(MatchEnd {
            red_score: red,
            blue_score: blue,
            game_type: "ad".to_string(),
            score_limit: 15,
            ..Default::default()
        }));
    }

    pub fn abort(&mut self) {
        self.event(GameEvent::MatchEnd(MatchEnd {
            aborted: true,
            ..Default::default()
        }));
    }

    pub fn saved_ledger(&self) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(&self.ledger_path).unwrap()).unwrap()
    }

    pub fn saved_history(&self) -> Vec<MatchRecord> {
        storage::load_json(&self.history_path).unwrap().unwrap_or_default()
    }

    pub fn saved_stats(&self) -> StatsDb {
        StatsDb::load(&self.stats_path)
    }

    /// Number of broadcasts containing `needle`.
    pub fn broadcast_count(&self, needle: &str) -> usize {
        self.host
            .broadcasts()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = storage::delete_file(&self.ledger_path);
        let _ = storage::delete_file(&self.history_path);
        let _ = storage::delete_file(&self.stats_path);
    }
}
