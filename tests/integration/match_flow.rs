//! Full matches: betting window, escrow, settlement, history and ratings
//! together.

use std::time::Duration;

use timba::betting::window::WindowTimer;
use timba::betting::{Timba, TimbaSettings};
use timba::host::GameHost;
use timba::plugin::{Dispatcher, Plugin};
use timba::types::{EventKind, GameEvent, Team, TimbaError};

use crate::harness::TestServer;

const CREDITS: &str = r#"{"10": 1000, "11": 2000}"#;

#[test]
fn test_match_settles_and_persists() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11], &[12, 13]);

    server.countdown();
    server.say(10, "!timba blue 1000");
    server.say(11, "!timba 200 r");
    server.start();
    assert!(server
        .host
        .broadcast_contains("Betting is now closed. The pot is 1200 credits."));
    assert!(server.host.broadcast_contains("Teams history (ad)"));

    server.end(7, 15);

    assert_eq!(server.saved_ledger(), serde_json::json!({"10": 1200, "11": 1800}));
    let history = server.saved_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].red, vec![10, 11]);
    assert_eq!(history[0].blue, vec![12, 13]);
    assert_eq!(history[0].map, "campgrounds");

    assert!(server.host.broadcast_contains("cthulhu :   200 on blue"));
    assert!(server.host.broadcast_contains("shub niggurath :  -200 on red"));
    assert_eq!(
        server.host.told(10).last().unwrap(),
        "You won 200 credits. You have 1200 credits."
    );
}

#[test]
fn test_pot_split_rounds_to_pot() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11, 14], &[12, 13, 15]);

    server.countdown();
    server.say(10, "!timba blue 100");
    server.say(12, "!timba blue 200");
    server.say(11, "!timba red 1000");
    server.say(13, "!timba blue 1");
    server.start();
    server.end(3, 15);

    // pot 1301 over winning stake 301: one credit stays unallocated
    let ledger = server.saved_ledger();
    let paid: i64 = [(10, 1000 - 100), (12, 5000 - 200), (13, 5000 - 1)]
        .iter()
        .map(|(id, before)| ledger[id.to_string()].as_i64().unwrap() - before)
        .sum();
    assert_eq!(paid, 1300);
    assert_eq!(ledger["11"], 1000);
    assert_eq!(ledger["10"], 1000 - 100 + 432);
    assert_eq!(ledger["12"], 5000 - 200 + 864);
    assert_eq!(ledger["13"], 5000 - 1 + 4);
}

#[test]
fn test_ledger_carries_over_matches() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11], &[12, 13]);

    server.countdown();
    server.say(10, "!timba red 1000");
    server.say(12, "!timba blue 500");
    server.start();
    server.end(15, 2);
    assert_eq!(server.saved_ledger()["10"], 1500);
    assert_eq!(server.saved_ledger()["12"], 4500);

    server.host.clear_messages();
    server.countdown();
    server.say(10, "!timba");
    assert_eq!(server.host.told(10).last().unwrap(), "You have 1500 credits to bet.");
    server.say(10, "!timba blue 1500");
    server.say(12, "!timba red 4500");
    server.start();
    server.end(15, 14);

    assert_eq!(server.saved_ledger()["10"], 0);
    assert_eq!(server.saved_ledger()["12"], 6000);
    assert_eq!(server.saved_history().len(), 2);
}

#[test]
fn test_aborted_match_changes_nothing() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11], &[12, 13]);

    server.countdown();
    server.say(10, "!timba blue 1000");
    server.say(11, "!timba red 2000");
    server.start();
    server.abort();

    assert!(server.host.broadcast_contains("No one wins: game was aborted."));
    assert!(server.host.broadcast_contains("Not updating history: game was aborted."));
    assert_eq!(server.saved_ledger(), serde_json::json!({"10": 1000, "11": 2000}));
    assert!(server.saved_history().is_empty());

    // balances are back for the next match
    server.countdown();
    server.say(11, "!timba");
    assert_eq!(server.host.told(11).last().unwrap(), "You have 2000 credits to bet.");
}

#[test]
fn test_unrelated_game_type_is_ignored() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.host.set_game(timba::types::GameInfo {
        game_type: "ffa".to_string(),
        ..Default::default()
    });
    server.teams(&[10], &[12]);

    server.countdown();
    assert!(!server.host.broadcast_contains("Betting is now open"));
    server.say(10, "!timba red 100");
    assert_eq!(
        server.host.told(10),
        vec!["You can only bet on these game types: ad, ctf."]
    );
    server.start();
    assert!(!server.host.broadcast_contains("Betting is now closed"));
}

#[test]
fn test_end_without_countdown_settles_nothing() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11], &[12, 13]);
    server.say(10, "!timba blue 1000");
    server.start();
    server.end(7, 15);

    assert!(server
        .host
        .told(10)
        .contains(&"You can only bet during warmup. You have 1000 credits to bet.".to_string()));
    assert_eq!(server.saved_ledger(), serde_json::json!({"10": 1000, "11": 2000}));
    // history still kept
    assert_eq!(server.saved_history().len(), 1);
}

#[test]
fn test_unknown_command_is_ignored() {
    let mut server = TestServer::new(None, None);
    server.teams(&[10], &[12]);
    server.say(10, "!lagparatodos");
    server.say(10, "hello there");
    assert!(server.host.broadcasts().is_empty());
    assert!(server.host.told(10).is_empty());
}

#[test]
fn test_funes_moves_players_to_listed_matchup() {
    let history = r#"[
        ["2018-10", "ad", [10, 12], [11, 13], 15, 3],
        ["2018-10", "ad", [10, 12], [11, 13], 15, 9],
        ["2018-10", "ad", [10, 11], [12, 13], 15, 14]
    ]"#;
    let mut server = TestServer::new(None, Some(history));
    server.teams(&[10, 11], &[12, 13]);

    server.say(10, "!funes 1");
    assert!(server.host.broadcast_contains("Teams history (ad, all maps)"));

    let teams = server.host.teams();
    assert_eq!(teams.ids(Team::Red), vec![10, 12]);
    assert_eq!(teams.ids(Team::Blue), vec![11, 13]);
}

#[test]
fn test_tie_settles_as_blue_win() {
    let mut server = TestServer::new(Some(CREDITS), None);
    server.teams(&[10, 11], &[12, 13]);

    server.countdown();
    server.say(10, "!timba blue 1000");
    server.say(11, "!timba red 200");
    server.start();
    server.end(15, 15);

    assert_eq!(server.saved_ledger(), serde_json::json!({"10": 1200, "11": 1800}));
    // history keeps the tie, ratings count it as a loss for everyone
    assert_eq!(server.saved_history().len(), 1);
    let stats = server.saved_stats();
    for id in [10, 11, 12, 13] {
        let record = stats.get("ad", id).unwrap();
        assert_eq!((record.wins, record.losses), (0, 1));
    }
}

#[test]
fn test_ratings_follow_matches() {
    let mut server = TestServer::new(None, None);
    server.teams(&[10, 11], &[12, 13]);

    server.start();
    server.end(15, 7);
    assert!(server.host.broadcast_contains("match rating deltas (beta)"));
    assert!(server.host.broadcast_contains("OlorACulo: Stats saved."));

    server.host.clear_messages();
    server.say(12, "!oloraculo_ratings");
    let lines = server.host.broadcasts();
    let rows: Vec<&String> = lines.iter().filter(|l| l.contains(" · wl: ")).collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[0].contains("cthulhu:  4.79 · wl:  0.00 (1/0)"));
    assert!(rows[3].contains("zoth-ommog: -1.43 · wl:  0.00 (0/1)"));

    // the even splits mix winners and losers
    server.host.clear_messages();
    server.say(12, "!oloraculo");
    let lines = server.host.broadcasts();
    let predictions: Vec<&String> = lines.iter().filter(|l| l.contains(" vs ")).collect();
    assert_eq!(predictions.len(), 3);
    assert!(predictions[0].ends_with(" : cthulhu, nyarlathotep vs shub niggurath, zoth-ommog"));
    assert!(predictions[2].ends_with(" : cthulhu, shub niggurath vs nyarlathotep, zoth-ommog"));
}

#[test]
fn test_dispatch_tables() {
    let server = TestServer::new(None, None);
    assert_eq!(
        server.dispatcher.plugin_names(),
        vec!["timba", "funes", "oloraculo"]
    );
    assert_eq!(
        server.dispatcher.hooked(EventKind::MatchEnd),
        vec!["timba", "funes", "oloraculo"]
    );
    assert_eq!(server.dispatcher.hooked(EventKind::Countdown), vec!["timba"]);

    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(Timba::new(TimbaSettings::default(), WindowTimer::disabled())),
        Box::new(Timba::new(TimbaSettings::default(), WindowTimer::disabled())),
    ];
    assert!(matches!(Dispatcher::new(plugins), Err(TimbaError::Config(_))));
}

#[tokio::test]
async fn test_window_times_out_before_match_start() {
    let mut server = TestServer::with_window(Some(CREDITS), None, Duration::from_millis(20));
    server.teams(&[10, 11], &[12, 13]);

    server.countdown();
    server.say(10, "!timba blue 400");

    let event = tokio::time::timeout(Duration::from_secs(2), server.timer_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, GameEvent::WindowExpired(_)));
    server.event(event);
    assert!(server
        .host
        .broadcast_contains("Betting is now closed. The pot is 400 credits."));

    server.say(11, "!timba red 100");
    assert_eq!(
        server.host.told(11).last().unwrap(),
        "You can only bet during warmup. You have 2000 credits to bet."
    );

    // the explicit close finds the window already closed
    server.start();
    assert_eq!(server.broadcast_count("Betting is now closed"), 1);

    server.end(7, 15);
    assert!(server.host.broadcast_contains("Everyone bet on the winner"));
    assert_eq!(server.saved_ledger()["10"], 1000);
}
