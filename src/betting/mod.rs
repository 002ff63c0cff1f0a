//! Timba: match betting pool.
//!
//! Players wager credits on red or blue while the betting window is open
//! (from the match countdown until the match starts or the window times
//! out). Stakes are escrowed when the window closes and the pot is split
//! among the winners when the match ends.

pub mod command;
pub mod ledger;
pub mod settlement;
pub mod window;

use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::host::text::clean_name;
use crate::host::GameHost;
use crate::plugin::Plugin;
use crate::types::{ChatCommand, Credits, EventKind, GameEvent, MatchEnd, SteamId, Team, TimbaError};
use command::parse_bet;
use ledger::Ledger;
use settlement::{settle, Outcome, RoundingPolicy, Settlement, Wager};
use window::{BettingWindow, CloseTrigger, WindowState, WindowTimer};

const HEADER_COLOR: &str = "^2";
const RULE_WIDTH: usize = 80;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimbaSettings {
    /// Balance a player starts with on their first wager.
    pub starting_credits: Credits,
    pub ledger_path: PathBuf,
    /// Short game type names betting is allowed on.
    pub game_types: Vec<String>,
    /// How long the window stays open after the countdown.
    pub window: Duration,
    pub rounding: RoundingPolicy,
}

impl Default for TimbaSettings {
    fn default() -> Self {
        Self {
            starting_credits: 5000,
            ledger_path: PathBuf::from("timba_credits.json"),
            game_types: vec!["ad".to_string(), "ctf".to_string()],
            window: Duration::from_secs(30),
            rounding: RoundingPolicy::default(),
        }
    }
}

/// Result of a `!timba` request that changed (or inspected) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetChange {
    /// No arguments: the player asked for their balance.
    Balance,
    Placed { team: Team, amount: Credits },
    Removed,
    NothingToRemove,
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

pub struct Timba {
    settings: TimbaSettings,
    ledger: Ledger,
    wagers: BTreeMap<SteamId, Wager>,
    names: HashMap<SteamId, String>,
    window: BettingWindow,
    timer: WindowTimer,
}

impl Timba {
    pub fn new(settings: TimbaSettings, timer: WindowTimer) -> Self {
        let ledger = Ledger::load(&settings.ledger_path, settings.starting_credits);
        info!(
            players = ledger.len(),
            game_types = ?settings.game_types,
            window_secs = settings.window.as_secs(),
            rounding = %settings.rounding,
            "Timba ready"
        );
        Self {
            settings,
            ledger,
            wagers: BTreeMap::new(),
            names: HashMap::new(),
            window: BettingWindow::new(),
            timer,
        }
    }

    pub fn wagers(&self) -> &BTreeMap<SteamId, Wager> {
        &self.wagers
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn window_state(&self) -> WindowState {
        self.window.state()
    }

    // -- Messages ------------------------------------------------------------

    fn log(&self, host: &dyn GameHost, msg: &str) {
        host.broadcast(&format!("{HEADER_COLOR}Timba:^7 {msg}"));
    }

    fn log_error(&self, host: &dyn GameHost, msg: &str) {
        host.broadcast(&format!("{HEADER_COLOR}Timba:^1 {msg}"));
    }

    fn header(&self, host: &dyn GameHost, title: &str) {
        host.broadcast(&format!("{HEADER_COLOR}{}", "=".repeat(RULE_WIDTH)));
        host.broadcast(&format!("{HEADER_COLOR}Timba:^7 {title}"));
        host.broadcast(&format!("{HEADER_COLOR}{}", "-".repeat(RULE_WIDTH)));
    }

    fn name_of(&self, player: SteamId) -> String {
        self.names
            .get(&player)
            .cloned()
            .unwrap_or_else(|| player.to_string())
    }

    // -- Game type -----------------------------------------------------------

    fn check_game_type(&self, host: &dyn GameHost) -> Result<(), TimbaError> {
        let game_type = host.game().map(|g| g.game_type).unwrap_or_default();
        if self
            .settings
            .game_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&game_type))
        {
            Ok(())
        } else {
            Err(TimbaError::UnsupportedGameType(game_type))
        }
    }

    // -- Lifecycle -----------------------------------------------------------

    fn on_countdown(&mut self, host: &dyn GameHost) {
        if let Err(e) = self.check_game_type(host) {
            debug!(error = %e, "Countdown ignored");
            return;
        }

        if self.window.is_closed() {
            warn!(
                bettors = self.wagers.len(),
                "Previous match never ended, refunding its stakes"
            );
            self.refund();
            self.window.reset();
        }

        let Some(id) = self.window.open(Utc::now(), self.settings.window) else {
            debug!("Betting window already open");
            return;
        };
        self.timer.arm(id, self.settings.window);
        info!(%id, "Betting open");
        self.log(host, "Betting is now open - place your bets!");
    }

    fn close_window(&mut self, trigger: CloseTrigger, host: &dyn GameHost) {
        if !self.window.close(trigger) {
            return;
        }
        self.timer.cancel();

        for (player, wager) in &self.wagers {
            self.ledger.debit(*player, wager.amount);
        }

        let pot = settlement::pot(&self.wagers);
        info!(pot, bettors = self.wagers.len(), ?trigger, "Betting closed, stakes escrowed");
        let pot_msg = if pot > 0 {
            format!("The pot is ^3{pot}^7 credits.")
        } else {
            "There were no bets.".to_string()
        };
        self.log(host, &format!("Betting is now closed. {pot_msg}"));
    }

    /// Give escrowed stakes back.
    fn refund(&mut self) {
        for (player, wager) in &self.wagers {
            self.ledger.credit(*player, wager.amount);
        }
        self.clear_wagers();
    }

    fn clear_wagers(&mut self) {
        self.wagers.clear();
        self.names.clear();
    }

    fn on_match_end(&mut self, end: &MatchEnd, host: &dyn GameHost) -> Result<()> {
        self.timer.cancel();

        if end.aborted {
            match self.window.reset() {
                WindowState::Idle => return Ok(()),
                WindowState::Open { .. } => self.clear_wagers(),
                WindowState::Closed { .. } => self.refund(),
            }
            info!("Match aborted, wagers cancelled");
            self.log(host, "No one wins: game was aborted.");
            return Ok(());
        }

        match self.window.state() {
            WindowState::Idle => return Ok(()),
            WindowState::Open { id, .. } => {
                error!(%id, bettors = self.wagers.len(), "Match ended with betting still open, wagers discarded");
                self.window.reset();
                self.clear_wagers();
                self.log_error(host, "Betting never closed: all bets are cancelled.");
                return Ok(());
            }
            WindowState::Closed { .. } => {}
        }

        // a tie settles as a blue win
        let winner = end.winner().unwrap_or(Team::Blue);
        let result = settle(&self.wagers, winner, self.settings.rounding);
        self.window.finish();
        self.wagers.clear();

        let paid = self.pay_out(&result, host);
        self.names.clear();
        paid
    }

    fn pay_out(&mut self, result: &Settlement, host: &dyn GameHost) -> Result<()> {
        let winner = result.winner;
        if result.outcome == Outcome::NoBets {
            debug!(%winner, "Nothing to settle");
            return Ok(());
        }

        for entry in &result.entries {
            if entry.payout > 0 {
                self.ledger.credit(entry.player, entry.payout);
            }
        }
        info!(
            %winner,
            outcome = ?result.outcome,
            pot = result.pot,
            paid = result.total_paid(),
            unallocated = result.unallocated(),
            "Bets settled"
        );

        self.ledger.save(&self.settings.ledger_path)?;
        self.report(result, host);
        self.notify(result, host);
        Ok(())
    }

    fn report(&self, result: &Settlement, host: &dyn GameHost) {
        match result.outcome {
            Outcome::NoBets => {}
            Outcome::AllWon => self.log(host, "Everyone bet on the winner: stakes returned."),
            Outcome::AllLost => self.log(host, "Everyone bet on the loser: no one wins."),
            Outcome::Split => {
                self.header(host, "Bets for this game:");
                for entry in &result.entries {
                    let color = if entry.won() { "^2" } else { "^1" };
                    host.broadcast(&format!(
                        "^5{:>30}^7 : {color}{:>5}^7 on {}",
                        self.name_of(entry.player),
                        entry.delta,
                        entry.team.colored()
                    ));
                }
            }
        }
    }

    /// Tell every bettor still connected how they did.
    fn notify(&self, result: &Settlement, host: &dyn GameHost) {
        let connected: HashSet<SteamId> = host.players().iter().map(|p| p.steam_id).collect();
        for entry in result.entries.iter().filter(|e| connected.contains(&e.player)) {
            let balance = self.ledger.balance(entry.player);
            let msg = match entry.delta {
                d if d > 0 => format!("You won ^3{d}^7 credits. You have ^3{balance}^7 credits."),
                d if d < 0 => format!("You lost ^3{}^7 credits. You have ^3{balance}^7 credits.", -d),
                _ => format!("You got your ^3{}^7 credits back.", entry.stake),
            };
            host.tell(entry.player, &msg);
        }
    }

    // -- Command -------------------------------------------------------------

    /// Apply a wager request from `player`. `args` are the tokens after the
    /// command word.
    pub fn place_bet(&mut self, player: SteamId, args: &[&str]) -> Result<BetChange, TimbaError> {
        if !self.window.is_open() {
            return Err(TimbaError::BettingClosed);
        }
        if args.is_empty() {
            return Ok(BetChange::Balance);
        }

        let request = parse_bet(args)?;
        let available = self.ledger.balance(player);
        if request.amount > available {
            return Err(TimbaError::InsufficientCredits {
                needed: request.amount,
                available,
            });
        }

        if request.amount == 0 {
            return Ok(match self.wagers.remove(&player) {
                Some(_) => BetChange::Removed,
                None => BetChange::NothingToRemove,
            });
        }

        self.ledger.entry(player);
        self.wagers
            .insert(player, Wager::new(request.team, request.amount));
        debug!(player, team = %request.team, amount = request.amount, "Wager placed");
        Ok(BetChange::Placed {
            team: request.team,
            amount: request.amount,
        })
    }

    fn on_command(&mut self, command: &ChatCommand, host: &dyn GameHost) {
        let player = command.player.steam_id;

        if self.check_game_type(host).is_err() {
            host.tell(
                player,
                &format!(
                    "You can only bet on these game types: {}.",
                    self.settings.game_types.join(", ")
                ),
            );
            return;
        }

        let balance = self.ledger.balance(player);
        let args = command.args();
        let args = args.get(1..).unwrap_or_default();

        let change = self.place_bet(player, args);
        match change {
            Ok(BetChange::Placed { .. }) => {
                self.names.insert(player, clean_name(&command.player.name));
            }
            Ok(BetChange::Removed) => {
                self.names.remove(&player);
            }
            _ => {}
        }

        let reply = match change {
            Ok(BetChange::Balance) => format!("You have ^3{balance}^7 credits to bet."),
            Ok(BetChange::Placed { team, amount }) => format!(
                "You bet ^3{amount}^7 credits on team {}. You have ^3{}^7 credits left.",
                team.colored(),
                balance - amount
            ),
            Ok(BetChange::Removed) => "You removed your bet.".to_string(),
            Ok(BetChange::NothingToRemove) => "You have no bet to remove.".to_string(),
            Err(TimbaError::BettingClosed) => format!(
                "You can only bet during warmup. You have ^3{balance}^7 credits to bet."
            ),
            Err(TimbaError::InsufficientCredits { available, .. }) => {
                format!("^1You only have ^3{available}^7 credits to bet.")
            }
            Err(e) => {
                debug!(player, error = %e, "Bet rejected");
                format!(
                    "To bet: ^5!timba (red|blue) <amount>^7. You have ^3{balance}^7 credits to bet."
                )
            }
        };
        host.tell(player, &reply);
    }
}

impl Plugin for Timba {
    fn name(&self) -> &'static str {
        "timba"
    }

    fn hooks(&self) -> &'static [EventKind] {
        &[
            EventKind::Countdown,
            EventKind::MatchStart,
            EventKind::MatchEnd,
            EventKind::WindowExpired,
        ]
    }

    fn commands(&self) -> &'static [&'static str] {
        &["timba"]
    }

    fn handle_event(&mut self, event: &GameEvent, host: &dyn GameHost) -> Result<()> {
        match event {
            GameEvent::Countdown => self.on_countdown(host),
            GameEvent::MatchStart => self.close_window(CloseTrigger::MatchStart, host),
            GameEvent::WindowExpired(id) => self.close_window(CloseTrigger::Timeout(*id), host),
            GameEvent::MatchEnd(end) => self.on_match_end(end, host)?,
            GameEvent::Command(_) => {}
        }
        Ok(())
    }

    fn handle_command(&mut self, command: &ChatCommand, host: &dyn GameHost) -> Result<()> {
        self.on_command(command, host);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
