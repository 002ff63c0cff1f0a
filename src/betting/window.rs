//! Betting window state machine and its close timer.
//!
//! ```text
//! Idle --open--> Open --close--> Closed --finish--> Idle
//!                  \                \
//!                   `----reset------`----> Idle
//! ```
//!
//! Each opened window gets a fresh id. The timer close names the id it was
//! armed for, so a timer fire that races with an explicit close (or that
//! belongs to an earlier window) finds the state already moved on and does
//! nothing.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    /// Accepting wagers.
    Open {
        id: Uuid,
        opened_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    },
    /// Wagers frozen and escrowed, waiting for the match result.
    Closed { id: Uuid },
}

/// What is asking the window to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    MatchStart,
    /// Timer armed for the window with this id.
    Timeout(Uuid),
}

#[derive(Debug)]
pub struct BettingWindow {
    state: WindowState,
}

impl Default for BettingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl BettingWindow {
    pub fn new() -> Self {
        Self {
            state: WindowState::Idle,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WindowState::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, WindowState::Closed { .. })
    }

    /// Idle → Open. Returns the new window id, or `None` when not idle.
    pub fn open(&mut self, now: DateTime<Utc>, duration: Duration) -> Option<Uuid> {
        if self.state != WindowState::Idle {
            return None;
        }
        let length = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        let id = Uuid::new_v4();
        self.state = WindowState::Open {
            id,
            opened_at: now,
            closes_at: now + length,
        };
        debug!(%id, closes_at = %(now + length), "Betting window opened");
        Some(id)
    }

    /// Open → Closed. Returns whether this call closed the window.
    pub fn close(&mut self, trigger: CloseTrigger) -> bool {
        let WindowState::Open { id, .. } = self.state else {
            return false;
        };
        if let CloseTrigger::Timeout(armed) = trigger {
            if armed != id {
                debug!(%armed, current = %id, "Stale window timer ignored");
                return false;
            }
        }
        self.state = WindowState::Closed { id };
        debug!(%id, ?trigger, "Betting window closed");
        true
    }

    /// Closed → Idle once the match is settled. Returns whether the window
    /// was closed.
    pub fn finish(&mut self) -> bool {
        if !self.is_closed() {
            return false;
        }
        self.state = WindowState::Idle;
        true
    }

    /// Back to Idle from anywhere, returning the state left behind.
    pub fn reset(&mut self) -> WindowState {
        std::mem::replace(&mut self.state, WindowState::Idle)
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Sends `GameEvent::WindowExpired` back into the event loop after the
/// window duration. Without a channel or a running tokio runtime it does
/// nothing and windows close on match start only.
#[derive(Debug, Default)]
pub struct WindowTimer {
    events: Option<UnboundedSender<GameEvent>>,
    task: Option<JoinHandle<()>>,
}

impl WindowTimer {
    pub fn new(events: UnboundedSender<GameEvent>) -> Self {
        Self {
            events: Some(events),
            task: None,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Arm for window `id`, replacing any pending timer.
    pub fn arm(&mut self, id: Uuid, after: Duration) {
        self.cancel();
        let Some(events) = self.events.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%id, "No async runtime, betting window will close on match start only");
            return;
        };
        self.task = Some(runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if events.send(GameEvent::WindowExpired(id)).is_err() {
                debug!(%id, "Event loop gone before window expired");
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for WindowTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const LENGTH: Duration = Duration::from_secs(30);

    #[test]
    fn test_full_cycle() {
        let mut window = BettingWindow::new();
        let now = Utc::now();

        let id = window.open(now, LENGTH).unwrap();
        match window.state() {
            WindowState::Open { id: open_id, opened_at, closes_at } => {
                assert_eq!(open_id, id);
                assert_eq!(opened_at, now);
                assert_eq!(closes_at, now + chrono::Duration::seconds(30));
            }
            other => panic!("unexpected state {other:?}"),
        }

        assert!(window.close(CloseTrigger::MatchStart));
        assert_eq!(window.state(), WindowState::Closed { id });
        assert!(window.finish());
        assert_eq!(window.state(), WindowState::Idle);
    }

    #[test]
    fn test_open_only_from_idle() {
        let mut window = BettingWindow::new();
        assert!(window.open(Utc::now(), LENGTH).is_some());
        assert!(window.open(Utc::now(), LENGTH).is_none());
        window.close(CloseTrigger::MatchStart);
        assert!(window.open(Utc::now(), LENGTH).is_none());
    }

    #[test]
    fn test_close_is_guarded() {
        let mut window = BettingWindow::new();
        assert!(!window.close(CloseTrigger::MatchStart));

        let id = window.open(Utc::now(), LENGTH).unwrap();
        assert!(window.close(CloseTrigger::Timeout(id)));
        // second path arriving late is a no-op
        assert!(!window.close(CloseTrigger::MatchStart));
        assert!(!window.close(CloseTrigger::Timeout(id)));
    }

    #[test]
    fn test_stale_timeout_ignored() {
        let mut window = BettingWindow::new();
        let old = window.open(Utc::now(), LENGTH).unwrap();
        window.reset();
        let _new = window.open(Utc::now(), LENGTH).unwrap();

        assert!(!window.close(CloseTrigger::Timeout(old)));
        assert!(window.is_open());
    }

    #[test]
    fn test_finish_requires_closed() {
        let mut window = BettingWindow::new();
        assert!(!window.finish());
        window.open(Utc::now(), LENGTH);
        assert!(!window.finish());
        assert!(window.is_open());
    }

    #[test]
    fn test_reset_returns_previous_state() {
        let mut window = BettingWindow::new();
        let id = window.open(Utc::now(), LENGTH).unwrap();
        window.close(CloseTrigger::MatchStart);
        assert_eq!(window.reset(), WindowState::Closed { id });
        assert_eq!(window.reset(), WindowState::Idle);
    }

    #[test]
    fn test_timer_without_runtime_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timer = WindowTimer::new(tx);
        timer.arm(Uuid::new_v4(), Duration::from_millis(1));
        assert!(!timer.is_armed());

        let mut disabled = WindowTimer::disabled();
        disabled.arm(Uuid::new_v4(), Duration::from_millis(1));
        assert!(!disabled.is_armed());
    }

    #[tokio::test]
    async fn test_timer_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = WindowTimer::new(tx);
        let id = Uuid::new_v4();
        timer.arm(id, Duration::from_millis(10));
        assert!(timer.is_armed());

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(GameEvent::WindowExpired(id)));
    }

    #[tokio::test]
    async fn test_cancelled_timer_does_not_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = WindowTimer::new(tx);
        timer.arm(Uuid::new_v4(), Duration::from_millis(20));
        timer.cancel();
        assert!(!timer.is_armed());

        let waited = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_rearm_replaces_pending_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = WindowTimer::new(tx);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        timer.arm(first, Duration::from_millis(20));
        timer.arm(second, Duration::from_millis(20));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(GameEvent::WindowExpired(second)));
    }
}
