use std::time::Duration;

use tokio::sync::mpsc;

use super::timer::{Countdown, TimerToken};
use crate::engine::EngineInput;

/// Debounces local keystrokes into `typing` emissions and holds the remote
/// party's typing flag for the open conversation.
///
/// Methods that return `Option<bool>` hand back the `isTyping` value the
/// caller must emit, or `None` when nothing goes on the wire.
#[derive(Debug)]
pub struct TypingCoordinator {
    idle_after: Duration,
    remote_expiry: Option<Duration>,
    signaling: bool,
    idle: Countdown,
    remote_typing: bool,
    remote_expiry_timer: Countdown,
}

impl TypingCoordinator {
    pub fn new(idle_after: Duration, remote_expiry: Option<Duration>) -> Self {
        Self {
            idle_after,
            remote_expiry,
            signaling: false,
            idle: Countdown::new(),
            remote_typing: false,
            remote_expiry_timer: Countdown::new(),
        }
    }

    /// One local keystroke. Emits `true` only on the first keystroke of a
    /// burst; every keystroke restarts the idle countdown.
    pub fn on_local_input(&mut self, queue: &mpsc::UnboundedSender<EngineInput>) -> Option<bool> {
        self.idle
            .start(self.idle_after, queue, EngineInput::TypingIdle);
        if self.signaling {
            None
        } else {
            self.signaling = true;
            Some(true)
        }
    }

    pub fn on_idle_elapsed(&mut self, token: TimerToken) -> Option<bool> {
        if !self.idle.expire(token) {
            return None;
        }
        self.stop_signaling()
    }

    /// Sending a message ends the burst immediately.
    pub fn on_send(&mut self) -> Option<bool> {
        self.idle.cancel();
        self.stop_signaling()
    }

    /// Conversation switch or teardown: cancel the countdown and clear the
    /// remote flag. Returns the terminal `false` owed to the old room, if any.
    pub fn reset(&mut self) -> Option<bool> {
        self.idle.cancel();
        self.clear_remote();
        self.stop_signaling()
    }

    pub fn is_signaling(&self) -> bool {
        self.signaling
    }

    /// Apply a pushed typing flag. Returns whether the displayed flag changed.
    pub fn on_remote(&mut self, is_typing: bool, queue: &mpsc::UnboundedSender<EngineInput>) -> bool {
        match (is_typing, self.remote_expiry) {
            (true, Some(expiry)) => {
                self.remote_expiry_timer
                    .start(expiry, queue, EngineInput::RemoteTypingExpired);
            }
            _ => {
                self.remote_expiry_timer.cancel();
            }
        }
        let changed = self.remote_typing != is_typing;
        self.remote_typing = is_typing;
        changed
    }

    /// The sender went quiet without a terminal `false`.
    pub fn on_remote_expired(&mut self, token: TimerToken) -> bool {
        if !self.remote_expiry_timer.expire(token) || !self.remote_typing {
            return false;
        }
        log::debug!("Remote typing indicator expired without a terminal event");
        self.remote_typing = false;
        true
    }

    pub fn remote_typing(&self) -> bool {
        self.remote_typing
    }

    fn clear_remote(&mut self) {
        self.remote_expiry_timer.cancel();
        self.remote_typing = false;
    }

    fn stop_signaling(&mut self) -> Option<bool> {
        if self.signaling {
            self.signaling = false;
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(2);

    async fn next_idle(rx: &mut mpsc::UnboundedReceiver<EngineInput>) -> TimerToken {
        match rx.recv().await {
            Some(EngineInput::TypingIdle(token)) => token,
            other => panic!("expected TypingIdle, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_emits_single_true_then_single_false() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(IDLE, None);

        let mut emitted = Vec::new();
        for _ in 0..5 {
            emitted.extend(typing.on_local_input(&tx));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(emitted, vec![true]);

        let token = next_idle(&mut rx).await;
        assert_eq!(typing.on_idle_elapsed(token), Some(false));
        assert_eq!(typing.on_idle_elapsed(token), None);
        assert!(!typing.is_signaling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_cancels_countdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(IDLE, None);

        assert_eq!(typing.on_local_input(&tx), Some(true));
        assert_eq!(typing.on_send(), Some(false));
        assert_eq!(typing.on_send(), None);

        drop(tx);
        tokio::time::sleep(IDLE * 2).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_flag_without_expiry_stays_set() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(IDLE, None);

        assert!(typing.on_remote(true, &tx));
        assert!(!typing.on_remote(true, &tx));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(typing.remote_typing());
        assert!(typing.on_remote(false, &tx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_flag_expires_when_configured() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(IDLE, Some(Duration::from_secs(5)));

        typing.on_remote(true, &tx);
        let token = match rx.recv().await {
            Some(EngineInput::RemoteTypingExpired(token)) => token,
            other => panic!("expected RemoteTypingExpired, got {other:?}"),
        };
        assert!(typing.on_remote_expired(token));
        assert!(!typing.remote_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_owes_terminal_false() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut typing = TypingCoordinator::new(IDLE, None);
        typing.on_local_input(&tx);
        typing.on_remote(true, &tx);

        assert_eq!(typing.reset(), Some(false));
        assert!(!typing.remote_typing());
        assert_eq!(typing.reset(), None);
    }
}
