use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one arming of a [`Countdown`]. Tokens are unique per process, so
/// a fire notification that was already queued when its countdown was
/// canceled can never be mistaken for a newer arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// One-shot cancellable timer. When it elapses, the value built by `fire` is
/// posted to the owner's input queue; the owner then calls [`Countdown::expire`]
/// with the token it carries.
#[derive(Debug, Default)]
pub struct Countdown {
    armed: Option<(TimerToken, JoinHandle<()>)>,
}

impl Countdown {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// (Re)start the countdown. Any previous arming is canceled first.
    pub fn start<T, F>(&mut self, delay: Duration, queue: &mpsc::UnboundedSender<T>, fire: F) -> TimerToken
    where
        T: Send + 'static,
        F: FnOnce(TimerToken) -> T + Send + 'static,
    {
        self.cancel();
        let token = TimerToken::next();
        let queue = queue.clone();
        // Deadline is fixed at arming time, not when the task is first polled.
        let sleep = tokio::time::sleep(delay);
        let handle = tokio::spawn(async move {
            sleep.await;
            let _ = queue.send(fire(token));
        });
        self.armed = Some((token, handle));
        token
    }

    /// Returns whether a countdown was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a fire notification. Returns `false` for stale tokens.
    pub fn expire(&mut self, token: TimerToken) -> bool {
        match &self.armed {
            Some((live, _)) if *live == token => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}
