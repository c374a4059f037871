//! Manual timer scheduler: records armed timers, fires nothing by itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conclave_core::{TimerHandle, TimerScheduler, TimerToken};
use parking_lot::Mutex;

struct Armed {
    token: TimerToken,
    after: Duration,
    cancelled: Arc<AtomicBool>,
}

/// Deterministic [`TimerScheduler`]: every `schedule_once` is recorded, and
/// the test decides when (and whether) a timer elapses by draining the
/// recorded tokens and handing them to the controller.
#[derive(Default)]
pub struct ManualScheduler {
    timers: Mutex<Vec<Armed>>,
}

impl ManualScheduler {
    /// Creates a scheduler with no armed timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens of all live (not yet cancelled) timers, in arm order.
    pub fn armed(&self) -> Vec<TimerToken> {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.token)
            .collect()
    }

    /// The delay the given token was most recently armed with, if live.
    pub fn armed_delay(&self, token: TimerToken) -> Option<Duration> {
        self.timers
            .lock()
            .iter()
            .rev()
            .find(|t| t.token == token && !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.after)
    }

    /// Removes every recorded timer and returns the tokens of the live
    /// ones, in arm order. The caller then delivers each token to the
    /// controller to simulate the timers elapsing.
    pub fn drain(&self) -> Vec<TimerToken> {
        self.timers
            .lock()
            .drain(..)
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.token)
            .collect()
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule_once(&self, after: Duration, token: TimerToken) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.lock().push(Armed {
            token,
            after,
            cancelled: Arc::clone(&cancelled),
        });
        TimerHandle::new(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::{ChainId, TimerKind};

    #[test]
    fn cancelled_timers_are_not_reported() {
        let scheduler = ManualScheduler::new();
        let token = TimerToken {
            chain: ChainId::Session,
            kind: TimerKind::HealthPoll,
        };
        let handle = scheduler.schedule_once(Duration::from_secs(1), token);
        assert_eq!(scheduler.armed(), vec![token]);
        drop(handle);
        assert!(scheduler.armed().is_empty());
        assert!(scheduler.drain().is_empty());
    }
}
