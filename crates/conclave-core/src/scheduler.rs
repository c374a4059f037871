//! Single-shot timer abstraction driving the synchronization state machine.
//!
//! The call core never blocks: "waiting" is expressed by scheduling a future
//! callback and returning. A scheduler hands back a cancellation guard per
//! timer; arming a timer of the same kind again always cancels the previous
//! one first, so at most one timer of each kind is live per chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::identifiers::ChainId;

/// Which of a chain's two timers elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Short delay spent waiting for a missing predecessor block to arrive
    /// on its own before asking the transport for it.
    WaitForBlocks,
    /// Long interval between health polls while a chain is caught up.
    HealthPoll,
}

/// Token a scheduled timer delivers back to the call driver, identifying
/// the chain and timer kind that elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    /// The chain whose timer elapsed.
    pub chain: ChainId,
    /// Which of the chain's timers elapsed.
    pub kind: TimerKind,
}

/// Cancellation guard for one scheduled timer.
///
/// Dropping the handle cancels the timer; a cancelled timer's token must not
/// be delivered.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Wraps a shared cancellation flag checked by the scheduler at fire
    /// time.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }

    /// Cancels the timer without dropping the handle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler of single-shot, cancellable timers.
pub trait TimerScheduler: Send + Sync {
    /// Schedules a single-shot timer. The token is delivered to the call
    /// driver once `after` elapses, unless the returned handle is cancelled
    /// first.
    fn schedule_once(&self, after: Duration, token: TimerToken) -> TimerHandle;
}

/// Production scheduler backed by the Tokio runtime.
///
/// Each armed timer is a spawned task that sleeps and then forwards its
/// token over an unbounded channel; the embedder drains the channel and
/// hands every token to the call controller. Requires a running runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerToken>,
}

impl TokioScheduler {
    /// Creates the scheduler together with the stream of elapsed tokens.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule_once(&self, after: Duration, token: TimerToken) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle::new(Arc::clone(&cancelled));
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !cancelled.load(Ordering::SeqCst) {
                // The receiver going away means the call is being torn down.
                let _ = tx.send(token);
            }
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> TimerToken {
        TimerToken {
            chain: ChainId::Membership,
            kind: TimerKind::WaitForBlocks,
        }
    }

    #[test]
    fn dropping_a_handle_cancels() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TimerHandle::new(Arc::clone(&cancelled));
        assert!(!handle.is_cancelled());
        drop(handle);
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tokio_scheduler_delivers_tokens() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let _armed = scheduler.schedule_once(Duration::from_millis(1), token());
        let delivered = rx.recv().await;
        assert_eq!(delivered, Some(token()));
    }

    #[tokio::test]
    async fn tokio_scheduler_honors_cancellation() {
        let (scheduler, mut rx) = TokioScheduler::new();
        let armed = scheduler.schedule_once(Duration::from_millis(5), token());
        armed.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
