// ABOUTME: CancelHandle - cooperative cancellation signal for one child run.
// ABOUTME: First cancel wins; the signal is waitable and checkable at every suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cooperative cancellation signal for one in-flight child run.
///
/// Exclusively owned by the orchestrator, one per session key, and removed
/// from the active set the instant the run reaches a terminal state. Never
/// persisted. Cancellation is cooperative, not preemptive: in-flight
/// external calls stop only if they observe the signal.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// Create an unsignaled handle.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Signal cancellation. Returns true only for the first call.
    pub fn cancel(&self) -> bool {
        let first = self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    /// Check the signal without suspending.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been signaled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // cancel between check and await cannot be missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_cancel_returns_true_exactly_once() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_signal() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();

        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("waiter should resolve after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_signaled() {
        let handle = CancelHandle::new();
        handle.cancel();

        tokio::time::timeout(Duration::from_millis(50), handle.cancelled())
            .await
            .expect("already-cancelled handle should resolve immediately");
    }

    #[tokio::test]
    async fn test_clones_share_the_signal() {
        let handle = CancelHandle::new();
        let clone = handle.clone();

        handle.cancel();
        assert!(clone.is_cancelled());
    }
}
