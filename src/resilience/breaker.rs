// ABOUTME: Per-resource circuit breaker with lazy, check-on-read reset.
// ABOUTME: Opens after consecutive failures; one success fully heals the breaker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

struct BreakerState {
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Guard suppressing calls to a failing dependency for a cool-down period.
///
/// The breaker only answers "should I attempt this call?"; the fallback
/// policy when open is entirely the caller's decision. There is no
/// background timer and no half-open probing: crossing the reset window
/// closes the breaker as a side effect of the very `is_open()` check that
/// observes it. An idle open breaker with no subsequent traffic stays open
/// until the next check.
pub struct CircuitBreaker {
    threshold: u32,
    reset_window: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker that opens at `threshold` consecutive failures and
    /// heals once `reset_window` has elapsed since the last failure.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn new(threshold: u32, reset_window: Duration) -> Self {
        assert!(threshold > 0, "threshold must be positive");

        Self {
            threshold,
            reset_window,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    /// True while the failure count has reached the threshold and the reset
    /// window has not yet elapsed.
    ///
    /// When the window has elapsed, this check itself flips the breaker
    /// closed before returning false.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap();

        if state.consecutive_failures < self.threshold {
            return false;
        }

        match state.last_failure_at {
            Some(at) if at.elapsed() < self.reset_window => true,
            _ => {
                state.consecutive_failures = 0;
                state.last_failure_at = None;
                tracing::debug!("reset window elapsed, circuit closed");
                false
            }
        }
    }

    /// Record a failed call against the protected resource.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures += 1;
        state.last_failure_at = Some(Instant::now());

        if state.consecutive_failures == self.threshold {
            tracing::warn!(
                failures = state.consecutive_failures,
                "circuit opened after consecutive failures"
            );
        }
    }

    /// Record a successful call. Unconditionally zeroes the failure counter,
    /// closing the breaker immediately even inside the reset window.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures = 0;
        state.last_failure_at = None;
    }

    /// Current consecutive-failure count (for monitoring).
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().unwrap().consecutive_failures
    }
}

/// Keyed collection of breakers so independent call sites share one breaker
/// per protected resource.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    threshold: u32,
    reset_window: Duration,
}

impl BreakerRegistry {
    /// Create a registry; breakers it mints use the given threshold and window.
    pub fn new(threshold: u32, reset_window: Duration) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            threshold,
            reset_window,
        }
    }

    /// Get the breaker for a resource, creating it on first use.
    pub fn get(&self, resource: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(resource) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().unwrap();
        Arc::clone(
            breakers
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.threshold, self.reset_window))),
        )
    }

    /// Number of resources with a breaker.
    pub fn len(&self) -> usize {
        self.breakers.read().unwrap().len()
    }

    /// True if no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.read().unwrap().is_empty()
    }
}
