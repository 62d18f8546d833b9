// ABOUTME: Bounded exponential-backoff retry with jitter for fallible async operations.
// ABOUTME: Stateless and reentrant; concurrent callers never share backoff state.

use std::time::Duration;

use rand::Rng;

/// Options controlling retry behavior.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base delay; doubles each attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the base delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay ceiling.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before the retry following `attempt` (0-based).
    ///
    /// `min(base * 2^attempt + uniform(0, base * 0.5), max_delay)`; the
    /// jitter avoids synchronized retry storms from concurrent callers.
    pub(crate) fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let exponential = base * 2f64.powi(attempt.min(32) as i32);
        let jitter = rand::thread_rng().gen_range(0.0..=base * 0.5);
        Duration::from_secs_f64(exponential + jitter).min(self.max_delay)
    }
}

/// Run `op`, retrying on failure up to `options.max_retries` times.
///
/// The operation is invoked at most `1 + max_retries` times. Once retries
/// are exhausted the final error is returned unmodified.
pub async fn with_retry<T, E, F, Fut>(options: &RetryOptions, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    with_retry_if(options, op, |_, _| true).await
}

/// Like `with_retry`, but consults `should_retry(error, attempt_index)`
/// before each retry. Returning false aborts immediately with that error.
pub async fn with_retry_if<T, E, F, Fut, P>(
    options: &RetryOptions,
    mut op: F,
    mut should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: FnMut(&E, usize) -> bool,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= options.max_retries || !should_retry(&error, attempt) {
                    return Err(error);
                }

                let delay = options.delay_for(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
