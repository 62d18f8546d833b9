// ABOUTME: Resilience primitives protecting external calls.
// ABOUTME: Contains bounded backoff retry and per-resource circuit breaking.

mod breaker;
mod retry;

pub use breaker::{BreakerRegistry, CircuitBreaker};
pub use retry::{with_retry, with_retry_if, RetryOptions};

#[cfg(test)]
mod retry_test;
