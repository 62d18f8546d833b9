// ABOUTME: Tests for the backoff retry wrapper.
// ABOUTME: Covers attempt counting, error passthrough, predicates, and delay bounds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::retry::{with_retry, with_retry_if, RetryOptions};

fn fast_options() -> RetryOptions {
    RetryOptions::new()
        .max_retries(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_success_on_first_attempt_does_not_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: Result<i32, String> = with_retry(&fast_options(), move || {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_always_failing_op_invoked_exactly_four_times() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: Result<(), String> = with_retry(&fast_options(), move || {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("dependency down".to_string())
        }
    })
    .await;

    // max_retries = 3 means 1 initial attempt + 3 retries.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // The final error is returned unmodified.
    assert_eq!(result.unwrap_err(), "dependency down");
}

#[tokio::test]
async fn test_succeeds_after_transient_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: Result<&str, String> = with_retry(&fast_options(), move || {
        let calls = calls_clone.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("flaky".to_string())
            } else {
                Ok("recovered")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_predicate_aborts_early() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: Result<(), String> = with_retry_if(
        &fast_options(),
        move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal: bad credentials".to_string())
            }
        },
        |error, _attempt| !error.starts_with("fatal"),
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.unwrap_err(), "fatal: bad credentials");
}

#[tokio::test]
async fn test_predicate_receives_attempt_index() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let _: Result<(), String> = with_retry_if(
        &fast_options(),
        || async { Err("nope".to_string()) },
        move |_, attempt| {
            seen_clone.lock().unwrap().push(attempt);
            true
        },
    )
    .await;

    // Predicate is consulted before each of the three retries.
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let options = fast_options().max_retries(0);

    let result: Result<(), String> = with_retry(&options, move || {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delay_grows_exponentially_and_caps() {
    let options = RetryOptions::new()
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_millis(350));

    // Jitter adds at most base * 0.5 = 50ms.
    let d0 = options.delay_for(0);
    assert!(d0 >= Duration::from_millis(100) && d0 <= Duration::from_millis(150));

    let d1 = options.delay_for(1);
    assert!(d1 >= Duration::from_millis(200) && d1 <= Duration::from_millis(250));

    // 100 * 2^2 = 400ms exceeds the cap.
    assert_eq!(options.delay_for(2), Duration::from_millis(350));
    assert_eq!(options.delay_for(10), Duration::from_millis(350));
}

#[test]
fn test_default_options() {
    let options = RetryOptions::default();
    assert_eq!(options.max_retries, 3);
    assert_eq!(options.base_delay, Duration::from_millis(500));
    assert_eq!(options.max_delay, Duration::from_secs(30));
}
