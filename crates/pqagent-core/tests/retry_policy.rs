//! Classified retry behavior against a virtual clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use pqagent_core::config::RetryConfig;
use pqagent_core::{ProviderError, ProviderErrorKind, RetryPolicy};

fn policy() -> RetryPolicy {
    RetryPolicy::from(&RetryConfig {
        max_attempts: 3,
        backoff_base_secs: 2.0,
    })
}

#[tokio::test(start_paused = true)]
async fn test_two_transient_failures_then_success() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let value = policy()
        .call(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(ProviderError::from_status(429, "Too Many Requests")),
                    1 => Err(ProviderError::new(ProviderErrorKind::Network, "connection reset")),
                    _ => Ok("answer"),
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "answer");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Two backoff delays: 2^1 + 2^2 seconds.
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_is_not_retried() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let err = policy()
        .call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::from_status(401, "invalid api key")) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts, 1);
    assert!(!err.exhausted);
    assert_eq!(err.error.kind, ProviderErrorKind::Auth);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_errors_fall_back_to_markers() {
    let calls = AtomicU32::new(0);
    let err = policy()
        .call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(ProviderError::new(
                    ProviderErrorKind::Unknown,
                    "upstream said: Gateway Timeout",
                ))
            }
        })
        .await
        .unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(err.exhausted);

    let calls = AtomicU32::new(0);
    let err = policy()
        .call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(ProviderError::new(
                    ProviderErrorKind::Unknown,
                    "content policy refusal",
                ))
            }
        })
        .await
        .unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!err.exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_never_sleeps() {
    let policy = RetryPolicy::from(&RetryConfig {
        max_attempts: 1,
        backoff_base_secs: 2.0,
    });
    let start = Instant::now();
    let err = policy
        .call(|| async { Err::<(), _>(ProviderError::from_status(503, "busy")) })
        .await
        .unwrap_err();
    assert!(err.exhausted);
    assert_eq!(err.attempts, 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}
