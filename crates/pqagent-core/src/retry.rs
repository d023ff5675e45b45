//! Classified retry with exponential backoff for model-service calls.
//!
//! Only upstream calls go through here; tool execution is never retried.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::model::ProviderError;
use crate::obs;

/// A model-service call that could not be completed.
#[derive(Debug, thiserror::Error)]
#[error("upstream call failed after {attempts} attempt(s): {error}")]
pub struct UpstreamError {
    #[source]
    pub error: ProviderError,
    pub attempts: u32,
    /// `true` when the failure was transient but every attempt was used.
    pub exhausted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1).
    pub max_attempts: u32,
    pub backoff_base_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base_secs: config.backoff_base_secs,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (1-based):
    /// `backoff_base_secs ^ attempt` seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_base_secs.powi(exponent);
        if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => {
                    return Err(UpstreamError {
                        error,
                        attempts: attempt,
                        exhausted: false,
                    })
                }
                Err(error) if attempt >= max_attempts => {
                    return Err(UpstreamError {
                        error,
                        attempts: attempt,
                        exhausted: true,
                    })
                }
                Err(error) => {
                    let delay = self.backoff_delay(attempt);
                    obs::emit_upstream_retry(
                        attempt,
                        max_attempts,
                        delay.as_millis() as u64,
                        &error,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            backoff_base_secs: 2.0,
        });
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion() {
        let calls = AtomicU32::new(0);
        let err = RetryPolicy::default()
            .call(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::from_status(503, "unavailable")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert!(err.exhausted);
        assert_eq!(err.error.kind, ProviderErrorKind::ServerError);
    }
}
