//! Retry Controller - bounded exponential backoff for transport failures
//!
//! Only retryable errors (see [`IndexerError::is_retryable`]) trigger another
//! attempt. Every attempt re-sends the whole batch.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use contracts::{Destination, IndexerError, RetryConfig};

/// Backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
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
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `n` (1-indexed): `initial * multiplier^(n-1)`, capped
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base_us = self.initial_delay.as_micros() as f64 * self.multiplier.powi(exponent);
        let capped_us = base_us.min(self.max_delay.as_micros() as f64);
        Duration::from_micros(capped_us as u64)
    }
}

/// Result of an operation run under a retry policy
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, IndexerError>,
    /// Attempts made beyond the first
    pub retries: u32,
}

/// Run `attempt` until it succeeds, fails permanently, or the bound is hit
///
/// Exhaustion yields `RetriesExhausted` wrapping the last cause.
/// Sleeping only suspends the calling task.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    destination: &Destination,
    mut attempt: F,
) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IndexerError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut retries = 0;

    loop {
        match attempt().await {
            Ok(value) => {
                if retries > 0 {
                    info!(destination = %destination, retries, "Submission recovered after retry");
                }
                return Retried {
                    result: Ok(value),
                    retries,
                };
            }
            Err(e) if !e.is_retryable() => {
                return Retried {
                    result: Err(e),
                    retries,
                };
            }
            Err(e) if retries + 1 >= max_attempts => {
                return Retried {
                    result: Err(IndexerError::RetriesExhausted {
                        destination: destination.to_string(),
                        attempts: retries + 1,
                        source: Box::new(e),
                    }),
                    retries,
                };
            }
            Err(e) => {
                retries += 1;
                let delay = policy.delay_for_retry(retries);
                warn!(
                    destination = %destination,
                    attempt = retries,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transport failure, retrying batch"
                );
                tokio::time::sleep(delay).await;
                debug!(destination = %destination, attempt = retries + 1, "Retrying");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_retry(0), Duration::ZERO);
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_retry(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let outcome = with_retry(&fast_policy(3), &"e".into(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(IndexerError::transport("/x", "connection reset"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_cause() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let outcome: Retried<()> = with_retry(&fast_policy(3), &"e".into(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(IndexerError::certificate_path("/x", "UnknownIssuer"))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.retries, 2);
        let err = outcome.result.unwrap_err();
        assert!(matches!(err, IndexerError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.is_certificate_error());
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let outcome: Retried<()> = with_retry(&fast_policy(5), &"e".into(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(IndexerError::contract_violation("/x", "count"))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.retries, 0);
        assert!(matches!(
            outcome.result.unwrap_err(),
            IndexerError::ContractViolation { .. }
        ));
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let outcome: Retried<()> = with_retry(&fast_policy(1), &"e".into(), || async {
            Err(IndexerError::transport("/x", "down"))
        })
        .await;
        assert_eq!(outcome.retries, 0);
        assert!(matches!(
            outcome.result.unwrap_err(),
            IndexerError::RetriesExhausted { attempts: 1, .. }
        ));
    }
}
