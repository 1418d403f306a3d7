//! Retry with exponential backoff for external-service calls.
//!
//! Retry is driven by the error's own [`ReconcileError::is_retryable`]
//! predicate, never by blind repetition: "template not found" is terminal,
//! "service unavailable" retries until the attempt budget is spent.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::ReconcileResult;

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and base delay.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never waits, for tests and in-process backends.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }

    /// Executes an operation, retrying retryable failures with backoff.
    ///
    /// ## Errors
    ///
    /// Returns the first non-retryable error, or the last error once the
    /// attempt budget is exhausted.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ReconcileResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ReconcileResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() || attempt >= self.max_attempts => {
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        if self.jitter_factor <= 0.0 {
            return exp;
        }
        let jitter = exp.mul_f64(self.jitter_factor * rand::rng().random_range(0.0..1.0));
        (exp + jitter).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ReconcileError;

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ReconcileError>(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);

        let result = policy
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ReconcileError::ServiceUnavailable("flaky".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let policy = RetryPolicy::immediate(5);
        let calls = AtomicU32::new(0);

        let result: ReconcileResult<()> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReconcileError::DataError("template not found".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);

        let result: ReconcileResult<()> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ReconcileError::ServiceUnavailable("still down".into()))
            })
            .await;

        assert!(matches!(
            result.unwrap_err(),
            ReconcileError::ServiceUnavailable(_)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter_factor: 0.0,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(4), Duration::from_millis(350));
    }
}
