//! Retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::QueryError;

/// How often a failed fetch is retried and how long to wait in between.
///
/// The delay before retry `n` (0-indexed) is `min(base_delay * 2^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt. `retries + 1` attempts in total.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(retries: u32) -> Self {
        Self {
            retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub const fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// Total number of attempts, first try included.
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds or the policy is exhausted.
    ///
    /// `on_failure` is invoked with the failure count after every failed
    /// attempt that will be retried, so callers can publish progress.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        label: &str,
        mut op: F,
        mut on_failure: impl FnMut(u32, &QueryError),
    ) -> Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries => {
                    let delay = self.delay_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        target: "ward::retry",
                        key = label,
                        attempt,
                        retries = self.retries,
                        delay_ms = saturating_millis(delay),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    on_failure(attempt, &err);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Whole milliseconds in `delay`, clamped to `u64::MAX`.
fn saturating_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_unbounded_backoff_saturates() {
        let policy = RetryPolicy::new(64).with_backoff(Duration::from_secs(1), Duration::MAX);
        let delay = policy.delay_for_attempt(63);
        assert_eq!(delay, Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_after_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut failures = Vec::new();
        let policy = RetryPolicy::new(3);

        let result: Result<(), _> = policy
            .run(
                "test",
                || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(QueryError::Network("down".to_string()))
                    }
                },
                |count, _| failures.push(count),
            )
            .await;

        assert_eq!(result, Err(QueryError::Network("down".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(failures, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3);

        let result = policy
            .run(
                "test",
                || {
                    let calls = calls.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(QueryError::Fetch("flaky".to_string()))
                        } else {
                            Ok(7)
                        }
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
