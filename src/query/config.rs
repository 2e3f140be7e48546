use std::time::Duration;

use super::retry::RetryPolicy;

/// Configuration for query behavior.
///
/// This controls how queries cache data, when they consider it stale and
/// how failures are retried. Individual [`QueryOptions`](super::QueryOptions)
/// may override the timing and retry fields.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// When data is fresh, queries will use cached data without refetching.
    /// Once stale, queries will refetch in the background while still showing cached data.
    pub stale_time: Duration,

    /// How long an entry without subscribers is retained before being garbage collected.
    pub gc_time: Duration,

    /// Retry policy for failed fetches.
    pub retry: RetryPolicy,

    /// Refetch stale entries with subscribers when the application regains focus.
    pub refetch_on_window_focus: bool,

    /// Refetch stale entries with subscribers when connectivity is restored.
    pub refetch_on_reconnect: bool,

    /// Refetch a stale entry when a new subscriber mounts.
    pub refetch_on_mount: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            gc_time: Duration::from_secs(10 * 60),
            retry: RetryPolicy::new(3),
            refetch_on_window_focus: true,
            refetch_on_reconnect: true,
            refetch_on_mount: true,
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale and gc times.
    #[must_use]
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_refetch_triggers(mut self, focus: bool, reconnect: bool, mount: bool) -> Self {
        self.refetch_on_window_focus = focus;
        self.refetch_on_reconnect = reconnect;
        self.refetch_on_mount = mount;
        self
    }
}

/// Configuration for mutations.
#[derive(Debug, Clone)]
pub struct MutationConfig {
    /// Mutations modify data, so they retry more conservatively than queries.
    pub retry: RetryPolicy,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.stale_time, Duration::from_secs(5 * 60));
        assert_eq!(config.gc_time, Duration::from_secs(10 * 60));
        assert_eq!(config.retry.retries, 3);
        assert!(config.refetch_on_window_focus);
        assert!(config.refetch_on_reconnect);
        assert!(config.refetch_on_mount);
    }

    #[test]
    fn test_new_config() {
        let config = QueryConfig::new(Duration::from_secs(30), Duration::from_secs(300))
            .with_retry(RetryPolicy::none())
            .with_refetch_triggers(false, true, false);
        assert_eq!(config.stale_time, Duration::from_secs(30));
        assert_eq!(config.gc_time, Duration::from_secs(300));
        assert_eq!(config.retry.retries, 0);
        assert!(!config.refetch_on_window_focus);
        assert!(config.refetch_on_reconnect);
        assert!(!config.refetch_on_mount);
    }

    #[test]
    fn test_mutation_default_retries_once() {
        assert_eq!(MutationConfig::default().retry.retries, 1);
    }
}
