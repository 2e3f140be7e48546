//! Cache entries and the snapshots they publish to observers.

use std::fmt;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::QueryConfig;
use super::error::QueryError;
use super::key::QueryKey;
use super::options::{AnyData, ErasedOptions};

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Created but never fetched (or disabled).
    Idle,
    /// A fetch is in flight. Previously fetched data, if any, is still served.
    Pending,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed after exhausting its retries.
    Error,
}

/// Future resolving once a fetch has settled (committed, discarded or cancelled).
pub(crate) type Settled = Shared<BoxFuture<'static, ()>>;

pub(crate) struct InFlight {
    pub seq: u64,
    pub token: CancellationToken,
    pub settled: Settled,
}

/// Published, type-erased view of an entry.
#[derive(Clone)]
pub(crate) struct EntrySnapshot {
    pub status: QueryStatus,
    pub data: Option<AnyData>,
    pub error: Option<QueryError>,
    pub updated_at: Option<Instant>,
    pub stale_time: Duration,
    pub invalidated: bool,
    pub failure_count: u32,
}

impl EntrySnapshot {
    /// Returns `true` if the data should be refreshed at `now`.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        if self.invalidated || self.data.is_none() {
            return true;
        }
        self.updated_at
            .is_none_or(|at| now.saturating_duration_since(at) > self.stale_time)
    }
}

/// A cache entry owned by the [`QueryClient`](super::QueryClient).
///
/// Every state change is published on a watch channel, which is how
/// observers learn about transitions.
pub(crate) struct QueryEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<AnyData>,
    pub error: Option<QueryError>,
    pub updated_at: Option<Instant>,
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub invalidated: bool,
    pub failure_count: u32,
    pub subscribers: usize,
    pub options: Option<ErasedOptions>,
    /// Sequence number of the most recently issued fetch; only it may commit.
    pub fetch_seq: u64,
    pub in_flight: Option<InFlight>,
    /// Bumped by [`defer_gc`](Self::defer_gc) so pending GC timers become void.
    pub gc_generation: u64,
    pub gc_scheduled: bool,
    tx: watch::Sender<EntrySnapshot>,
}

impl QueryEntry {
    pub fn new(key: QueryKey, config: &QueryConfig) -> Self {
        let mut entry = Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            stale_time: config.stale_time,
            gc_time: config.gc_time,
            invalidated: false,
            failure_count: 0,
            subscribers: 0,
            options: None,
            fetch_seq: 0,
            in_flight: None,
            gc_generation: 0,
            gc_scheduled: false,
            tx: watch::channel(Self::empty_snapshot(config.stale_time)).0,
        };
        entry.publish();
        entry
    }

    fn empty_snapshot(stale_time: Duration) -> EntrySnapshot {
        EntrySnapshot {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            stale_time,
            invalidated: false,
            failure_count: 0,
        }
    }

    /// Stores the latest options, applying their overrides on top of `config`.
    pub fn register(&mut self, options: ErasedOptions, config: &QueryConfig) {
        self.stale_time = options.stale_time.unwrap_or(config.stale_time);
        self.gc_time = options.gc_time.unwrap_or(config.gc_time);
        self.options = Some(options);
    }

    pub fn is_enabled(&self) -> bool {
        self.options.as_ref().is_some_and(|o| o.enabled)
    }

    /// Errors are always refetchable; otherwise staleness depends on age and invalidation.
    pub fn needs_fetch(&self, now: Instant) -> bool {
        self.status == QueryStatus::Error || self.snapshot().is_stale_at(now)
    }

    /// Marks this entry as stale.
    pub fn mark_stale(&mut self) {
        self.invalidated = true;
        self.publish();
    }

    pub fn begin_fetch(&mut self, in_flight: InFlight) {
        self.defer_gc();
        self.fetch_seq = in_flight.seq;
        self.in_flight = Some(in_flight);
        self.status = QueryStatus::Pending;
        self.failure_count = 0;
        self.publish();
    }

    /// Voids any pending GC timer. The next orphaned commit arms a new one.
    pub fn defer_gc(&mut self) {
        self.gc_generation += 1;
        self.gc_scheduled = false;
    }

    pub fn record_failure(&mut self, failure_count: u32) {
        self.failure_count = failure_count;
        self.publish();
    }

    /// Updates the entry with new data, resetting timestamp and staleness.
    pub fn update(&mut self, data: AnyData) {
        self.data = Some(data);
        self.error = None;
        self.updated_at = Some(Instant::now());
        self.invalidated = false;
        self.failure_count = 0;
        self.status = QueryStatus::Success;
        self.in_flight = None;
        self.publish();
    }

    /// Records a terminal failure. Previously fetched data is kept.
    pub fn fail(&mut self, error: QueryError) {
        self.error = Some(error);
        self.failure_count += 1;
        self.status = QueryStatus::Error;
        self.in_flight = None;
        self.publish();
    }

    /// Cancels the in-flight fetch, if any; its result will never commit.
    pub fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn watch(&self) -> watch::Receiver<EntrySnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            stale_time: self.stale_time,
            invalidated: self.invalidated,
            failure_count: self.failure_count,
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.tx.send_replace(snapshot);
    }
}

impl fmt::Debug for QueryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEntry")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("subscribers", &self.subscribers)
            .field("fetch_seq", &self.fetch_seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry() -> QueryEntry {
        QueryEntry::new(
            QueryKey::new(["patients"]),
            &QueryConfig::new(Duration::from_millis(50), Duration::from_secs(1)),
        )
    }

    #[test]
    fn test_new_entry() {
        let entry = entry();
        assert_eq!(entry.status, QueryStatus::Idle);
        assert!(entry.data.is_none());
        assert_eq!(entry.subscribers, 0);
        assert!(!entry.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness() {
        let mut entry = entry();
        assert!(entry.needs_fetch(Instant::now()), "no data is stale");

        entry.update(Arc::new(42));
        assert!(!entry.needs_fetch(Instant::now()));

        tokio::time::advance(Duration::from_millis(51)).await;
        assert!(entry.needs_fetch(Instant::now()));
    }

    #[test]
    fn test_mark_stale() {
        let mut entry = entry();
        entry.update(Arc::new(42));
        let rx = entry.watch();
        entry.mark_stale();
        assert!(entry.needs_fetch(Instant::now()));
        assert!(rx.borrow().invalidated);
    }

    #[test]
    fn test_update_clears_error_and_staleness() {
        let mut entry = entry();
        entry.fail(QueryError::Network("down".to_string()));
        assert_eq!(entry.status, QueryStatus::Error);
        assert!(entry.needs_fetch(Instant::now()));

        entry.mark_stale();
        entry.update(Arc::new(100));
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.error.is_none());
        assert!(!entry.invalidated);
    }

    #[test]
    fn test_begin_fetch_voids_pending_gc() {
        use futures::FutureExt;

        let mut entry = entry();
        entry.gc_scheduled = true;
        let generation = entry.gc_generation;
        entry.begin_fetch(InFlight {
            seq: 1,
            token: CancellationToken::new(),
            settled: futures::future::ready(()).boxed().shared(),
        });

        assert_eq!(entry.status, QueryStatus::Pending);
        assert!(!entry.gc_scheduled);
        assert_ne!(entry.gc_generation, generation);
    }

    #[test]
    fn test_fail_keeps_data() {
        let mut entry = entry();
        entry.update(Arc::new(1));
        entry.fail(QueryError::Fetch("boom".to_string()));
        assert_eq!(entry.status, QueryStatus::Error);
        assert!(entry.data.is_some());
        assert!(entry.needs_fetch(Instant::now()));
    }
}
