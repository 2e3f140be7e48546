use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::future::join_all;
use futures::{FutureExt, Stream, StreamExt};
use tokio::runtime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::subscription::Handle;

use super::cache::{InFlight, QueryEntry, QueryStatus, Settled};
use super::config::{MutationConfig, QueryConfig};
use super::error::QueryError;
use super::key::QueryKey;
use super::observer::{QueryObserver, QueryState};
use super::options::{AnyData, ErasedFetcher, QueryOptions};
use super::retry::RetryPolicy;

/// Application lifecycle signals that may trigger refetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The application gained (`true`) or lost (`false`) foreground focus.
    Focus(bool),
    /// Network connectivity was restored (`true`) or lost (`false`).
    Online(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// Fetch only when stale; attach to an in-flight fetch if there is one.
    IfStale,
    /// Always fetch, superseding any in-flight fetch.
    Force,
}

/// A client owning the query cache.
///
/// The `QueryClient` is the central state manager for queries. It handles:
/// - Storing one entry per [`QueryKey`]
/// - Deduplicating concurrent fetches of the same key
/// - Retrying failures with exponential backoff
/// - Invalidation by key prefix
/// - Garbage collection of entries nobody subscribes to
/// - Refetching on focus, reconnect and mount
///
/// Construct one per process (or per test) and pass clones to consumers;
/// clones share the same cache. The client spawns fetches and timers on the
/// current Tokio runtime, so it must be used from within one.
///
/// # Example
///
/// ```rust
/// use ward::query::{QueryClient, QueryConfig};
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // gc_time
/// );
///
/// let client = QueryClient::with_config(config);
/// assert!(client.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    entries: DashMap<QueryKey, QueryEntry>,
    config: QueryConfig,
    mutation_config: MutationConfig,
    seq: AtomicU64,
    focused: AtomicBool,
    online: AtomicBool,
}

impl Default for ClientInner {
    fn default() -> Self {
        Self::new(QueryConfig::default(), MutationConfig::default())
    }
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self::with_configs(config, MutationConfig::default())
    }

    #[must_use]
    pub fn with_configs(config: QueryConfig, mutation_config: MutationConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner::new(config, mutation_config)),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    pub fn mutation_config(&self) -> &MutationConfig {
        &self.inner.mutation_config
    }

    /// Subscribes to the entry for `options.key()`, creating it if absent.
    ///
    /// The entry keeps the latest options it was subscribed with. If the
    /// query is enabled and has no data yet, or is stale and
    /// [`QueryConfig::refetch_on_mount`] is set, a fetch is started. Dropping
    /// the returned observer unsubscribes.
    pub fn subscribe<T>(&self, options: &QueryOptions<T>) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
    {
        let key = options.key().clone();
        let (rx, has_data) = {
            let mut entry = self.entry_mut(&key);
            entry.register(options.erase(), &self.inner.config);
            entry.subscribers += 1;
            entry.defer_gc();
            (entry.watch(), entry.data.is_some())
        };
        debug!(key = %key, "subscribed");

        if !has_data || self.inner.config.refetch_on_mount {
            self.inner.schedule(&key, FetchMode::IfStale);
        }
        QueryObserver::new(self.clone(), key, rx)
    }

    /// Fetches the entry if it is missing data or stale.
    ///
    /// At most one fetch per key is in flight: if one is already running this
    /// waits for it instead of starting another. Returns `None` if the key is
    /// unknown.
    pub async fn ensure_fresh(&self, key: &QueryKey) -> Option<QueryStatus> {
        if let Some(settled) = self.inner.schedule(key, FetchMode::IfStale) {
            settled.await;
        }
        self.wait_settled(key).await
    }

    /// Refetches the entry regardless of staleness, superseding any in-flight fetch.
    ///
    /// Disabled entries are left untouched.
    pub async fn refetch(&self, key: &QueryKey) -> Option<QueryStatus> {
        if let Some(settled) = self.inner.schedule(key, FetchMode::Force) {
            settled.await;
        }
        self.wait_settled(key).await
    }

    /// Runs the query once without subscribing and returns its data.
    ///
    /// Cached fresh data is returned without fetching. The entry is garbage
    /// collected after `gc_time` unless someone subscribes.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Disabled`] for a disabled query, or the error the
    /// fetch settled with.
    pub async fn fetch_query<T>(&self, options: &QueryOptions<T>) -> Result<Arc<T>, QueryError>
    where
        T: Send + Sync + 'static,
    {
        if !options.is_enabled() {
            return Err(QueryError::Disabled);
        }
        let key = options.key().clone();
        let mut rx = {
            let mut entry = self.entry_mut(&key);
            entry.register(options.erase(), &self.inner.config);
            entry.watch()
        };
        self.inner.schedule(&key, FetchMode::IfStale);

        let snapshot = rx
            .wait_for(|s| s.status != QueryStatus::Pending)
            .await
            .map_err(|_| QueryError::Cancelled)?
            .clone();
        let state = QueryState::<T>::from_snapshot(&snapshot);
        if state.status == QueryStatus::Error {
            return Err(state.error.unwrap_or(QueryError::Cancelled));
        }
        state.data.ok_or(QueryError::Cancelled)
    }

    /// Like [`fetch_query`](Self::fetch_query), discarding the result.
    pub async fn prefetch<T>(&self, options: &QueryOptions<T>)
    where
        T: Send + Sync + 'static,
    {
        if let Err(err) = self.fetch_query(options).await {
            debug!(key = %options.key(), error = %err, "prefetch failed");
        }
    }

    /// Marks every entry under `prefix` stale.
    ///
    /// Entries with at least one subscriber are refreshed (via the same path
    /// as [`ensure_fresh`](Self::ensure_fresh)) and this waits for those
    /// fetches. Entries without subscribers are only marked. Returns the
    /// number of entries matched.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let (matched, settled) = self.inner.invalidate(prefix);
        join_all(settled).await;
        matched
    }

    /// Writes `data` into the cache as a successful result.
    ///
    /// Any in-flight fetch for the key is superseded.
    pub fn set_query_data<T>(&self, key: &QueryKey, data: T)
    where
        T: Send + Sync + 'static,
    {
        {
            let mut entry = self.entry_mut(key);
            entry.cancel_in_flight();
            entry.defer_gc();
            entry.fetch_seq = self.inner.next_seq();
            entry.update(Arc::new(data));
        }
        self.inner.schedule_gc_if_orphaned(key);
    }

    /// Returns the cached data for `key`, if present and of type `T`.
    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let data = self.inner.entries.get(key)?.data.clone()?;
        data.downcast::<T>().ok()
    }

    /// Returns the current status of the entry for `key`.
    pub fn status(&self, key: &QueryKey) -> Option<QueryStatus> {
        self.inner.entries.get(key).map(|e| e.status)
    }

    /// Returns the number of active subscribers of the entry for `key`.
    pub fn subscriber_count(&self, key: &QueryKey) -> Option<usize> {
        self.inner.entries.get(key).map(|e| e.subscribers)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Evicts the entry for `key`, cancelling its in-flight fetch.
    pub fn remove(&self, key: &QueryKey) -> bool {
        match self.inner.entries.remove(key) {
            Some((_, mut entry)) => {
                entry.cancel_in_flight();
                true
            }
            None => false,
        }
    }

    /// Evicts every entry.
    pub fn clear(&self) {
        self.inner.entries.retain(|_, entry| {
            entry.cancel_in_flight();
            false
        });
    }

    /// Records a focus change. Regaining focus refreshes stale subscribed entries.
    ///
    /// Returns the number of entries a fetch was started or joined for.
    pub fn focus_changed(&self, focused: bool) -> usize {
        let was_focused = self.inner.focused.swap(focused, Ordering::SeqCst);
        if focused && !was_focused && self.inner.config.refetch_on_window_focus {
            debug!("focus regained");
            self.inner.refresh_active()
        } else {
            0
        }
    }

    /// Records a connectivity change. Reconnecting refreshes stale subscribed entries.
    ///
    /// Returns the number of entries a fetch was started or joined for.
    pub fn online_changed(&self, online: bool) -> usize {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if online && !was_online && self.inner.config.refetch_on_reconnect {
            debug!("connectivity restored");
            self.inner.refresh_active()
        } else {
            0
        }
    }

    pub fn is_focused(&self) -> bool {
        self.inner.focused.load(Ordering::SeqCst)
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Feeds a stream of lifecycle events into this client until cancelled.
    pub fn attach_lifecycle<S>(&self, events: S) -> Handle
    where
        S: Stream<Item = LifecycleEvent> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let client = self.clone();
        let join = tokio::spawn(async move {
            let mut events = std::pin::pin!(events);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    event = events.next() => match event {
                        Some(LifecycleEvent::Focus(focused)) => {
                            client.focus_changed(focused);
                        }
                        Some(LifecycleEvent::Online(online)) => {
                            client.online_changed(online);
                        }
                        None => break,
                    },
                }
            }
        });
        Handle::new(token, join)
    }

    pub(crate) fn unsubscribe(&self, key: &QueryKey) {
        self.inner.release(key);
    }

    pub(crate) fn schedule_refetch(&self, key: &QueryKey) -> bool {
        self.inner.schedule(key, FetchMode::Force).is_some()
    }

    async fn wait_settled(&self, key: &QueryKey) -> Option<QueryStatus> {
        let mut rx = self.inner.entries.get(key)?.watch();
        rx.wait_for(|s| s.status != QueryStatus::Pending)
            .await
            .ok()
            .map(|s| s.status)
    }

    fn entry_mut(&self, key: &QueryKey) -> dashmap::mapref::one::RefMut<'_, QueryKey, QueryEntry> {
        self.inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| QueryEntry::new(key.clone(), &self.inner.config))
    }
}

impl ClientInner {
    fn new(config: QueryConfig, mutation_config: MutationConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            mutation_config,
            seq: AtomicU64::new(0),
            focused: AtomicBool::new(true),
            online: AtomicBool::new(true),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Starts (or joins) a fetch for `key` and returns a future resolving once it settles.
    ///
    /// All bookkeeping happens while the entry is locked; the fetch itself is
    /// spawned and never runs under the lock.
    fn schedule(self: &Arc<Self>, key: &QueryKey, mode: FetchMode) -> Option<Settled> {
        let mut entry = self.entries.get_mut(key)?;
        if !entry.is_enabled() {
            trace!(key = %key, "query disabled, not fetching");
            return None;
        }
        let options = entry.options.clone()?;

        match mode {
            FetchMode::IfStale => {
                if let Some(in_flight) = &entry.in_flight {
                    trace!(key = %key, seq = in_flight.seq, "joining in-flight fetch");
                    return Some(in_flight.settled.clone());
                }
                if !entry.needs_fetch(Instant::now()) {
                    return None;
                }
            }
            FetchMode::Force => {
                if entry.cancel_in_flight() {
                    trace!(key = %key, "superseding in-flight fetch");
                }
            }
        }

        let seq = self.next_seq();
        let token = CancellationToken::new();
        let retry = options.retry.unwrap_or(self.config.retry);
        let settled = run_fetch(
            Arc::downgrade(self),
            key.clone(),
            seq,
            options.fetcher,
            retry,
            token.clone(),
        )
        .boxed()
        .shared();

        entry.begin_fetch(InFlight {
            seq,
            token,
            settled: settled.clone(),
        });
        drop(entry);

        debug!(key = %key, seq, "fetch started");
        tokio::spawn(settled.clone());
        Some(settled)
    }

    fn record_failure(&self, key: &QueryKey, seq: u64, failure_count: u32) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.fetch_seq == seq {
                entry.record_failure(failure_count);
            }
        }
    }

    /// Stores the result of fetch `seq` if it is still the latest one issued for `key`.
    fn commit(self: &Arc<Self>, key: &QueryKey, seq: u64, result: Result<AnyData, QueryError>) {
        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                trace!(key = %key, seq, "entry evicted, discarding result");
                return;
            };
            if entry.fetch_seq != seq {
                trace!(key = %key, seq, latest = entry.fetch_seq, "discarding superseded result");
                return;
            }
            match result {
                Ok(data) => {
                    debug!(key = %key, seq, "fetch succeeded");
                    entry.update(data);
                }
                Err(err) => {
                    error!(key = %key, seq, error = %err, "fetch failed");
                    entry.fail(err);
                }
            }
        }
        self.schedule_gc_if_orphaned(key);
    }

    fn invalidate(self: &Arc<Self>, prefix: &QueryKey) -> (usize, Vec<Settled>) {
        let mut matched = 0;
        let mut active = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if entry.key.starts_with(prefix) {
                matched += 1;
                entry.mark_stale();
                if entry.subscribers > 0 {
                    active.push(entry.key.clone());
                }
            }
        }
        debug!(prefix = %prefix, matched, active = active.len(), "invalidated");

        let settled = active
            .iter()
            .filter_map(|key| self.schedule(key, FetchMode::IfStale))
            .collect();
        (matched, settled)
    }

    fn refresh_active(self: &Arc<Self>) -> usize {
        let active: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|entry| entry.subscribers > 0)
            .map(|entry| entry.key.clone())
            .collect();
        active
            .iter()
            .filter_map(|key| self.schedule(key, FetchMode::IfStale))
            .count()
    }

    fn release(self: &Arc<Self>, key: &QueryKey) {
        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return;
            };
            entry.subscribers = entry.subscribers.saturating_sub(1);
            debug!(key = %key, subscribers = entry.subscribers, "unsubscribed");
        }
        self.schedule_gc_if_orphaned(key);
    }

    /// Starts the inactivity timer of an entry without subscribers, once.
    fn schedule_gc_if_orphaned(self: &Arc<Self>, key: &QueryKey) {
        let (generation, gc_time) = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return;
            };
            if entry.subscribers > 0 || entry.gc_scheduled {
                return;
            }
            entry.gc_scheduled = true;
            (entry.gc_generation, entry.gc_time)
        };

        // An observer may be dropped after the runtime is gone; nothing to clean up then.
        let Ok(handle) = runtime::Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let key = key.clone();
        handle.spawn(async move {
            tokio::time::sleep(gc_time).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let removed = inner.entries.remove_if(&key, |_, entry| {
                entry.subscribers == 0
                    && entry.gc_generation == generation
                    && entry.in_flight.is_none()
            });
            if removed.is_some() {
                debug!(key = %key, "garbage collected");
                return;
            }
            // Still fetching: the commit re-arms the timer.
            if let Some(mut entry) = inner.entries.get_mut(&key) {
                if entry.gc_generation == generation {
                    entry.gc_scheduled = false;
                }
            }
        });
    }
}

async fn run_fetch(
    inner: Weak<ClientInner>,
    key: QueryKey,
    seq: u64,
    fetcher: ErasedFetcher,
    retry: RetryPolicy,
    token: CancellationToken,
) {
    let label = key.to_string();
    let attempts = retry.run(
        &label,
        || fetcher(),
        |failure_count, _| {
            if let Some(inner) = inner.upgrade() {
                inner.record_failure(&key, seq, failure_count);
            }
        },
    );

    let result = tokio::select! {
        () = token.cancelled() => {
            trace!(key = %label, seq, "fetch cancelled");
            return;
        }
        result = attempts => result,
    };

    if let Some(inner) = inner.upgrade() {
        inner.commit(&key, seq, result);
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.entries.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
