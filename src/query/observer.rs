//! Subscription handles and typed query state.
//!
//! A [`QueryObserver`] is what a consumer holds after
//! [`QueryClient::subscribe`]: it reads typed snapshots of one cache entry,
//! waits for transitions and can trigger a refetch. It has no other way to
//! mutate the entry. Dropping it unsubscribes.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;

use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::cache::{EntrySnapshot, QueryStatus};
use super::client::QueryClient;
use super::error::QueryError;
use super::key::QueryKey;
use super::options::QueryOptions;

/// A typed snapshot of a cache entry.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// The last successfully fetched data. Kept while refetching and after errors.
    pub data: Option<Arc<T>>,
    /// The error of the last settled fetch, if it failed.
    pub error: Option<QueryError>,
    pub is_stale: bool,
    /// Failed attempts of the current fetch so far.
    pub failure_count: u32,
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_stale: self.is_stale,
            failure_count: self.failure_count,
            updated_at: self.updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_stale: true,
            failure_count: 0,
            updated_at: None,
        }
    }
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_snapshot(snapshot: &EntrySnapshot) -> Self {
        let (data, error) = match snapshot.data.clone().map(|d| d.downcast::<T>()) {
            Some(Ok(data)) => (Some(data), snapshot.error.clone()),
            Some(Err(_)) => (
                None,
                Some(QueryError::Decode(
                    "cached value has a different type".to_string(),
                )),
            ),
            None => (None, snapshot.error.clone()),
        };
        Self {
            status: snapshot.status,
            data,
            error,
            is_stale: snapshot.is_stale_at(Instant::now()),
            failure_count: snapshot.failure_count,
            updated_at: snapshot.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    /// Returns the data if any was fetched, otherwise `None`.
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }

    /// Returns `true` while the first fetch is in flight and there is nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending && self.data.is_none()
    }

    /// Returns `true` while any fetch is in flight, including background refetches.
    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// The error message to display, if the last fetch failed.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// A query result containing the current state.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub key: QueryKey,
    pub state: QueryState<T>,
}

/// A live subscription to one cache entry.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    rx: watch::Receiver<EntrySnapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryObserver<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(client: QueryClient, key: QueryKey, rx: watch::Receiver<EntrySnapshot>) -> Self {
        Self {
            client,
            key,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The current state of the entry.
    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(&self.rx.borrow())
    }

    /// Waits for the next state transition.
    ///
    /// Returns `None` if the entry was evicted.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.state())
    }

    /// Waits until no fetch is in flight and returns that state.
    pub async fn wait_settled(&mut self) -> QueryState<T> {
        let settled = self
            .rx
            .wait_for(|s| s.status != QueryStatus::Pending)
            .await
            .map(|snapshot| QueryState::from_snapshot(&snapshot));
        settled.unwrap_or_else(|_| self.state())
    }

    /// Refetches regardless of staleness and waits for the result.
    ///
    /// A disabled query is not fetched; its current state is returned.
    pub async fn refetch(&mut self) -> QueryState<T> {
        if self.client.schedule_refetch(&self.key) {
            self.wait_settled().await
        } else {
            self.state()
        }
    }

    /// Unsubscribes. Equivalent to dropping the observer.
    pub fn unsubscribe(self) {}

    /// Converts this observer into a stream of results, yielding the current
    /// state first and then every transition. The subscription lives as long
    /// as the stream.
    pub fn into_stream(self) -> BoxStream<'static, QueryResult<T>> {
        let rx = self.rx.clone();
        let key = self.key.clone();
        WatchStream::new(rx)
            .map(move |snapshot| {
                let _observer = &self;
                QueryResult {
                    key: key.clone(),
                    state: QueryState::from_snapshot(&snapshot),
                }
            })
            .boxed()
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.client.unsubscribe(&self.key);
    }
}

impl<T> fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("status", &self.rx.borrow().status)
            .finish_non_exhaustive()
    }
}

/// A query as a subscription source.
///
/// Subscribing starts observing the entry (fetching if needed) and yields a
/// [`QueryResult`] for the current state and every later transition.
///
/// ```rust,ignore
/// let sub = Subscription::new(Query::new(patients.all(), client.clone()))
///     .map(Message::Patients);
/// ```
pub struct Query<T> {
    options: QueryOptions<T>,
    client: QueryClient,
}

impl<T> Query<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(options: QueryOptions<T>, client: QueryClient) -> Self {
        Self { options, client }
    }
}

impl<T> SubscriptionSource for Query<T>
where
    T: Send + Sync + 'static,
{
    type Output = QueryResult<T>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        self.client.subscribe(&self.options).into_stream()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<T> Hash for Query<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.options.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: QueryStatus, data: Option<i32>) -> QueryState<i32> {
        QueryState {
            status,
            data: data.map(Arc::new),
            ..QueryState::default()
        }
    }

    #[test]
    fn test_query_state_data() {
        assert_eq!(state(QueryStatus::Success, Some(42)).data(), Some(&42));
        assert_eq!(state(QueryStatus::Pending, None).data(), None);
        assert_eq!(state(QueryStatus::Error, Some(1)).data(), Some(&1));
    }

    #[test]
    fn test_query_state_predicates() {
        let loading = state(QueryStatus::Pending, None);
        assert!(loading.is_loading());
        assert!(loading.is_fetching());
        assert!(!loading.is_success());

        let refetching = state(QueryStatus::Pending, Some(1));
        assert!(!refetching.is_loading());
        assert!(refetching.is_fetching());

        let success = state(QueryStatus::Success, Some(1));
        assert!(success.is_success());
        assert!(!success.is_error());

        let mut error = state(QueryStatus::Error, None);
        error.error = Some(QueryError::status(500, "Internal Server Error"));
        assert!(error.is_error());
        assert_eq!(
            error.error_message().as_deref(),
            Some("Request failed with status 500: Internal Server Error")
        );
        assert!(state(QueryStatus::Idle, None).is_idle());
    }

    #[test]
    fn test_query_id_consistency() {
        let client = QueryClient::new();
        let query1 = Query::new(
            QueryOptions::new(QueryKey::new(["user", "123"]), || async { Ok(42) }),
            client.clone(),
        );
        let query2 = Query::new(
            QueryOptions::new(QueryKey::new(["user", "123"]), || async { Ok(42) }),
            client,
        );
        assert_eq!(query1.id(), query2.id());
    }

    #[test]
    fn test_query_id_different_keys() {
        let client = QueryClient::new();
        let query1 = Query::new(
            QueryOptions::new(QueryKey::new(["user", "123"]), || async { Ok(42) }),
            client.clone(),
        );
        let query2 = Query::new(
            QueryOptions::new(QueryKey::new(["user", "456"]), || async { Ok(42) }),
            client,
        );
        assert_ne!(query1.id(), query2.id());
    }

    #[test]
    fn test_query_id_same_key_different_type() {
        let client = QueryClient::new();
        let query1 = Query::new(
            QueryOptions::new(QueryKey::new(["data"]), || async { Ok(42) }),
            client.clone(),
        );
        let query2 = Query::new(
            QueryOptions::new(QueryKey::new(["data"]), || async {
                Ok("test".to_string())
            }),
            client,
        );
        assert_ne!(query1.id(), query2.id());
    }

    #[test]
    fn test_query_hash_follows_key() {
        fn key_hash<T>(query: &Query<T>) -> u64 {
            let mut hasher = DefaultHasher::new();
            query.hash(&mut hasher);
            hasher.finish()
        }

        let client = QueryClient::new();
        let options = QueryOptions::new(QueryKey::new(["patients", "detail", "1"]), || async {
            Ok(1_u32)
        });
        let query = Query::new(options.clone(), client);

        let mut hasher = DefaultHasher::new();
        options.key().hash(&mut hasher);
        assert_eq!(key_hash(&query), hasher.finish());
    }

    #[tokio::test]
    async fn test_observer_sees_fetch_result() {
        let client = QueryClient::new();
        let options = QueryOptions::new(QueryKey::new(["answer"]), || async { Ok(42) });

        let mut observer = client.subscribe(&options);
        assert!(observer.state().is_loading());

        let state = observer.wait_settled().await;
        assert!(state.is_success());
        assert_eq!(state.data(), Some(&42));
        assert!(!state.is_stale);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let client = QueryClient::new();
        let options = QueryOptions::new(QueryKey::new(["answer"]), || async { Ok(42) });

        let first = client.subscribe(&options);
        let second = client.subscribe(&options);
        assert_eq!(client.subscriber_count(options.key()), Some(2));

        drop(first);
        assert_eq!(client.subscriber_count(options.key()), Some(1));
        second.unsubscribe();
        assert_eq!(client.subscriber_count(options.key()), Some(0));
    }

    #[tokio::test]
    async fn test_into_stream_yields_transitions() {
        let client = QueryClient::new();
        let options = QueryOptions::new(QueryKey::new(["answer"]), || async { Ok(42) });

        let mut stream = client.subscribe(&options).into_stream();
        let mut last = None;
        while let Some(result) = stream.next().await {
            if result.state.is_success() {
                last = Some(result);
                break;
            }
        }
        let result = last.expect("stream should reach success");
        assert_eq!(result.key, QueryKey::new(["answer"]));
        assert_eq!(result.state.data(), Some(&42));
    }
}
