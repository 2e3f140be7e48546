use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::error::QueryError;
use super::key::QueryKey;
use super::retry::RetryPolicy;

/// Type-erased cached value.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// Type-erased fetch function stored by the cache engine.
pub(crate) type ErasedFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData, QueryError>> + Send + Sync>;

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

/// Immutable description of a query: what to cache, how to fetch it and with which policy.
///
/// Options are built per call and are not stored by whoever builds them; the
/// [`QueryClient`](super::QueryClient) keeps the latest options of each entry.
/// Building options has no side effect: the fetcher only runs when the cache
/// engine executes it.
///
/// ```
/// use std::time::Duration;
/// use ward::query::{QueryError, QueryKey, QueryOptions};
///
/// let options = QueryOptions::new(QueryKey::new(["answer"]), || async {
///     Ok::<_, QueryError>(42)
/// })
/// .stale_time(Duration::from_secs(60));
///
/// assert!(options.is_enabled());
/// ```
pub struct QueryOptions<T> {
    key: QueryKey,
    fetcher: Fetcher<T>,
    stale_time: Option<Duration>,
    gc_time: Option<Duration>,
    retry: Option<RetryPolicy>,
    enabled: bool,
}

impl<T> QueryOptions<T>
where
    T: Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(move || fetcher().boxed()),
            stale_time: None,
            gc_time: None,
            retry: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    #[must_use]
    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = Some(gc_time);
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// A disabled query stays idle and its fetcher is never invoked.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Invokes the fetcher directly, bypassing the cache.
    pub fn fetch(&self) -> BoxFuture<'static, Result<T, QueryError>> {
        (self.fetcher)()
    }

    pub(crate) fn erase(&self) -> ErasedOptions {
        let fetcher = self.fetcher.clone();
        ErasedOptions {
            fetcher: Arc::new(move || {
                fetcher()
                    .map(|result| result.map(|data| Arc::new(data) as AnyData))
                    .boxed()
            }),
            stale_time: self.stale_time,
            gc_time: self.gc_time,
            retry: self.retry,
            enabled: self.enabled,
        }
    }
}

impl<T> QueryOptions<T> {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn stale_time_override(&self) -> Option<Duration> {
        self.stale_time
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            stale_time: self.stale_time,
            gc_time: self.gc_time,
            retry: self.retry,
            enabled: self.enabled,
        }
    }
}

impl<T> fmt::Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("key", &self.key)
            .field("stale_time", &self.stale_time)
            .field("gc_time", &self.gc_time)
            .field("retry", &self.retry)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// The engine-side view of [`QueryOptions`], without the value type.
#[derive(Clone)]
pub(crate) struct ErasedOptions {
    pub fetcher: ErasedFetcher,
    pub stale_time: Option<Duration>,
    pub gc_time: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_defaults() {
        let options = QueryOptions::new(QueryKey::new(["a"]), || async { Ok(1) });
        assert!(options.is_enabled());
        assert_eq!(options.stale_time_override(), None);
        assert_eq!(options.key(), &QueryKey::new(["a"]));
    }

    #[test]
    fn test_construction_has_no_side_effect() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let options = QueryOptions::new(QueryKey::new(["a"]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .enabled(false)
        .stale_time(Duration::from_secs(1));

        let _erased = options.clone().erase();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!options.is_enabled());
    }

    #[tokio::test]
    async fn test_erased_fetcher_downcasts() {
        let options = QueryOptions::new(QueryKey::new(["a"]), || async {
            Ok("hello".to_string())
        });
        let data = (options.erase().fetcher)().await.expect("fetch should succeed");
        let value = data.downcast::<String>().expect("type should round-trip");
        assert_eq!(value.as_str(), "hello");
    }
}
