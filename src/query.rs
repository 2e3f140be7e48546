//! Declarative query cache with stale-time, garbage collection and retries.
//!
//! This module provides a [`QueryClient`] that owns cached query results,
//! similar to SWR or TanStack Query.
//!
//! # Features
//!
//! - **Keys**: hierarchical [`QueryKey`]s; invalidating a prefix invalidates every key under it
//! - **Queries**: [`QueryOptions`] bind a key to a fetcher and per-query policy
//! - **Observers**: [`QueryObserver`] subscribes to an entry and exposes typed state
//! - **Deduplication**: at most one in-flight fetch per key
//! - **Retries**: exponential backoff, 3 retries for queries and 1 for [`Mutation`]s
//! - **Garbage collection**: entries without subscribers are dropped after `gc_time`
//! - **Refetch triggers**: focus regained, connectivity restored, stale mount
//!
//! # Example
//!
//! ```rust
//! use ward::query::{QueryClient, QueryError, QueryKey, QueryOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = QueryClient::new();
//! let options = QueryOptions::new(QueryKey::new(["user", "123"]), || async {
//!     Ok::<_, QueryError>("Ada".to_string())
//! });
//!
//! let mut observer = client.subscribe(&options);
//! let state = observer.wait_settled().await;
//! assert_eq!(state.data().map(String::as_str), Some("Ada"));
//!
//! // Mark everything under ["user"] stale; the subscribed entry refetches.
//! client.invalidate(&QueryKey::new(["user"])).await;
//! # }
//! ```

mod cache;
mod client;
mod config;
mod error;
mod key;
pub mod mutation;
mod observer;
mod options;
mod retry;

pub use cache::QueryStatus;
pub use client::{LifecycleEvent, QueryClient};
pub use config::{MutationConfig, QueryConfig};
pub use error::QueryError;
pub use key::{KeySegment, QueryKey, ResourceKeys};
pub use mutation::{Mutation, MutationResult, MutationState};
pub use observer::{Query, QueryObserver, QueryResult, QueryState};
pub use options::QueryOptions;
pub use retry::RetryPolicy;
