//! Mutations: one-off operations that modify server data.
//!
//! Unlike queries, mutations are not cached. They retry with the client's
//! [`MutationConfig`](super::MutationConfig) (one retry by default) and, on
//! success, can invalidate the queries whose data they changed.
//!
//! # Example
//!
//! ```rust,ignore
//! let result = Mutation::new(|patient: NewPatient| async move { api.admit(patient).await })
//!     .invalidates(PATIENT_KEYS.all())
//!     .mutate(&client, new_patient)
//!     .await;
//! ```

use std::future::Future;

use futures::future::join_all;
use tracing::debug;

use super::client::QueryClient;
use super::error::QueryError;
use super::key::QueryKey;
use super::retry::RetryPolicy;

/// The settled state of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<T> {
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(String),
}

/// A mutation result containing the current state.
#[derive(Debug, Clone)]
pub struct MutationResult<T> {
    /// The current state of the mutation.
    pub state: MutationState<T>,
}

impl<T> MutationResult<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }
}

impl<T> From<Result<T, QueryError>> for MutationResult<T> {
    fn from(result: Result<T, QueryError>) -> Self {
        let state = match result {
            Ok(data) => MutationState::Success(data),
            Err(err) => MutationState::Error(err.to_string()),
        };
        Self { state }
    }
}

/// A mutation for performing data modifications (POST, PUT, PATCH, DELETE).
pub struct Mutation<F> {
    mutator: F,
    retry: Option<RetryPolicy>,
    invalidates: Vec<QueryKey>,
}

impl<F> Mutation<F> {
    pub fn new(mutator: F) -> Self {
        Self {
            mutator,
            retry: None,
            invalidates: Vec::new(),
        }
    }

    /// Overrides the client's mutation retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Invalidates `prefix` after a successful mutation.
    #[must_use]
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    /// Executes the mutation.
    ///
    /// Invalidation runs only on success and completes (including the
    /// refetches it triggers) before this returns.
    pub async fn mutate<I, O, Fut>(&self, client: &QueryClient, input: I) -> MutationResult<O>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<O, QueryError>>,
    {
        let retry = self.retry.unwrap_or(client.mutation_config().retry);
        let result = retry
            .run("mutation", || (self.mutator)(input.clone()), |_, _| {})
            .await;

        if result.is_ok() {
            debug!(invalidates = self.invalidates.len(), "mutation succeeded");
            join_all(self.invalidates.iter().map(|prefix| client.invalidate(prefix))).await;
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_mutation_result_data() {
        let result = MutationResult {
            state: MutationState::Success(42),
        };
        assert_eq!(result.data(), Some(&42));

        let result: MutationResult<i32> = MutationResult {
            state: MutationState::Error("error".to_string()),
        };
        assert_eq!(result.data(), None);
    }

    #[test]
    fn test_mutation_result_from_settled_outcome() {
        let success: MutationResult<i32> = Ok(7).into();
        assert!(success.is_success());
        assert!(!success.is_error());
        assert_eq!(success.state, MutationState::Success(7));

        let error: MutationResult<i32> = Err(QueryError::Fetch("boom".to_string())).into();
        assert!(error.is_error());
        assert_eq!(
            error.state,
            MutationState::Error("Fetch failed: boom".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_retries_once() {
        let client = QueryClient::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mutation = Mutation::new(move |_: ()| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(QueryError::status(500, "Internal Server Error"))
            }
        });

        let result = mutation.mutate(&client, ()).await;
        assert!(result.is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mutation_success_invalidates() {
        let client = QueryClient::new();
        let fetches = Arc::new(AtomicU32::new(0));
        let counter = fetches.clone();
        let options = crate::query::QueryOptions::new(QueryKey::new(["patients", "list"]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec![1, 2]) }
        });
        client.fetch_query(&options).await.expect("first fetch");

        let mutation = Mutation::new(|n: u32| async move { Ok(n + 1) })
            .invalidates(QueryKey::new(["patients"]));
        let result = mutation.mutate(&client, 1).await;
        assert_eq!(result.data(), Some(&2));

        // The entry has no subscriber, so it was only marked stale.
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        client.fetch_query(&options).await.expect("refetch");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_invalidate() {
        let client = QueryClient::new();
        let fetches = Arc::new(AtomicU32::new(0));
        let counter = fetches.clone();
        let options = crate::query::QueryOptions::new(QueryKey::new(["patients"]), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        });
        client.fetch_query(&options).await.expect("first fetch");

        let mutation = Mutation::new(|_: ()| async { Err::<(), _>(QueryError::Network("down".into())) })
            .retry(RetryPolicy::none())
            .invalidates(QueryKey::new(["patients"]));
        assert!(mutation.mutate(&client, ()).await.is_error());

        client.fetch_query(&options).await.expect("cached");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
