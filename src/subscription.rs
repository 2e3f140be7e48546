//! Subscriptions: long-lived event sources consumed as streams.
//!
//! A [`SubscriptionSource`] describes where events come from (a query entry,
//! focus and connectivity signals). A [`Subscription`] wraps a source together
//! with a mapping into the consumer's message type.

pub mod lifecycle;

use std::any::TypeId;
use std::hash::{DefaultHasher, Hash, Hasher};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity of a subscription: its source type plus a hash of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Builds the id of a source of type `T` with parameter hash `hash`.
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of events.
pub trait SubscriptionSource: Send {
    type Output;

    /// Starts the source and returns its event stream.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Two sources with the same id produce the same events.
    fn id(&self) -> SubscriptionId;
}

/// A subscription mapped into a message type.
pub struct Subscription<Msg> {
    pub id: SubscriptionId,
    pub(crate) spawn: Box<dyn Fn() -> BoxStream<'static, Msg> + Send>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg> + 'static,
    {
        let id = source.id();
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Maps every event into another message type.
    pub fn map<F, NewMsg>(self, f: F) -> Subscription<NewMsg>
    where
        F: Fn(Msg) -> NewMsg + Clone + Send + 'static,
        NewMsg: Send + 'static,
    {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        TypeId::of::<F>().hash(&mut hasher);
        let spawn = self.spawn;
        Subscription {
            id: SubscriptionId::of::<NewMsg>(hasher.finish()),
            spawn: Box::new(move || spawn().map(f.clone()).boxed()),
        }
    }

    /// Starts the subscription and returns its stream.
    pub fn stream(&self) -> BoxStream<'static, Msg> {
        (self.spawn)()
    }
}

/// Handle for a running background task.
#[derive(Debug)]
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    pub fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Cancel the task and wait for it to finish.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LifecycleEvent;
    use crate::subscription::lifecycle::LifecycleSource;

    #[tokio::test]
    async fn test_map_transforms_events() {
        let lifecycle = LifecycleSource::new();
        let sub = Subscription::new(lifecycle.clone())
            .map(|event| matches!(event, LifecycleEvent::Focus(true)));
        let mut stream = sub.stream();

        lifecycle.online(true);
        lifecycle.focus(true);
        assert_eq!(stream.next().await, Some(false));
        assert_eq!(stream.next().await, Some(true));
    }

    #[test]
    fn test_map_changes_id() {
        let lifecycle = LifecycleSource::new();
        let plain = Subscription::new(lifecycle.clone());
        let mapped = Subscription::new(lifecycle).map(|event| format!("{event:?}"));
        assert_ne!(plain.id, mapped.id);
    }

    #[tokio::test]
    async fn test_handle_cancel() {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let join = tokio::spawn(async move { cancelled.cancelled().await });
        let handle = Handle::new(token, join);
        assert!(!handle.is_finished());
        handle.cancel().await;
    }
}
