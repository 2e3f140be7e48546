//! Focus and connectivity signals as a subscription source.
//!
//! Hosts (a terminal front end, a service wrapper, a test) report focus and
//! network changes through a [`LifecycleSource`]; the query client consumes
//! them via [`QueryClient::attach_lifecycle`](crate::query::QueryClient::attach_lifecycle).
//!
//! ```
//! use ward::query::QueryClient;
//! use ward::subscription::{SubscriptionSource, lifecycle::LifecycleSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = QueryClient::new();
//! let lifecycle = LifecycleSource::new();
//! let handle = client.attach_lifecycle(lifecycle.stream());
//!
//! lifecycle.focus(true);
//! handle.cancel().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::query::LifecycleEvent;
use crate::subscription::{SubscriptionId, SubscriptionSource};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(0);

/// Broadcasts [`LifecycleEvent`]s to every attached stream.
///
/// Clones share the channel, so one clone can stay with the host while
/// another is handed to the client.
#[derive(Debug, Clone)]
pub struct LifecycleSource {
    sender: broadcast::Sender<LifecycleEvent>,
    id: SubscriptionId,
}

impl LifecycleSource {
    /// Lifecycle changes are rare; a lagging stream only drops stale signals.
    const CAPACITY: usize = 16;

    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CAPACITY);
        Self {
            sender,
            id: SubscriptionId::of::<Self>(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Reports a focus change. Returns the number of streams that received it.
    pub fn focus(&self, focused: bool) -> usize {
        self.emit(LifecycleEvent::Focus(focused))
    }

    /// Reports a connectivity change. Returns the number of streams that received it.
    pub fn online(&self, online: bool) -> usize {
        self.emit(LifecycleEvent::Online(online))
    }

    /// Sends `event` to every attached stream. With none attached the event is dropped.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(?event, "no lifecycle listeners");
                0
            }
        }
    }

    /// Returns the number of attached streams.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionSource for LifecycleSource {
    type Output = LifecycleEvent;

    fn stream(&self) -> BoxStream<'static, LifecycleEvent> {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}
