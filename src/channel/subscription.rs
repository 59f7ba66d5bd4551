//! Subscription plumbing shared by channel implementations.

use crate::error::ChannelError;
use crate::model::Record;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One delivery from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// Full collection contents, ordered by `createdAt`.
    Snapshot(Vec<Record>),
    /// The subscription failed and will deliver nothing further.
    Error(ChannelError),
}

/// Where a subscription delivers its events.
///
/// Each sink is tagged with the subscriber's generation so a consumer can
/// discard late deliveries from a subscription it has already replaced.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    generation: u64,
    tx: mpsc::Sender<(u64, SnapshotEvent)>,
}

impl SnapshotSink {
    #[must_use]
    pub fn new(generation: u64, tx: mpsc::Sender<(u64, SnapshotEvent)>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver a snapshot. Returns `false` once the consumer is gone.
    pub async fn snapshot(&self, records: Vec<Record>) -> bool {
        self.deliver(SnapshotEvent::Snapshot(records)).await
    }

    /// Deliver a terminal error. Returns `false` once the consumer is gone.
    pub async fn error(&self, err: ChannelError) -> bool {
        self.deliver(SnapshotEvent::Error(err)).await
    }

    async fn deliver(&self, event: SnapshotEvent) -> bool {
        self.tx.send((self.generation, event)).await.is_ok()
    }
}

/// Owned handle to a live subscription.
///
/// Delivery stops when the handle is dropped.
#[derive(Debug)]
pub struct SubscriptionHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Spawn the delivery task for `sink`.
    pub fn spawn<F, Fut>(sink: SnapshotSink, f: F) -> Self
    where
        F: FnOnce(SnapshotSink) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let generation = sink.generation();
        let task = tokio::spawn(f(sink));
        Self { generation, task }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the delivery task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop delivery.
    pub fn unsubscribe(self) {
        debug!(generation = self.generation, "Unsubscribed");
        drop(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
