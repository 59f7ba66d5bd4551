//! Remote channel: the boundary to the networked document store.
//!
//! A channel supports two things:
//! - `write`: add one record, returning the identity the remote assigned
//! - `subscribe`: stream full, `createdAt`-ordered snapshots of the watched
//!   collection, starting with the current state
//!
//! # Implementations
//!
//! - [`HttpChannel`] - REST document store over reqwest, polled for snapshots
//! - [`MemoryChannel`] - in-process collection with fault injection
//! - [`AnyChannel`] - runtime selection between the two
//!
//! Every write carries the draft's idempotency key. Remotes drop a write
//! whose key they have already accepted and return the original identity.

mod hash;
mod http;
mod memory;
mod subscription;

pub use hash::snapshot_hash;
pub use http::HttpChannel;
pub use memory::MemoryChannel;
pub use subscription::{SnapshotEvent, SnapshotSink, SubscriptionHandle};

use crate::error::ChannelError;
use crate::model::Draft;
use std::future::Future;

/// Networked collection store.
///
/// No batching and no retry: the caller owns retry policy.
pub trait RemoteChannel: Send + Sync {
    /// Add a single record.
    fn write(&self, draft: &Draft) -> impl Future<Output = Result<String, ChannelError>> + Send;

    /// Start delivering snapshots to `sink`.
    ///
    /// The returned handle owns the background delivery task; dropping it
    /// (or calling [`SubscriptionHandle::unsubscribe`]) stops delivery.
    /// After reporting an error the subscription ends.
    fn subscribe(&self, sink: SnapshotSink) -> SubscriptionHandle;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// A channel chosen at runtime.
#[derive(Clone)]
pub enum AnyChannel {
    Http(HttpChannel),
    Memory(MemoryChannel),
}

impl RemoteChannel for AnyChannel {
    async fn write(&self, draft: &Draft) -> Result<String, ChannelError> {
        match self {
            Self::Http(channel) => channel.write(draft).await,
            Self::Memory(channel) => channel.write(draft).await,
        }
    }

    fn subscribe(&self, sink: SnapshotSink) -> SubscriptionHandle {
        match self {
            Self::Http(channel) => channel.subscribe(sink),
            Self::Memory(channel) => channel.subscribe(sink),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Http(channel) => channel.name(),
            Self::Memory(channel) => channel.name(),
        }
    }
}
