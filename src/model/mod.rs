//! Data models for the outbox engine.
//!
//! - [`Record`]: a document as the remote store (and the Mirror) holds it
//! - [`Draft`]: a record the client wants written, not yet given an identity
//! - [`OutboxEntry`]: a queued draft with its local sequence id
//! - [`SyncStatus`] / [`StatusReport`]: the status vocabulary shown to the user

pub mod record;
pub mod status;

pub use record::{Draft, OutboxEntry, Record, now_millis};
pub use status::{StatusReport, SyncStatus};
