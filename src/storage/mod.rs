//! Local store for the outbox engine.
//!
//! Two independent tables back the sync protocol:
//! - `outbox`: append-only queue of drafts, auto-keyed
//! - `items`: the Mirror, keyed by remote identity and replaced wholesale
//!
//! # Submodules
//!
//! - [`schema`] - Table definitions, provisioned on open
//! - [`sqlite`] - SQLite implementation of [`LocalStore`]

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::model::{Draft, OutboxEntry, Record};

/// Transactional local persistence used by the sync engine.
///
/// Every method is one transaction. Implementations must be shareable by
/// reference; the engine never holds a lock across an await point.
pub trait LocalStore: Send + Sync {
    /// Provision tables if absent. Cheap to repeat.
    fn open(&self) -> Result<()>;

    /// Queue a draft, returning its sequence id.
    fn append_outbox(&self, draft: &Draft) -> Result<i64>;

    /// All queued entries, ordered by sequence id.
    fn read_outbox(&self) -> Result<Vec<OutboxEntry>>;

    /// Number of queued entries.
    fn outbox_len(&self) -> Result<usize>;

    /// Empty the outbox.
    fn clear_outbox(&self) -> Result<()>;

    /// Delete every entry with `seq <= up_to_seq`, returning how many went.
    ///
    /// Entries queued after a flush read the outbox have larger sequence
    /// ids and survive.
    fn acknowledge_outbox(&self, up_to_seq: i64) -> Result<usize>;

    /// Clear the Mirror and insert `records` in one transaction.
    fn replace_mirror(&self, records: &[Record]) -> Result<()>;

    /// Current Mirror contents ordered by `created_at`.
    fn read_mirror(&self) -> Result<Vec<Record>>;
}
