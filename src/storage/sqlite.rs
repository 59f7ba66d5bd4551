//! SQLite storage implementation.
//!
//! The connection sits behind a mutex so the store can be shared by
//! reference between the engine, its event loop and the asset cache. Each
//! operation runs in its own transaction; nothing holds the lock across an
//! await point.

use crate::error::{Error, Result};
use crate::model::{Draft, OutboxEntry, Record};
use crate::storage::LocalStore;
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// SQLite-based local store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database at the given path.
    ///
    /// Creates the database and provisions tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened local store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("connection lock poisoned".to_string()))
    }

    /// Run a read-only closure against the connection.
    ///
    /// # Errors
    ///
    /// Returns whatever the closure returns, or a lock error.
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a mutation inside an IMMEDIATE transaction.
    ///
    /// Commits when the closure succeeds and rolls back (on drop) otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let result = f(&tx)?;

        tx.commit()?;
        trace!(op, "Committed");
        Ok(result)
    }
}

impl LocalStore for SqliteStore {
    fn open(&self) -> Result<()> {
        let conn = self.lock()?;
        apply_schema(&conn)?;
        Ok(())
    }

    fn append_outbox(&self, draft: &Draft) -> Result<i64> {
        self.mutate("append_outbox", |tx| {
            tx.execute(
                "INSERT INTO outbox (text, created_at, idempotency_key) VALUES (?1, ?2, ?3)",
                rusqlite::params![draft.text, draft.created_at, draft.idempotency_key],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn read_outbox(&self) -> Result<Vec<OutboxEntry>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, text, created_at, idempotency_key FROM outbox ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(OutboxEntry {
                    seq: row.get(0)?,
                    text: row.get(1)?,
                    created_at: row.get(2)?,
                    idempotency_key: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }

    fn outbox_len(&self) -> Result<usize> {
        self.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    fn clear_outbox(&self) -> Result<()> {
        self.mutate("clear_outbox", |tx| {
            tx.execute("DELETE FROM outbox", [])?;
            Ok(())
        })
    }

    fn acknowledge_outbox(&self, up_to_seq: i64) -> Result<usize> {
        self.mutate("acknowledge_outbox", |tx| {
            Ok(tx.execute("DELETE FROM outbox WHERE id <= ?1", [up_to_seq])?)
        })
    }

    fn replace_mirror(&self, records: &[Record]) -> Result<()> {
        self.mutate("replace_mirror", |tx| {
            tx.execute("DELETE FROM items", [])?;
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO items (id, text, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![record.id, record.text, record.created_at])?;
            }
            Ok(())
        })?;
        debug!(records = records.len(), "Mirror replaced");
        Ok(())
    }

    fn read_mirror(&self) -> Result<Vec<Record>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, text, created_at FROM items ORDER BY COALESCE(created_at, 0) ASC, rowid ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
    }
}
