//! Local store schema.
//!
//! Every statement is `CREATE ... IF NOT EXISTS`: provisioning runs on each
//! open and is a no-op after the first run. There is no migration ladder.

use rusqlite::{Connection, Result};

/// Current schema version, recorded once in `schema_meta`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the local store.
///
/// Timestamps are INTEGER Unix milliseconds.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_meta (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Outbox: drafts not yet confirmed by the remote.
-- AUTOINCREMENT keeps sequence ids monotonic even after the table is emptied.
CREATE TABLE IF NOT EXISTS outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    idempotency_key TEXT NOT NULL
);

-- Mirror of the last remote snapshot, keyed by remote identity.
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    created_at INTEGER
);

-- App-shell asset cache generations.
CREATE TABLE IF NOT EXISTS asset_cache (
    cache_name TEXT NOT NULL,
    path TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    cached_at INTEGER NOT NULL,
    PRIMARY KEY (cache_name, path)
);
";

/// Apply pragmas and provision tables if absent.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![CURRENT_SCHEMA_VERSION, chrono::Utc::now().timestamp_millis()],
    )?;

    Ok(())
}

/// Check whether a table exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([table])
}
