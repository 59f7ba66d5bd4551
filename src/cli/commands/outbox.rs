//! Outbox command implementation.

use crate::cli::commands::common::{format_millis, open_store};
use crate::error::Result;
use crate::storage::LocalStore;
use std::path::PathBuf;

/// Execute the outbox command: list queued records, oldest first.
///
/// # Errors
///
/// Returns an error if the store is not initialized or cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (store, _) = open_store(db_path)?;
    let entries = store.read_outbox()?;

    if json {
        println!("{}", serde_json::to_string(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Outbox is empty.");
        return Ok(());
    }

    println!("{} queued record(s):", entries.len());
    for entry in &entries {
        println!(
            "  #{:<4} {}  {}",
            entry.seq,
            format_millis(entry.created_at),
            entry.text
        );
    }
    Ok(())
}
