//! List command implementation.

use crate::cli::RemoteOptions;
use crate::cli::commands::common::{CliEngine, build_engine, print_status, runtime};
use crate::engine::ProcessedEvent;
use crate::error::Result;
use crate::model::StatusReport;
use crate::storage::LocalStore;
use crate::view::{self, ViewItem};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Serialize)]
struct ListOutput<'a> {
    items: &'a [ViewItem],
    status: &'a StatusReport,
}

/// Execute the list command.
///
/// Online with a remote, waits up to `wait_secs` for the first snapshot.
/// Otherwise (or on timeout) shows the cached Mirror plus queued records.
///
/// # Errors
///
/// Returns an error if the store is not initialized or cannot be read.
pub fn execute(
    db_path: Option<&PathBuf>,
    options: &RemoteOptions,
    wait_secs: u64,
    json: bool,
) -> Result<()> {
    runtime()?.block_on(async {
        let (engine, _) = build_engine(db_path, options).await?;
        engine.start().await;

        let mut items = engine.rendered();
        if engine.is_subscribed() {
            let received =
                tokio::time::timeout(Duration::from_secs(wait_secs), first_snapshot(&engine))
                    .await
                    .unwrap_or(false);
            if received {
                items = engine.rendered();
            } else {
                warn!(wait_secs, "No remote snapshot, showing cached items");
                let store = engine.store();
                items = view::compose_offline(&store.read_mirror()?, &store.read_outbox()?);
            }
        }
        let status = engine.status();

        if json {
            let output = ListOutput {
                items: &items,
                status: &status,
            };
            println!("{}", serde_json::to_string(&output)?);
            return Ok(());
        }

        if items.is_empty() {
            println!("No items.");
        }
        for item in &items {
            if item.is_local_only {
                println!("  {}", item.to_string().yellow());
            } else {
                println!("  {item}");
            }
        }
        println!();
        print_status(&status);
        Ok(())
    })
}

/// Pump subscription deliveries until a snapshot lands or the
/// subscription fails.
async fn first_snapshot(engine: &CliEngine) -> bool {
    loop {
        match engine.process_next_event().await {
            Some(ProcessedEvent::Snapshot { .. }) => return true,
            Some(ProcessedEvent::Stale) => {}
            Some(ProcessedEvent::Failed { .. }) | None => return false,
        }
    }
}
