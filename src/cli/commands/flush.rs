//! Flush command implementation.

use crate::cli::RemoteOptions;
use crate::cli::commands::common::{build_engine, print_status, runtime};
use crate::engine::FlushOutcome;
use crate::error::{Error, Result};
use crate::storage::LocalStore;
use colored::Colorize;
use std::path::PathBuf;

/// Execute the flush command.
///
/// Offline is not an error: queued records simply stay queued.
///
/// # Errors
///
/// Returns an error if no remote is configured or a write fails.
pub fn execute(db_path: Option<&PathBuf>, options: &RemoteOptions, json: bool) -> Result<()> {
    runtime()?.block_on(async {
        let (engine, _) = build_engine(db_path, options).await?;
        engine.start().await;

        if !engine.connectivity().is_online() {
            let pending = engine.store().outbox_len()?;
            if json {
                let output = serde_json::json!({ "outcome": "offline", "pending": pending });
                println!("{output}");
            } else {
                println!("{} Offline, {pending} record(s) stay queued", "•".yellow());
            }
            return Ok(());
        }

        let outcome = engine.handle_online().await;
        if json {
            println!("{}", serde_json::to_string(&outcome)?);
        } else {
            match &outcome {
                FlushOutcome::Empty => println!("Outbox is empty"),
                FlushOutcome::Flushed { sent } => {
                    println!("{} Sent {sent} queued record(s)", "✓".green());
                }
                FlushOutcome::Failed {
                    sent,
                    pending,
                    failure,
                } => {
                    println!(
                        "{} Flush stopped after {sent} of {pending} ({failure}); all {pending} stay queued",
                        "✗".red()
                    );
                }
                FlushOutcome::Unavailable => {}
            }
            print_status(&engine.status());
        }

        outcome_result(outcome)
    })
}

/// Exit status for a flush: a failed write is a channel error, a failed
/// outbox read or acknowledgement a storage error.
fn outcome_result(outcome: FlushOutcome) -> Result<()> {
    match outcome {
        FlushOutcome::Empty | FlushOutcome::Flushed { .. } => Ok(()),
        FlushOutcome::Unavailable => Err(Error::ChannelUnavailable),
        FlushOutcome::Failed { failure, .. } => Err(failure.into()),
    }
}
