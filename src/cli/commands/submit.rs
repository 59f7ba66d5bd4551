//! Submit command implementation.

use crate::cli::RemoteOptions;
use crate::cli::commands::common::{build_engine, print_status, runtime};
use crate::engine::SubmitOutcome;
use crate::error::{Error, Result};
use crate::model::StatusReport;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct SubmitOutput<'a> {
    #[serde(flatten)]
    outcome: &'a SubmitOutcome,
    status: &'a StatusReport,
}

/// Execute the submit command.
///
/// # Errors
///
/// Returns an error if the text is blank, the store is not initialized, or
/// the record could be saved neither remotely nor locally.
pub fn execute(
    words: &[String],
    db_path: Option<&PathBuf>,
    options: &RemoteOptions,
    json: bool,
) -> Result<()> {
    let text = words.join(" ");

    runtime()?.block_on(async {
        let (engine, _) = build_engine(db_path, options).await?;
        engine.start().await;

        let outcome = engine.submit(&text).await?;
        let status = engine.status();

        if json {
            let output = SubmitOutput {
                outcome: &outcome,
                status: &status,
            };
            println!("{}", serde_json::to_string(&output)?);
        } else {
            match &outcome {
                SubmitOutcome::Sent { remote_id } => {
                    println!("{} Sent {}", "✓".green(), remote_id.dimmed());
                }
                SubmitOutcome::Queued { seq, reason } => {
                    println!("{} Queued #{seq} ({})", "•".yellow(), reason.as_str());
                }
                SubmitOutcome::Failed { .. } => {}
            }
            print_status(&status);
        }

        match outcome {
            SubmitOutcome::Failed { error } => Err(Error::Other(format!("Record not saved: {error}"))),
            SubmitOutcome::Sent { .. } | SubmitOutcome::Queued { .. } => Ok(()),
        }
    })
}
