//! Run command: drive the sync engine until interrupted.
//!
//! Each stdin line is submitted as a record, except:
//! - `/online`, `/offline`: override connectivity (useful with `--memory-remote`)
//! - `/quit`: stop
//!
//! Status and view changes are printed as they happen. Closing stdin does
//! not stop the engine; Ctrl-C does.

use crate::cli::RemoteOptions;
use crate::cli::commands::common::{CliEngine, build_engine, print_status, runtime};
use crate::engine::SubmitOutcome;
use crate::error::Result;
use crate::model::StatusReport;
use crate::view::ViewItem;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the store is not initialized or the runtime cannot
/// be created.
pub fn execute(db_path: Option<&PathBuf>, options: &RemoteOptions, json: bool) -> Result<()> {
    runtime()?.block_on(async {
        let (engine, settings) = build_engine(db_path, options).await?;
        engine.start().await;

        let probe = match settings.remote_url.as_deref() {
            Some(url) if !options.offline && !options.memory_remote => Some(
                engine
                    .connectivity()
                    .spawn_probe(url.to_string(), settings.probe_interval(), PROBE_TIMEOUT),
            ),
            _ => None,
        };

        let shutdown = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = engine.run(shutdown) => {}
            () = read_commands(&engine, json) => info!("Stopped by /quit"),
            () = print_updates(&engine, json) => {}
        }

        if let Some(probe) = probe {
            probe.abort();
        }
        Ok(())
    })
}

async fn read_commands(engine: &CliEngine, json: bool) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, waiting for Ctrl-C");
                std::future::pending::<()>().await;
                return;
            }
            Err(err) => {
                warn!(error = %err, "Failed to read stdin");
                std::future::pending::<()>().await;
                return;
            }
        };

        match line.trim() {
            "" => {}
            "/quit" => return,
            "/online" => {
                engine.connectivity().set_online(true);
            }
            "/offline" => {
                engine.connectivity().set_online(false);
            }
            text => match engine.submit(text).await {
                Ok(outcome) => print_submit(&outcome, json),
                Err(err) => eprintln!("Error: {err}"),
            },
        }
    }
}

async fn print_updates(engine: &CliEngine, json: bool) {
    let mut status = engine.watch_status();
    let mut view = engine.watch_view();

    print_report(&status.borrow_and_update().clone(), json);
    print_view(&view.borrow_and_update().clone(), json);

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    return;
                }
                let report = status.borrow_and_update().clone();
                print_report(&report, json);
            }
            changed = view.changed() => {
                if changed.is_err() {
                    return;
                }
                let items = view.borrow_and_update().clone();
                print_view(&items, json);
            }
        }
    }
}

fn print_submit(outcome: &SubmitOutcome, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "event": "submit", "result": outcome }));
        return;
    }
    match outcome {
        SubmitOutcome::Sent { remote_id } => println!("{} Sent {}", "✓".green(), remote_id.dimmed()),
        SubmitOutcome::Queued { seq, reason } => {
            println!("{} Queued #{seq} ({})", "•".yellow(), reason.as_str());
        }
        SubmitOutcome::Failed { error } => println!("{} Not saved: {error}", "✗".red()),
    }
}

fn print_report(report: &StatusReport, json: bool) {
    if json {
        println!("{}", serde_json::json!({ "event": "status", "status": report }));
    } else {
        print_status(report);
    }
}

fn print_view(items: &[ViewItem], json: bool) {
    if json {
        println!("{}", serde_json::json!({ "event": "view", "items": items }));
        return;
    }
    println!("{}", format!("── {} item(s) ──", items.len()).dimmed());
    for item in items {
        if item.is_local_only {
            println!("  {}", item.to_string().yellow());
        } else {
            println!("  {item}");
        }
    }
}
