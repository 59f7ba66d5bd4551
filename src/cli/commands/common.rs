//! Setup shared by commands that touch the store or the remote.

use crate::channel::{AnyChannel, HttpChannel, MemoryChannel};
use crate::cli::RemoteOptions;
use crate::config::{Settings, resolve_db_path, resolve_settings};
use crate::connectivity::{ConnectivityMonitor, probe};
use crate::engine::{EngineSettings, SyncEngine};
use crate::error::{Error, Result};
use crate::model::{StatusReport, SyncStatus};
use crate::storage::SqliteStore;
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Engine as wired up by the CLI.
pub type CliEngine = SyncEngine<SqliteStore, AnyChannel>;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Create a multi-threaded runtime for a command's async work.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// Open the initialized store.
///
/// # Errors
///
/// Returns `NotInitialized` if the database file does not exist yet.
pub fn open_store(db_path: Option<&PathBuf>) -> Result<(SqliteStore, PathBuf)> {
    let path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;
    if !path.exists() {
        return Err(Error::NotInitialized);
    }
    let store = SqliteStore::open(&path)?;
    Ok((store, path))
}

/// Settings file plus environment and command-line overrides.
///
/// # Errors
///
/// Returns a config error if the settings file is unreadable.
pub fn load_settings(options: &RemoteOptions) -> Result<Settings> {
    let mut settings = resolve_settings()?;
    if let Some(url) = &options.remote {
        settings.remote_url = Some(url.clone());
    }
    Ok(settings)
}

/// The channel to use, or `None` when no remote is configured.
#[must_use]
pub fn build_channel(options: &RemoteOptions, settings: &Settings) -> Option<AnyChannel> {
    if options.memory_remote {
        return Some(AnyChannel::Memory(MemoryChannel::new()));
    }
    settings.remote_url.as_deref().map(|url| {
        AnyChannel::Http(
            HttpChannel::new(url, &settings.collection).with_poll_interval(settings.poll_interval()),
        )
    })
}

/// Initial connectivity: forced offline, or one probe of the remote.
pub async fn detect_connectivity(options: &RemoteOptions, settings: &Settings) -> ConnectivityMonitor {
    let online = if options.offline {
        false
    } else if options.memory_remote {
        true
    } else if let Some(url) = settings.remote_url.as_deref() {
        probe(&reqwest::Client::new(), url, PROBE_TIMEOUT).await
    } else {
        true
    };
    debug!(online, "Initial connectivity");
    ConnectivityMonitor::new(online)
}

/// Open the store and wire an engine to it. The engine is not started.
///
/// # Errors
///
/// Returns an error if the store or settings cannot be loaded.
pub async fn build_engine(
    db_path: Option<&PathBuf>,
    options: &RemoteOptions,
) -> Result<(CliEngine, Settings)> {
    let (store, _) = open_store(db_path)?;
    let settings = load_settings(options)?;
    let channel = build_channel(options, &settings);
    let connectivity = detect_connectivity(options, &settings).await;
    let engine = SyncEngine::new(store, channel, connectivity, EngineSettings::from(&settings));
    Ok((engine, settings))
}

/// Status label colored by severity.
#[must_use]
pub fn status_label(status: SyncStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        SyncStatus::Online | SyncStatus::Synced => label.green(),
        SyncStatus::Syncing => label.cyan(),
        SyncStatus::Offline | SyncStatus::OfflineCached => label.yellow(),
        SyncStatus::SyncError => label.red(),
    }
}

/// Print a status report as `[status] message`.
pub fn print_status(report: &StatusReport) {
    println!("[{}] {}", status_label(report.status), report.message);
}

/// Format Unix milliseconds for display.
#[must_use]
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}
