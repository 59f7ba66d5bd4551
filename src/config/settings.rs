//! User settings stored as JSON.
//!
//! Missing file or missing fields fall back to defaults. A few fields can
//! be overridden from the environment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shell assets cached on install.
#[must_use]
pub fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/web-app-manifest-192x192.png",
        "/web-app-manifest-512x512.png",
        "/main.js",
        "/remote-config.js",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the remote document store. `None` leaves the remote
    /// channel unavailable.
    pub remote_url: Option<String>,
    /// Watched collection.
    pub collection: String,
    pub poll_interval_ms: u64,
    pub probe_interval_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Flush the outbox at startup when online, not only on an online edge.
    pub flush_on_start: bool,

    /// Asset cache generation tag.
    pub cache_version: String,
    /// Origin the shell assets are fetched from (defaults to `remote_url`).
    pub asset_origin: Option<String>,
    pub shell_entry: String,
    pub placeholder_image: String,
    pub manifest: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: None,
            collection: "items".to_string(),
            poll_interval_ms: 2_000,
            probe_interval_ms: 5_000,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 60_000,
            flush_on_start: false,
            cache_version: "shell-v1".to_string(),
            asset_origin: None,
            shell_entry: "/index.html".to_string(),
            placeholder_image: "/web-app-manifest-192x192.png".to_string(),
            manifest: default_manifest(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    #[must_use]
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Origin for shell assets.
    #[must_use]
    pub fn asset_origin(&self) -> Option<&str> {
        self.asset_origin.as_deref().or(self.remote_url.as_deref())
    }

    /// Apply `OUTBOX_REMOTE_URL` and `OUTBOX_COLLECTION` overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("OUTBOX_REMOTE_URL").ok(),
            std::env::var("OUTBOX_COLLECTION").ok(),
        )
    }

    fn with_overrides(mut self, remote_url: Option<String>, collection: Option<String>) -> Self {
        if let Some(url) = remote_url.filter(|u| !u.trim().is_empty()) {
            self.remote_url = Some(url);
        }
        if let Some(name) = collection.filter(|c| !c.trim().is_empty()) {
            self.collection = name;
        }
        self
    }
}

/// Get the settings file path.
///
/// `OUTBOX_CONFIG` wins over `~/.outbox/config.json`.
///
/// # Errors
///
/// Returns a config error if no home directory can be determined.
pub fn settings_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("OUTBOX_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    super::global_outbox_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Load settings from `path`, defaulting when the file is absent.
///
/// # Errors
///
/// Returns a config error if the file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to `path`, creating parent directories.
///
/// # Errors
///
/// Returns a config error if the file cannot be written.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

/// Load settings from the default location and apply env overrides.
///
/// # Errors
///
/// Returns a config error if the settings file is unreadable.
pub fn resolve_settings() -> Result<Settings> {
    let path = settings_path()?;
    Ok(load_settings(&path)?.with_env_overrides())
}
