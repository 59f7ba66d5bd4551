//! App-shell asset cache.
//!
//! Named cache generations live in the `asset_cache` table. Exactly one
//! generation is live at a time; its name is the version tag and is the
//! only invalidation mechanism. There is no per-asset expiry.
//!
//! # Lifecycle
//!
//! - `install`: fetch the whole manifest, then store it in one transaction
//! - `activate`: delete every generation except the current one
//! - `fetch`: answer a request from cache or network, never failing

mod network;

pub use network::{Fetched, HttpNetwork, Network, Unreachable};

use crate::config::Settings;
use crate::error::{ChannelError, Error, Result};
use crate::model::now_millis;
use crate::storage::SqliteStore;
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::{debug, info, warn};

/// How the request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    Other,
}

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Image,
    Other,
}

/// An intercepted same-origin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub path: String,
    pub mode: RequestMode,
    pub destination: Destination,
}

impl AssetRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: RequestMode::Other,
            destination: Destination::Other,
        }
    }

    pub fn navigate(path: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::new(path)
        }
    }

    pub fn image(path: impl Into<String>) -> Self {
        Self {
            destination: Destination::Image,
            ..Self::new(path)
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The placeholder image stood in for an unreachable image.
    Placeholder,
    /// Synthesised 503.
    Offline,
}

impl ResponseSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
            Self::Placeholder => "placeholder",
            Self::Offline => "offline",
        }
    }
}

/// Answer to an [`AssetRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl AssetResponse {
    fn from_fetched(fetched: Fetched, source: ResponseSource) -> Self {
        Self {
            status: fetched.status,
            content_type: fetched.content_type,
            body: fetched.body,
            source,
        }
    }

    /// The 503 returned when neither cache nor network can answer.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            status: 503,
            content_type: Some("text/plain".to_string()),
            body: b"Offline".to_vec(),
            source: ResponseSource::Offline,
        }
    }
}

/// Names the cache needs from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCacheConfig {
    /// Current generation tag.
    pub version: String,
    /// Path served for every navigation request.
    pub shell_entry: String,
    /// Cached image served when an image request cannot be answered.
    pub placeholder_image: String,
}

impl From<&Settings> for AssetCacheConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            version: settings.cache_version.clone(),
            shell_entry: settings.shell_entry.clone(),
            placeholder_image: settings.placeholder_image.clone(),
        }
    }
}

/// Versioned cache of shell assets.
pub struct AssetCache<'a, N> {
    store: &'a SqliteStore,
    network: N,
    config: AssetCacheConfig,
}

impl<'a, N: Network> AssetCache<'a, N> {
    pub fn new(store: &'a SqliteStore, network: N, config: AssetCacheConfig) -> Self {
        Self {
            store,
            network,
            config,
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Populate the current generation with every manifest asset.
    ///
    /// All-or-nothing: nothing is written unless every asset fetched with a
    /// success status.
    ///
    /// # Errors
    ///
    /// Returns a channel error for the first asset that could not be fetched
    /// or came back with an error status, or a storage error.
    pub async fn install(&self, manifest: &[String]) -> Result<usize> {
        let mut fetched = Vec::with_capacity(manifest.len());
        for path in manifest {
            let response = self.network.fetch(path).await.map_err(|err| {
                warn!(%path, error = %err, "Install aborted");
                Error::Channel(err)
            })?;
            if !response.is_success() {
                warn!(%path, status = response.status, "Install aborted");
                return Err(Error::Channel(ChannelError::Status {
                    code: response.status,
                    message: format!("failed to fetch {path}"),
                }));
            }
            fetched.push((path.as_str(), response));
        }

        let version = &self.config.version;
        let cached_at = now_millis();
        self.store.mutate("install_assets", |tx| {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO asset_cache (cache_name, path, status, content_type, body, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (path, response) in &fetched {
                stmt.execute(rusqlite::params![
                    version,
                    path,
                    response.status,
                    response.content_type,
                    response.body,
                    cached_at
                ])?;
            }
            Ok(())
        })?;

        info!(version = %version, assets = fetched.len(), "Shell assets installed");
        Ok(fetched.len())
    }

    /// Delete every generation other than the current one.
    ///
    /// Returns the removed generation names.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn activate(&self) -> Result<Vec<String>> {
        let version = &self.config.version;
        let removed = self.store.mutate("activate_assets", |tx| {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT cache_name FROM asset_cache WHERE cache_name != ?1 ORDER BY cache_name",
            )?;
            let names = stmt
                .query_map([version], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            tx.execute("DELETE FROM asset_cache WHERE cache_name != ?1", [version])?;
            Ok(names)
        })?;

        for name in &removed {
            info!(cache = %name, "Deleted old cache");
        }
        Ok(removed)
    }

    /// Answer a request. Never fails.
    ///
    /// - navigation: cached shell entry, else network
    /// - anything else: cache, else network
    /// - when both miss: the cached placeholder for images, else a 503
    pub async fn fetch(&self, request: &AssetRequest) -> AssetResponse {
        let cache_key = match request.mode {
            RequestMode::Navigate => self.config.shell_entry.as_str(),
            RequestMode::Other => request.path.as_str(),
        };
        if let Some(hit) = self.cached(cache_key) {
            return hit;
        }

        match self.network.fetch(&request.path).await {
            Ok(fetched) => return AssetResponse::from_fetched(fetched, ResponseSource::Network),
            Err(err) => debug!(path = %request.path, error = %err, "Network fetch failed"),
        }

        if request.mode == RequestMode::Other && request.destination == Destination::Image {
            if let Some(mut placeholder) = self.cached(&self.config.placeholder_image) {
                placeholder.source = ResponseSource::Placeholder;
                return placeholder;
            }
        }
        AssetResponse::offline()
    }

    fn cached(&self, path: &str) -> Option<AssetResponse> {
        self.lookup(path).unwrap_or_else(|err| {
            warn!(%path, error = %err, "Cache lookup failed");
            None
        })
    }

    /// Look `path` up in the current generation.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn lookup(&self, path: &str) -> Result<Option<AssetResponse>> {
        self.store.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT status, content_type, body FROM asset_cache WHERE cache_name = ?1 AND path = ?2",
                    [self.config.version.as_str(), path],
                    |row| {
                        Ok(AssetResponse {
                            status: row.get(0)?,
                            content_type: row.get(1)?,
                            body: row.get(2)?,
                            source: ResponseSource::Cache,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Every generation present in the store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        self.store.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT cache_name FROM asset_cache ORDER BY cache_name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    /// Paths cached in the current generation.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub fn cached_paths(&self) -> Result<Vec<String>> {
        self.store.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT path FROM asset_cache WHERE cache_name = ?1 ORDER BY path")?;
            let paths = stmt
                .query_map([self.config.version.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(paths)
        })
    }
}
