//! Status command implementation.

use crate::asset_cache::{AssetCache, AssetCacheConfig, Unreachable};
use crate::channel::RemoteChannel;
use crate::cli::RemoteOptions;
use crate::cli::commands::common::{
    build_channel, detect_connectivity, load_settings, open_store, runtime,
};
use crate::error::Result;
use crate::storage::LocalStore;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    remote: Option<String>,
    channel: Option<&'static str>,
    online: bool,
    outbox: usize,
    mirror: usize,
    cache_version: String,
    cache_generations: Vec<String>,
    cached_assets: usize,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the store is not initialized or cannot be read.
pub fn execute(db_path: Option<&PathBuf>, options: &RemoteOptions, json: bool) -> Result<()> {
    let (store, database) = open_store(db_path)?;
    let settings = load_settings(options)?;
    let channel = build_channel(options, &settings);
    let online = runtime()?
        .block_on(detect_connectivity(options, &settings))
        .is_online();

    let cache = AssetCache::new(&store, Unreachable, AssetCacheConfig::from(&settings));

    let output = StatusOutput {
        database,
        remote: settings.remote_url.clone(),
        channel: channel.as_ref().map(RemoteChannel::name),
        online,
        outbox: store.outbox_len()?,
        mirror: store.read_mirror()?.len(),
        cache_version: settings.cache_version.clone(),
        cache_generations: cache.cache_names()?,
        cached_assets: cache.cached_paths()?.len(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Outbox Status");
    println!("=============");
    println!();
    println!("Database: {}", output.database.display());
    match (&output.remote, output.channel) {
        (_, Some("memory")) => println!("Remote:   in-process (demo)"),
        (Some(url), _) => println!("Remote:   {url}"),
        (None, _) => println!("Remote:   {}", "not configured".yellow()),
    }
    if output.online {
        println!("Network:  {}", "online".green());
    } else {
        println!("Network:  {}", "offline".yellow());
    }
    println!();
    if output.outbox > 0 {
        println!("Queued:   {}", output.outbox.to_string().yellow());
    } else {
        println!("Queued:   0");
    }
    println!("Mirrored: {}", output.mirror);
    println!();
    println!(
        "Asset cache: {} ({} assets)",
        output.cache_version, output.cached_assets
    );
    let stale: Vec<&String> = output
        .cache_generations
        .iter()
        .filter(|name| **name != output.cache_version)
        .collect();
    if !stale.is_empty() {
        println!(
            "  Old generations awaiting activate: {}",
            stale
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}
