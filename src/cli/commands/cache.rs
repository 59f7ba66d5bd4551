//! Asset cache commands.

use crate::asset_cache::{
    AssetCache, AssetCacheConfig, AssetRequest, HttpNetwork, Network, Unreachable,
};
use crate::cli::commands::common::{load_settings, open_store, runtime};
use crate::cli::{CacheCommands, RemoteOptions};
use crate::config::Settings;
use crate::error::{Error, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InstallOutput<'a> {
    version: &'a str,
    installed: usize,
}

#[derive(Serialize)]
struct ActivateOutput<'a> {
    version: &'a str,
    removed: Vec<String>,
}

#[derive(Serialize)]
struct ListOutput<'a> {
    version: &'a str,
    generations: Vec<String>,
    paths: Vec<String>,
}

/// Execute a cache subcommand.
///
/// # Errors
///
/// Returns an error if the store is not initialized, no asset origin is
/// configured for `install`, or the operation fails.
pub fn execute(
    command: &CacheCommands,
    db_path: Option<&PathBuf>,
    options: &RemoteOptions,
    json: bool,
) -> Result<()> {
    let (store, _) = open_store(db_path)?;
    let settings = load_settings(options)?;
    let config = AssetCacheConfig::from(&settings);

    let origin = settings.asset_origin().map(str::to_string);
    if matches!(command, CacheCommands::Install) && origin.is_none() {
        return Err(Error::Config(
            "No asset origin: set `asset_origin` or `remote_url` in settings".to_string(),
        ));
    }

    match origin {
        Some(origin) if !options.offline => {
            let cache = AssetCache::new(&store, HttpNetwork::new(&origin), config);
            run(command, &cache, &settings, json)
        }
        _ => run(command, &AssetCache::new(&store, Unreachable, config), &settings, json),
    }
}

fn run<N: Network>(
    command: &CacheCommands,
    cache: &AssetCache<'_, N>,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    match command {
        CacheCommands::Install => {
            let installed = runtime()?.block_on(cache.install(&settings.manifest))?;
            if json {
                let output = InstallOutput {
                    version: cache.version(),
                    installed,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!(
                    "{} Installed {installed} asset(s) into {}",
                    "✓".green(),
                    cache.version()
                );
            }
        }

        CacheCommands::Activate => {
            let removed = cache.activate()?;
            if json {
                let output = ActivateOutput {
                    version: cache.version(),
                    removed,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else if removed.is_empty() {
                println!("{} is the only cache generation", cache.version());
            } else {
                for name in &removed {
                    println!("Deleted old cache {}", name.dimmed());
                }
            }
        }

        CacheCommands::Fetch {
            path,
            navigate,
            image,
            output,
        } => {
            let request = if *navigate {
                AssetRequest::navigate(path.as_str())
            } else if *image {
                AssetRequest::image(path.as_str())
            } else {
                AssetRequest::new(path.as_str())
            };
            let response = runtime()?.block_on(cache.fetch(&request));

            if let Some(file) = output {
                fs::write(file, &response.body)?;
            }

            if json {
                let mut value = serde_json::to_value(&response)?;
                value["bytes"] = response.body.len().into();
                println!("{value}");
            } else {
                let status = if response.status < 400 {
                    response.status.to_string().green()
                } else {
                    response.status.to_string().red()
                };
                println!(
                    "{status} {} {} ({} bytes)",
                    response.source.as_str(),
                    response.content_type.as_deref().unwrap_or("-"),
                    response.body.len()
                );
            }
        }

        CacheCommands::List => {
            let output = ListOutput {
                version: cache.version(),
                generations: cache.cache_names()?,
                paths: cache.cached_paths()?,
            };
            if json {
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("Current generation: {}", output.version);
                for name in output.generations.iter().filter(|n| *n != output.version) {
                    println!("  stale: {}", name.yellow());
                }
                if output.paths.is_empty() {
                    println!("No assets cached. Run `outbox cache install`.");
                }
                for path in &output.paths {
                    println!("  {path}");
                }
            }
        }
    }
    Ok(())
}
