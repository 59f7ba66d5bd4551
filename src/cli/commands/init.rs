//! Initialize the local store.
//!
//! Creates the database (schema is provisioned on open) and, if none
//! exists, a settings file with defaults at `~/.outbox/config.json`.

use crate::config::{Settings, resolve_db_path, save_settings, settings_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStore;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    settings: PathBuf,
    settings_created: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the files cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let database = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
    let settings = settings_path()?;

    let output = init_at(&database, &settings, force)?;

    if json {
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        println!("Initialized outbox store");
        println!("  Database: {}", output.database.display());
        if output.settings_created {
            println!("  Settings: {} (created)", output.settings.display());
        } else {
            println!("  Settings: {}", output.settings.display());
        }
        println!();
        println!("Next: set `remote_url` in the settings file, then `outbox submit <text>`.");
    }

    Ok(())
}

fn init_at(database: &Path, settings: &Path, force: bool) -> Result<InitOutput> {
    if database.exists() {
        if !force {
            return Err(Error::AlreadyInitialized {
                path: database.to_path_buf(),
            });
        }
        remove_database(database)?;
    }

    if let Some(parent) = database.parent() {
        fs::create_dir_all(parent)?;
    }
    SqliteStore::open(database)?;

    let settings_created = !settings.exists();
    if settings_created {
        save_settings(settings, &Settings::default())?;
    }

    Ok(InitOutput {
        database: database.to_path_buf(),
        settings: settings.to_path_buf(),
        settings_created,
    })
}

/// Remove the database and its WAL side files.
fn remove_database(database: &Path) -> Result<()> {
    fs::remove_file(database)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = database.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(side)?;
        }
    }
    Ok(())
}
