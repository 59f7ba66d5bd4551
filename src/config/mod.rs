//! Configuration management.
//!
//! Resolves where the local store lives and loads user settings.
//!
//! # Layout
//!
//! - **Database**: `~/.outbox/data/outbox.db` (outbox, mirror, asset cache)
//! - **Settings**: `~/.outbox/config.json`

mod settings;

pub use settings::{
    default_manifest, load_settings, resolve_settings, save_settings, settings_path, Settings,
};

use std::path::{Path, PathBuf};

/// Get the global outbox directory location (`~/.outbox/`).
#[must_use]
pub fn global_outbox_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".outbox"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `OUTBOX_DB` environment variable
/// 3. Global location: `~/.outbox/data/outbox.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Explicit path from CLI flag
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: OUTBOX_DB environment variable
    if let Ok(db_path) = std::env::var("OUTBOX_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    // Priority 3: Global database location
    global_outbox_dir().map(|dir| dir.join("data").join("outbox.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_global_outbox_dir_returns_some() {
        let result = global_outbox_dir();
        assert!(result.is_some());
        assert!(result.unwrap().ends_with(".outbox"));
    }
}
