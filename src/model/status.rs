//! Status vocabulary produced by the engine for the view layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed set of states the status line can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Online,
    Offline,
    Syncing,
    Synced,
    SyncError,
    OfflineCached,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::SyncError => "sync-error",
            Self::OfflineCached => "offline-cached",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status state plus the free text shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub message: String,
}

impl StatusReport {
    pub fn new(status: SyncStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&SyncStatus::OfflineCached).unwrap();
        assert_eq!(json, "\"offline-cached\"");
        assert_eq!(SyncStatus::SyncError.to_string(), "sync-error");
    }
}
