//! Error types for the outbox engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=channel, 4=validation, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Inside the engine none of these escape: the submit, online-edge and
//! subscription boundaries log them and downgrade them to a status report.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for outbox operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    NotInitialized,
    AlreadyInitialized,
    StorageError,
    StoreUnavailable,

    // Channel (exit 3)
    ChannelError,
    ChannelUnavailable,

    // Validation (exit 4)
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::StorageError => "STORAGE_ERROR",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::ChannelError => "CHANNEL_ERROR",
            Self::ChannelUnavailable => "CHANNEL_UNAVAILABLE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::StorageError
            | Self::StoreUnavailable => 2,
            Self::ChannelError | Self::ChannelUnavailable => 3,
            Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the same call may succeed if simply retried later.
    ///
    /// Channel faults are transient; an unconfigured channel is static.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ChannelError | Self::StorageError)
    }
}

// ── Channel Error ─────────────────────────────────────────────

/// Failures reported by a remote channel (write or subscription).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ChannelError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote rejected request with status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("could not decode remote payload: {0}")]
    Decode(String),

    #[error("channel closed")]
    Closed,
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in outbox operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `outbox init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Local store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("No remote channel configured")]
    ChannelUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Storage(_) => ErrorCode::StorageError,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::Channel(_) => ErrorCode::ChannelError,
            Self::ChannelUnavailable => ErrorCode::ChannelUnavailable,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `outbox init` to create the local store".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Local store already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ChannelUnavailable => Some(
                "Set `remote_url` in ~/.outbox/config.json, pass --remote <url>, \
                 or use --memory-remote for a local demo channel"
                    .to_string(),
            ),

            Self::Channel(ChannelError::Network(_)) => Some(
                "The remote is unreachable. Records stay in the outbox until the next flush."
                    .to_string(),
            ),

            Self::StoreUnavailable(_) => Some(
                "Queued records are kept on disk. Check that no other process holds the \
                 database and retry."
                    .to_string(),
            ),

            Self::Storage(_)
            | Self::Channel(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::StoreUnavailable("locked".into()).exit_code(), 2);
        assert_eq!(Error::ChannelUnavailable.exit_code(), 3);
        assert_eq!(Error::Channel(ChannelError::Closed).exit_code(), 3);
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_channel_error_serializes_kind() {
        let json = serde_json::to_value(ChannelError::Network("reset".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "network", "detail": "reset"}));
        let json = serde_json::to_value(ChannelError::Closed).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "closed"}));
    }

    #[test]
    fn test_unavailable_is_not_retryable() {
        assert!(!ErrorCode::ChannelUnavailable.is_retryable());
        assert!(ErrorCode::ChannelError.is_retryable());
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let json = Error::ChannelUnavailable.to_structured_json();
        assert_eq!(json["error"]["code"], "CHANNEL_UNAVAILABLE");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("remote_url"));
    }

    #[test]
    fn test_structured_json_without_hint() {
        let json = Error::InvalidArgument("empty text".into()).to_structured_json();
        assert!(json["error"].get("hint").is_none());
        assert_eq!(json["error"]["message"], "Invalid argument: empty text");
    }
}
