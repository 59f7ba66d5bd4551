//! Engine state and operation outcomes.

use crate::config::Settings;
use crate::error::{ChannelError, Error};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Where the engine is in its lifecycle.
///
/// A non-empty outbox is a property ([`super::SyncEngine::outbox_pending`]),
/// not a separate mode. `Error` is never terminal: the next connectivity edge
/// or user action moves the engine on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineState {
    /// Local store not opened yet.
    Cold,
    Offline,
    /// Online without a live subscription (none configured or not yet made).
    Online,
    OnlineSubscribed,
    /// Transient while the outbox drains.
    OnlineFlushing,
    Error,
}

/// Result of a flush attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Nothing queued; no writes issued.
    Empty,
    /// Every queued entry was written and the batch acknowledged.
    Flushed { sent: usize },
    /// A write (or the acknowledgement) failed; every entry stays queued.
    Failed {
        sent: usize,
        pending: usize,
        failure: FlushFailure,
    },
    /// No remote channel configured.
    Unavailable,
}

/// Which side of a flush gave out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum FlushFailure {
    /// The outbox could not be read or acknowledged.
    Store(String),
    /// The remote did not accept a write.
    Write(ChannelError),
}

impl fmt::Display for FlushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(message) => write!(f, "local store: {message}"),
            Self::Write(err) => write!(f, "remote write: {err}"),
        }
    }
}

impl From<FlushFailure> for Error {
    fn from(failure: FlushFailure) -> Self {
        match failure {
            FlushFailure::Store(message) => Self::StoreUnavailable(message),
            FlushFailure::Write(err) => Self::Channel(err),
        }
    }
}

/// Why a submitted record went to the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    Offline,
    ChannelUnavailable,
    WriteFailed,
}

impl QueueReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::ChannelUnavailable => "no remote configured",
            Self::WriteFailed => "remote write failed",
        }
    }
}

/// Result of a user submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Written to the remote; confirmation arrives with the next snapshot.
    Sent { remote_id: String },
    Queued { seq: i64, reason: QueueReason },
    /// Neither the remote nor the local store accepted the record.
    Failed { error: String },
}

/// What handling one subscription delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedEvent {
    /// Mirror replaced with this many records.
    Snapshot { records: usize },
    /// Subscription dropped; resubscribe after the delay.
    Failed { retry_in: Duration },
    /// Delivery from a subscription that has since been replaced.
    Stale,
}

/// Engine tuning taken from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub flush_on_start: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            flush_on_start: false,
        }
    }
}

impl From<&Settings> for EngineSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            backoff_initial: settings.backoff_initial(),
            backoff_max: settings.backoff_max(),
            flush_on_start: settings.flush_on_start,
        }
    }
}

/// Exponential resubscribe delay.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay to wait now; doubles the following one up to the cap.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_engine_settings_from_settings() {
        let settings = Settings {
            backoff_initial_ms: 250,
            backoff_max_ms: 4_000,
            flush_on_start: true,
            ..Settings::default()
        };
        let engine = EngineSettings::from(&settings);
        assert_eq!(engine.backoff_initial, Duration::from_millis(250));
        assert_eq!(engine.backoff_max, Duration::from_secs(4));
        assert!(engine.flush_on_start);
    }

    #[test]
    fn test_outcomes_serialize_tagged() {
        let json = serde_json::to_value(FlushOutcome::Flushed { sent: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "flushed", "sent": 2}));

        let json = serde_json::to_value(SubmitOutcome::Queued {
            seq: 1,
            reason: QueueReason::WriteFailed,
        })
        .unwrap();
        assert_eq!(json["reason"], "write_failed");
    }

    #[test]
    fn test_flush_failure_keeps_its_category() {
        let write = FlushFailure::Write(ChannelError::Network("reset".into()));
        assert_eq!(Error::from(write.clone()).exit_code(), 3);
        assert_eq!(Error::from(FlushFailure::Store("disk full".into())).exit_code(), 2);

        let json = serde_json::to_value(FlushOutcome::Failed {
            sent: 1,
            pending: 3,
            failure: write,
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["failure"]["stage"], "write");
        assert_eq!(json["failure"]["error"]["kind"], "network");
    }
}
