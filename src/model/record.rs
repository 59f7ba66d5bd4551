//! Record, draft and outbox entry types.

use serde::{Deserialize, Serialize};

/// Current wall-clock time in Unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A record as delivered by the remote store.
///
/// `created_at` is client-supplied and never validated by the remote; a
/// record lacking it sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identity assigned by the remote on write.
    pub id: String,
    pub text: String,
    /// Unix milliseconds.
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Record {
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at: Some(created_at),
        }
    }

    /// Sort key: missing timestamps count as zero.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        self.created_at.unwrap_or(0)
    }
}

/// A record the client wants written to the remote.
///
/// The idempotency key is generated once, when the draft is created, and
/// travels with every resend so the remote can drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "idempotencyKey")]
    pub idempotency_key: String,
}

impl Draft {
    /// Create a draft stamped with the current time and a fresh key.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self::with_timestamp(text, now_millis())
    }

    #[must_use]
    pub fn with_timestamp(text: &str, created_at: i64) -> Self {
        Self {
            text: text.to_string(),
            created_at,
            idempotency_key: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A draft waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Auto-assigned local sequence id (monotonic, never reused).
    pub seq: i64,
    pub text: String,
    pub created_at: i64,
    pub idempotency_key: String,
}

impl OutboxEntry {
    /// The draft to resend for this entry.
    #[must_use]
    pub fn draft(&self) -> Draft {
        Draft {
            text: self.text.clone(),
            created_at: self.created_at,
            idempotency_key: self.idempotency_key.clone(),
        }
    }

    /// Synthetic identity used when showing the entry before confirmation.
    #[must_use]
    pub fn local_id(&self) -> String {
        format!("local-{}", self.created_at)
    }
}
