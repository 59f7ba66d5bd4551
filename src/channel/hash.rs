//! Snapshot fingerprints.
//!
//! Polling channels hash each fetched collection and deliver a snapshot only
//! when the fingerprint moves, so an unchanged collection produces no
//! deliveries.

use crate::model::Record;
use sha2::{Digest, Sha256};

/// SHA256 of the JSON serialization of a snapshot, as lowercase hex.
#[must_use]
pub fn snapshot_hash(records: &[Record]) -> String {
    let json = serde_json::to_vec(records).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}
