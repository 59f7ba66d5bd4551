//! HTTP document store channel.
//!
//! Talks to a REST collection store:
//! - `POST {base}/collections/{name}/documents` with `{text, createdAt}` and
//!   an `Idempotency-Key` header, answered by `{"id": "..."}`
//! - `GET {base}/collections/{name}/documents?orderBy=createdAt`, answered by
//!   a JSON array of records
//!
//! The store has no push transport, so subscriptions poll and deliver a
//! snapshot whenever the collection's fingerprint changes.

use crate::error::ChannelError;
use crate::model::{Draft, Record};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::hash::snapshot_hash;
use super::subscription::{SnapshotSink, SubscriptionHandle};
use super::RemoteChannel;

/// Header carrying the draft's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// REST document store channel.
#[derive(Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    poll_interval: Duration,
    request_timeout: Duration,
}

impl HttpChannel {
    /// Create a channel for `collection` on the store at `base_url`.
    pub fn new(base_url: &str, collection: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL of the collection's documents resource.
    #[must_use]
    pub fn documents_url(&self) -> String {
        format!("{}/collections/{}/documents", self.base_url, self.collection)
    }

    /// Fetch the whole collection once, ordered by `createdAt`.
    ///
    /// # Errors
    ///
    /// Returns a `ChannelError` on transport failure, non-success status, or
    /// an undecodable body.
    pub async fn fetch_snapshot(&self) -> Result<Vec<Record>, ChannelError> {
        fetch_snapshot(&self.client, &self.documents_url(), self.request_timeout).await
    }
}

/// Write request body.
#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    text: &'a str,
    #[serde(rename = "createdAt")]
    created_at: i64,
}

/// Write response body.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
}

async fn fetch_snapshot(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<Record>, ChannelError> {
    let response = client
        .get(url)
        .query(&[("orderBy", "createdAt")])
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ChannelError::Status {
            code: status.as_u16(),
            message,
        });
    }

    let mut records: Vec<Record> = response
        .json()
        .await
        .map_err(|e| ChannelError::Decode(e.to_string()))?;
    // Stable: the remote's own order breaks ties.
    records.sort_by_key(Record::sort_key);
    Ok(records)
}

impl RemoteChannel for HttpChannel {
    async fn write(&self, draft: &Draft) -> Result<String, ChannelError> {
        let body = WriteRequest {
            text: &draft.text,
            created_at: draft.created_at,
        };

        let response = self
            .client
            .post(self.documents_url())
            .header(IDEMPOTENCY_HEADER, &draft.idempotency_key)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChannelError::Status {
                code: status.as_u16(),
                message,
            });
        }

        let created: WriteResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Decode(e.to_string()))?;
        debug!(remote_id = %created.id, "Remote write accepted");
        Ok(created.id)
    }

    fn subscribe(&self, sink: SnapshotSink) -> SubscriptionHandle {
        let client = self.client.clone();
        let url = self.documents_url();
        let interval = self.poll_interval;
        let timeout = self.request_timeout;

        SubscriptionHandle::spawn(sink, move |sink| async move {
            let mut last_hash: Option<String> = None;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match fetch_snapshot(&client, &url, timeout).await {
                    Ok(records) => {
                        let hash = snapshot_hash(&records);
                        if last_hash.as_deref() == Some(hash.as_str()) {
                            continue;
                        }
                        last_hash = Some(hash);
                        if !sink.snapshot(records).await {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%url, error = %err, "Snapshot poll failed");
                        sink.error(err).await;
                        break;
                    }
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_url_trims_trailing_slash() {
        let channel = HttpChannel::new("http://localhost:8080/", "items");
        assert_eq!(
            channel.documents_url(),
            "http://localhost:8080/collections/items/documents"
        );
    }

    #[test]
    fn test_write_body_uses_camel_case_timestamp() {
        let body = WriteRequest {
            text: "buy cones",
            created_at: 42,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"text": "buy cones", "createdAt": 42}));
    }

    #[tokio::test]
    async fn test_write_to_unreachable_remote_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let channel = HttpChannel::new("http://127.0.0.1:9", "items")
            .with_request_timeout(Duration::from_millis(500));
        let err = channel
            .write(&Draft::with_timestamp("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Network(_)), "got {err:?}");
    }
}
