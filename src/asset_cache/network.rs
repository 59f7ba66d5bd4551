//! Network side of the asset cache.

use crate::error::ChannelError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A response straight off the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where shell assets come from when the cache misses.
///
/// An HTTP error status is still a response; only a transport failure is
/// an `Err`.
pub trait Network: Send + Sync {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Fetched, ChannelError>> + Send;
}

/// reqwest-backed network rooted at an origin.
#[derive(Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: String,
    timeout: Duration,
}

impl HttpNetwork {
    pub fn new(origin: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for a same-origin path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.origin)
        } else {
            format!("{}/{path}", self.origin)
        }
    }
}

impl Network for HttpNetwork {
    async fn fetch(&self, path: &str) -> Result<Fetched, ChannelError> {
        let url = self.url_for(path);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(%url, status, bytes = body.len(), "Fetched asset");
        Ok(Fetched {
            status,
            content_type,
            body,
        })
    }
}

/// A network that is never reachable. Used when running offline or when
/// no asset origin is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unreachable;

impl Network for Unreachable {
    async fn fetch(&self, _path: &str) -> Result<Fetched, ChannelError> {
        Err(ChannelError::Network("offline".to_string()))
    }
}
