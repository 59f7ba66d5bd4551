//! Connectivity monitor.
//!
//! Keeps the binary online/offline state and fires an edge event on every
//! transition. There is no debouncing: a flapping link produces a matching
//! flap of events.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Edge-triggered connectivity notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

/// Shared connectivity state. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<bool>>,
    edges: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    /// Create a monitor with a known initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        let (edges, _) = broadcast::channel(64);
        Self {
            state: Arc::new(state),
            edges,
        }
    }

    /// Current state, read fresh on every call.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record the platform's view of connectivity.
    ///
    /// Fires an edge event only when the state actually changes. Returns
    /// whether an edge fired.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            let event = if online {
                info!("Network: online");
                ConnectivityEvent::BecameOnline
            } else {
                warn!("Network: offline");
                ConnectivityEvent::BecameOffline
            };
            // No receivers is fine.
            let _ = self.edges.send(event);
        }
        changed
    }

    /// Receive every subsequent edge.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.edges.subscribe()
    }

    /// Watch the level (not the edges).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Poll `url` every `interval` and feed reachability into the monitor.
    ///
    /// Any HTTP response counts as online; a transport failure or timeout
    /// counts as offline.
    pub fn spawn_probe(&self, url: String, interval: Duration, timeout: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe(&client, &url, timeout).await;
                debug!(%url, reachable, "Connectivity probe");
                monitor.set_online(reachable);
            }
        })
    }
}

/// One reachability check against `url`.
pub async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    client.head(url).timeout(timeout).send().await.is_ok()
}
