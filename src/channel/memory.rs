//! In-process channel.
//!
//! Holds the collection in a `watch` channel so every subscriber sees the
//! latest state, dedupes writes by idempotency key, and can be told to fail
//! specific writes or break live subscriptions. Used by tests and by the
//! `--memory-remote` demo mode.

use crate::error::ChannelError;
use crate::model::{Draft, Record};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::subscription::{SnapshotSink, SubscriptionHandle};
use super::RemoteChannel;

#[derive(Debug)]
struct Inner {
    collection: watch::Sender<Vec<Record>>,
    faults: broadcast::Sender<ChannelError>,
    accepted_keys: Mutex<HashMap<String, String>>,
    failing_attempts: Mutex<HashSet<usize>>,
    reject_all: AtomicBool,
    write_delay_ms: AtomicU64,
    attempts: AtomicUsize,
    next_id: AtomicU64,
}

/// Shared in-memory collection. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start with an existing collection.
    #[must_use]
    pub fn with_records(mut records: Vec<Record>) -> Self {
        records.sort_by_key(Record::sort_key);
        let (collection, _) = watch::channel(records);
        let (faults, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                collection,
                faults,
                accepted_keys: Mutex::new(HashMap::new()),
                failing_attempts: Mutex::new(HashSet::new()),
                reject_all: AtomicBool::new(false),
                write_delay_ms: AtomicU64::new(0),
                attempts: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current collection contents.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.inner.collection.borrow().clone()
    }

    /// Number of write calls made so far, successful or not.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Make the `attempt`-th write call (1-based, counting all calls) fail.
    pub fn fail_attempt(&self, attempt: usize) {
        if let Ok(mut failing) = self.inner.failing_attempts.lock() {
            failing.insert(attempt);
        }
    }

    /// Reject every write until switched back.
    pub fn reject_writes(&self, reject: bool) {
        self.inner.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Make every write take `delay` before it is accepted or rejected.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Break every live subscription with `err`.
    pub fn break_subscriptions(&self, err: ChannelError) {
        let _ = self.inner.faults.send(err);
    }

    /// Insert a record as another writer would, bypassing dedup.
    pub fn insert(&self, record: Record) {
        self.inner.collection.send_modify(|records| {
            records.push(record);
            records.sort_by_key(Record::sort_key);
        });
    }

    fn should_fail(&self, attempt: usize) -> bool {
        if self.inner.reject_all.load(Ordering::SeqCst) {
            return true;
        }
        self.inner
            .failing_attempts
            .lock()
            .map(|failing| failing.contains(&attempt))
            .unwrap_or(false)
    }
}

impl RemoteChannel for MemoryChannel {
    async fn write(&self, draft: &Draft) -> Result<String, ChannelError> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.should_fail(attempt) {
            return Err(ChannelError::Network(format!("write {attempt} rejected")));
        }

        let mut accepted = self
            .inner
            .accepted_keys
            .lock()
            .map_err(|_| ChannelError::Closed)?;

        if let Some(existing) = accepted.get(&draft.idempotency_key) {
            debug!(remote_id = %existing, "Duplicate write dropped");
            return Ok(existing.clone());
        }

        let id = format!("doc-{}", self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        accepted.insert(draft.idempotency_key.clone(), id.clone());
        drop(accepted);

        self.insert(Record::new(id.clone(), draft.text.clone(), draft.created_at));
        Ok(id)
    }

    fn subscribe(&self, sink: SnapshotSink) -> SubscriptionHandle {
        let mut collection = self.inner.collection.subscribe();
        let mut faults = self.inner.faults.subscribe();

        SubscriptionHandle::spawn(sink, move |sink| async move {
            let initial = collection.borrow_and_update().clone();
            if !sink.snapshot(initial).await {
                return;
            }

            loop {
                tokio::select! {
                    changed = collection.changed() => {
                        if changed.is_err() {
                            sink.error(ChannelError::Closed).await;
                            break;
                        }
                        let records = collection.borrow_and_update().clone();
                        if !sink.snapshot(records).await {
                            break;
                        }
                    }
                    fault = faults.recv() => {
                        let err = fault.unwrap_or(ChannelError::Closed);
                        sink.error(err).await;
                        break;
                    }
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SnapshotEvent;
    use tokio::sync::mpsc;

    async fn next(rx: &mut mpsc::Receiver<(u64, SnapshotEvent)>) -> SnapshotEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("subscription closed")
            .1
    }

    #[tokio::test]
    async fn test_write_assigns_ids_and_orders_by_created_at() {
        let channel = MemoryChannel::new();
        channel.write(&Draft::with_timestamp("late", 20)).await.unwrap();
        channel.write(&Draft::with_timestamp("early", 10)).await.unwrap();

        let texts: Vec<_> = channel.records().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_duplicate_key_is_dropped() {
        let channel = MemoryChannel::new();
        let draft = Draft::with_timestamp("once", 1);

        let first = channel.write(&draft).await.unwrap();
        let second = channel.write(&draft).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(channel.records().len(), 1);
        assert_eq!(channel.write_attempts(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_hits_only_that_attempt() {
        let channel = MemoryChannel::new();
        channel.fail_attempt(2);

        assert!(channel.write(&Draft::with_timestamp("a", 1)).await.is_ok());
        assert!(channel.write(&Draft::with_timestamp("b", 2)).await.is_err());
        assert!(channel.write(&Draft::with_timestamp("c", 3)).await.is_ok());
        assert_eq!(channel.records().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_delay_is_applied() {
        let channel = MemoryChannel::new();
        channel.set_write_delay(Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        channel.write(&Draft::with_timestamp("slow", 1)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_state_then_changes() {
        let channel = MemoryChannel::with_records(vec![Record::new("a", "x", 1)]);
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = channel.subscribe(SnapshotSink::new(1, tx));

        assert_eq!(
            next(&mut rx).await,
            SnapshotEvent::Snapshot(vec![Record::new("a", "x", 1)])
        );

        channel.insert(Record::new("b", "y", 2));
        match next(&mut rx).await {
            SnapshotEvent::Snapshot(records) => assert_eq!(records.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_break_subscriptions_reports_error() {
        let channel = MemoryChannel::new();
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = channel.subscribe(SnapshotSink::new(1, tx));
        next(&mut rx).await;

        channel.break_subscriptions(ChannelError::Network("gone".into()));
        assert_eq!(
            next(&mut rx).await,
            SnapshotEvent::Error(ChannelError::Network("gone".into()))
        );
    }
}
