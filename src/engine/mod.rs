//! Sync engine: the outbox/reconciliation protocol.
//!
//! The engine owns three pieces of client state:
//! - the Outbox, records accepted locally but not yet confirmed remotely
//! - the Mirror, the last full snapshot delivered by the remote
//! - the rendered view and the user-facing status line
//!
//! # Protocol
//!
//! - **Submit**: online with a channel writes directly; a failed write, no
//!   connectivity or no channel appends to the Outbox instead.
//! - **Online edge**: flush the Outbox in sequence order, then make sure a
//!   subscription is live. A flush either acknowledges the whole batch it
//!   read or nothing, so a partial failure resends every entry next time.
//!   Writes carry the draft's idempotency key, which makes the resend safe.
//! - **Offline edge**: status only. A live subscription is left running.
//! - **Snapshot**: replace the Mirror wholesale and re-render.
//! - **Subscription error**: drop the subscription, keep the Mirror, and
//!   resubscribe after an exponential backoff.
//!
//! Every failure is caught here and turned into a [`StatusReport`]; none
//! escapes to the caller except an empty submit.

mod state;

pub use state::{
    EngineSettings, EngineState, FlushFailure, FlushOutcome, ProcessedEvent, QueueReason,
    SubmitOutcome,
};

use crate::channel::{RemoteChannel, SnapshotEvent, SnapshotSink, SubscriptionHandle};
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::error::{ChannelError, Error, Result};
use crate::model::{Draft, Record, StatusReport, SyncStatus};
use crate::storage::LocalStore;
use crate::view::{self, ViewItem};
use state::Backoff;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Buffered subscription deliveries before a channel task waits.
const EVENT_BUFFER: usize = 32;

type FlushFuture<'a> = Pin<Box<dyn Future<Output = FlushOutcome> + Send + 'a>>;

/// Offline-first sync engine over a local store and an optional remote.
pub struct SyncEngine<S, C> {
    store: S,
    channel: Option<C>,
    connectivity: ConnectivityMonitor,
    settings: EngineSettings,
    state: watch::Sender<EngineState>,
    status: watch::Sender<StatusReport>,
    view: watch::Sender<Vec<ViewItem>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
    generation: AtomicU64,
    events_tx: mpsc::Sender<(u64, SnapshotEvent)>,
    events_rx: tokio::sync::Mutex<mpsc::Receiver<(u64, SnapshotEvent)>>,
    backoff: Mutex<Backoff>,
}

impl<S: LocalStore, C: RemoteChannel> SyncEngine<S, C> {
    /// Build an engine. Nothing is opened or subscribed until [`Self::start`].
    ///
    /// `channel` is `None` when no remote is configured; the engine then
    /// queues every submit and reports the remote as unavailable.
    pub fn new(
        store: S,
        channel: Option<C>,
        connectivity: ConnectivityMonitor,
        settings: EngineSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let backoff = Backoff::new(settings.backoff_initial, settings.backoff_max);
        Self {
            store,
            channel,
            connectivity,
            settings,
            state: watch::channel(EngineState::Cold).0,
            status: watch::channel(StatusReport::new(SyncStatus::Offline, "starting")).0,
            view: watch::channel(Vec::new()).0,
            subscription: Mutex::new(None),
            generation: AtomicU64::new(0),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
            backoff: Mutex::new(backoff),
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Latest status report.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        self.status.borrow().clone()
    }

    /// Latest rendered list.
    #[must_use]
    pub fn rendered(&self) -> Vec<ViewItem> {
        self.view.borrow().clone()
    }

    /// Receiver that sees every status report from now on.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<StatusReport> {
        self.status.subscribe()
    }

    /// Receiver that sees every re-render from now on.
    #[must_use]
    pub fn watch_view(&self) -> watch::Receiver<Vec<ViewItem>> {
        self.view.subscribe()
    }

    /// Whether anything is waiting in the outbox.
    #[must_use]
    pub fn outbox_pending(&self) -> bool {
        self.store.outbox_len().is_ok_and(|len| len > 0)
    }

    /// Whether a subscription is currently delivering.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .is_ok_and(|slot| slot.as_ref().is_some_and(SubscriptionHandle::is_active))
    }

    /// The local store holding the outbox and mirror.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The remote channel, if one is configured.
    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    /// Connectivity monitor driving the online and offline edges.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the store and pick the starting mode.
    ///
    /// Online with a channel subscribes (and flushes first when
    /// `flush_on_start` is set). Otherwise the cached Mirror, plus anything
    /// queued, is rendered.
    pub async fn start(&self) {
        if let Err(err) = self.store.open() {
            error!(error = %err, "Failed to open local store");
            self.set_state(EngineState::Error);
            self.report(SyncStatus::SyncError, "local store unavailable");
            return;
        }

        if self.online_channel().is_some() {
            if self.settings.flush_on_start {
                self.handle_online().await;
            } else {
                self.ensure_subscribed();
                self.report(SyncStatus::Online, "online, waiting for remote");
            }
            return;
        }

        self.render_cached();
        self.settle_state();
        if self.channel.is_none() {
            self.report(
                SyncStatus::OfflineCached,
                "remote unavailable, showing cached items",
            );
        } else {
            self.report(SyncStatus::OfflineCached, "offline, showing cached items");
        }
    }

    /// Accept a record from the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `text` is blank after
    /// trimming. Every other failure is reported through the status and the
    /// returned outcome.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidArgument("text must not be empty".to_string()));
        }
        let draft = Draft::new(text);

        if let Some(channel) = self.online_channel() {
            return Ok(match channel.write(&draft).await {
                Ok(remote_id) => {
                    debug!(%remote_id, "Direct write accepted");
                    self.report(SyncStatus::Syncing, "sending to remote");
                    SubmitOutcome::Sent { remote_id }
                }
                Err(err) => {
                    warn!(error = %err, "Direct write failed, queueing locally");
                    self.enqueue(&draft, QueueReason::WriteFailed)
                }
            });
        }

        let reason = if self.connectivity.is_online() {
            QueueReason::ChannelUnavailable
        } else {
            QueueReason::Offline
        };
        Ok(self.enqueue(&draft, reason))
    }

    fn enqueue(&self, draft: &Draft, reason: QueueReason) -> SubmitOutcome {
        match self.store.append_outbox(draft) {
            Ok(seq) => {
                debug!(seq, ?reason, "Queued in outbox");
                self.render_cached();
                match reason {
                    QueueReason::WriteFailed => {
                        self.report(SyncStatus::SyncError, "failed, saved locally");
                    }
                    QueueReason::Offline => {
                        self.report(SyncStatus::Offline, "offline, saved to outbox");
                    }
                    QueueReason::ChannelUnavailable => {
                        self.report(SyncStatus::Offline, "remote unavailable, saved to outbox");
                    }
                }
                SubmitOutcome::Queued { seq, reason }
            }
            Err(err) => {
                error!(error = %err, "Failed to queue record");
                self.report(SyncStatus::SyncError, "could not save locally");
                SubmitOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Drain the outbox to the remote, oldest first.
    ///
    /// All-or-nothing: the batch read at the start is acknowledged only
    /// after every write in it succeeded. Entries queued while the flush is
    /// in flight are left for the next one.
    pub async fn flush(&self) -> FlushOutcome {
        let Some(channel) = self.channel.as_ref() else {
            debug!("Flush skipped, no remote channel");
            return FlushOutcome::Unavailable;
        };

        let entries = match self.store.read_outbox() {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "Failed to read outbox");
                self.set_state(EngineState::Error);
                self.report(SyncStatus::SyncError, "could not read outbox");
                return FlushOutcome::Failed {
                    sent: 0,
                    pending: 0,
                    failure: FlushFailure::Store(err.to_string()),
                };
            }
        };
        let Some(last_seq) = entries.last().map(|entry| entry.seq) else {
            return FlushOutcome::Empty;
        };

        self.set_state(EngineState::OnlineFlushing);
        self.report(
            SyncStatus::Syncing,
            format!("syncing {} queued record(s)", entries.len()),
        );

        let mut sent = 0;
        for entry in &entries {
            if let Err(err) = channel.write(&entry.draft()).await {
                warn!(seq = entry.seq, sent, error = %err, "Outbox flush aborted");
                return self.flush_failed(sent, entries.len(), FlushFailure::Write(err));
            }
            sent += 1;
        }

        match self.store.acknowledge_outbox(last_seq) {
            Ok(removed) => {
                info!(sent, removed, "Outbox flushed");
                self.settle_state();
                self.report(SyncStatus::Synced, "outbox synced");
                FlushOutcome::Flushed { sent }
            }
            Err(err) => {
                error!(error = %err, "Flushed but could not clear outbox");
                self.flush_failed(sent, entries.len(), FlushFailure::Store(err.to_string()))
            }
        }
    }

    fn flush_failed(&self, sent: usize, pending: usize, failure: FlushFailure) -> FlushOutcome {
        self.set_state(EngineState::Error);
        self.report(
            SyncStatus::SyncError,
            "outbox sync failed, will retry when back online",
        );
        FlushOutcome::Failed {
            sent,
            pending,
            failure,
        }
    }

    /// React to a false-to-true connectivity edge.
    pub async fn handle_online(&self) -> FlushOutcome {
        if self.channel.is_none() {
            self.set_state(EngineState::Online);
            self.report(SyncStatus::Online, "online, no remote configured");
            return FlushOutcome::Unavailable;
        }
        self.report(SyncStatus::Syncing, "online, syncing");
        let outcome = self.flush().await;
        self.finish_online(&outcome);
        outcome
    }

    /// Subscribe if needed and come to rest after an online-edge flush.
    ///
    /// A failed flush keeps `Error` and its sync-error status. An empty one
    /// touched nothing, so the "syncing" status is replaced here.
    fn finish_online(&self, outcome: &FlushOutcome) {
        self.ensure_subscribed();
        match outcome {
            FlushOutcome::Failed { .. } => {}
            FlushOutcome::Empty => {
                self.settle_state();
                self.report(SyncStatus::Online, "online, outbox empty");
            }
            FlushOutcome::Flushed { .. } | FlushOutcome::Unavailable => self.settle_state(),
        }
    }

    /// React to a true-to-false connectivity edge.
    ///
    /// Status only: the subscription is left as is and resumes delivering
    /// when the remote becomes reachable again.
    pub fn handle_offline(&self) {
        self.set_state(EngineState::Offline);
        self.report(SyncStatus::Offline, "offline");
    }

    /// Subscribe unless a live subscription already exists.
    ///
    /// Returns whether the engine is subscribed afterwards.
    pub fn ensure_subscribed(&self) -> bool {
        let Some(channel) = self.channel.as_ref() else {
            return false;
        };
        let Ok(mut slot) = self.subscription.lock() else {
            return false;
        };
        if slot.as_ref().is_some_and(SubscriptionHandle::is_active) {
            return true;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = SnapshotSink::new(generation, self.events_tx.clone());
        *slot = Some(channel.subscribe(sink));
        drop(slot);

        info!(channel = channel.name(), generation, "Subscribed to remote");
        if !matches!(self.state(), EngineState::OnlineFlushing | EngineState::Error) {
            self.settle_state();
        }
        true
    }

    /// Drop the current subscription, if any.
    pub fn unsubscribe(&self) {
        let handle = self.subscription.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.unsubscribe();
        }
    }

    /// Replace the Mirror with a delivered snapshot and re-render.
    ///
    /// Queued outbox entries stay in the view, marked local.
    pub fn apply_snapshot(&self, records: Vec<Record>) {
        if let Err(err) = self.store.replace_mirror(&records) {
            error!(error = %err, "Failed to cache snapshot");
            self.render(&records);
            self.report(SyncStatus::SyncError, "synced, but local cache failed");
            return;
        }

        let mirror = match self.store.read_mirror() {
            Ok(mirror) => mirror,
            Err(err) => {
                warn!(error = %err, "Failed to re-read mirror, rendering snapshot");
                records
            }
        };
        self.render(&mirror);
        if let Ok(mut backoff) = self.backoff.lock() {
            backoff.reset();
        }
        if self.state() == EngineState::Error {
            self.settle_state();
        }
        self.report(SyncStatus::Synced, "synced from remote");
    }

    /// Tear down a failed subscription. The Mirror is kept.
    ///
    /// Returns how long to wait before resubscribing.
    pub fn handle_channel_error(&self, err: &ChannelError) -> Duration {
        error!(error = %err, "Realtime subscription failed");
        self.unsubscribe();
        self.set_state(EngineState::Error);
        self.report(SyncStatus::SyncError, format!("realtime error: {err}"));
        self.backoff
            .lock()
            .map_or(self.settings.backoff_initial, |mut backoff| backoff.next_delay())
    }

    /// Wait for one subscription delivery and handle it.
    ///
    /// For callers driving the engine by hand. Must not be used while
    /// [`Self::run`] is active; both consume the same delivery queue.
    pub async fn process_next_event(&self) -> Option<ProcessedEvent> {
        let mut events = self.events_rx.lock().await;
        let (generation, event) = events.recv().await?;
        drop(events);
        Some(self.dispatch(generation, event))
    }

    fn dispatch(&self, generation: u64, event: SnapshotEvent) -> ProcessedEvent {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, "Dropped delivery from replaced subscription");
            return ProcessedEvent::Stale;
        }
        match event {
            SnapshotEvent::Snapshot(records) => {
                let count = records.len();
                self.apply_snapshot(records);
                ProcessedEvent::Snapshot { records: count }
            }
            SnapshotEvent::Error(err) => ProcessedEvent::Failed {
                retry_in: self.handle_channel_error(&err),
            },
        }
    }

    /// Drive the engine until `shutdown` resolves.
    ///
    /// Reacts to connectivity edges, subscription deliveries and resubscribe
    /// timers. An online edge that arrives during a flush supersedes it: the
    /// in-flight flush is dropped before acknowledging and a fresh one
    /// starts from the current outbox.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut edges = self.connectivity.subscribe();
        let mut events = self.events_rx.lock().await;
        tokio::pin!(shutdown);

        let mut flush: FlushFuture<'_> = Box::pin(std::future::pending());
        let mut flushing = false;

        let retry = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(retry);
        let mut retry_armed = false;

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Engine shutting down");
                    break;
                }
                edge = edges.recv() => match edge {
                    Ok(ConnectivityEvent::BecameOnline) => {
                        if flushing {
                            info!("Superseding in-flight flush");
                        }
                        flush = self.online_flush();
                        flushing = true;
                    }
                    Ok(ConnectivityEvent::BecameOffline) => self.handle_offline(),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Missed connectivity edges, resynchronising");
                        if self.connectivity.is_online() {
                            flush = self.online_flush();
                            flushing = true;
                        } else {
                            self.handle_offline();
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Connectivity monitor closed");
                        break;
                    }
                },
                outcome = &mut flush, if flushing => {
                    flushing = false;
                    debug!(?outcome, "Flush finished");
                    self.finish_online(&outcome);
                }
                Some((generation, event)) = events.recv() => {
                    if let ProcessedEvent::Failed { retry_in } = self.dispatch(generation, event) {
                        info!(retry_in_ms = retry_in.as_millis(), "Resubscribe scheduled");
                        retry.as_mut().reset(Instant::now() + retry_in);
                        retry_armed = true;
                    }
                }
                () = &mut retry, if retry_armed => {
                    retry_armed = false;
                    if self.connectivity.is_online() {
                        info!("Resubscribing after backoff");
                        if self.ensure_subscribed() {
                            self.settle_state();
                        }
                    } else {
                        debug!("Still offline, resubscribe waits for the next online edge");
                    }
                }
            }
        }

        self.unsubscribe();
    }

    fn online_flush(&self) -> FlushFuture<'_> {
        if self.channel.is_some() {
            self.report(SyncStatus::Syncing, "online, syncing");
        } else {
            self.set_state(EngineState::Online);
            self.report(SyncStatus::Online, "online, no remote configured");
        }
        Box::pin(self.flush())
    }

    // ── Internals ─────────────────────────────────────────────

    fn online_channel(&self) -> Option<&C> {
        if self.connectivity.is_online() {
            self.channel.as_ref()
        } else {
            None
        }
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "Engine state");
        }
    }

    /// Resting state for the current connectivity and subscription.
    fn settle_state(&self) {
        let state = if !self.connectivity.is_online() {
            EngineState::Offline
        } else if self.is_subscribed() {
            EngineState::OnlineSubscribed
        } else {
            EngineState::Online
        };
        self.set_state(state);
    }

    fn report(&self, status: SyncStatus, message: impl Into<String>) {
        let report = StatusReport::new(status, message);
        info!(status = %report.status, "{}", report.message);
        self.status.send_replace(report);
    }

    /// Render the stored Mirror plus the outbox.
    fn render_cached(&self) {
        let mirror = self.store.read_mirror().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read mirror");
            Vec::new()
        });
        self.render(&mirror);
    }

    fn render(&self, mirror: &[Record]) {
        let outbox = self.store.read_outbox().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read outbox for rendering");
            Vec::new()
        });
        self.view.send_replace(view::compose_offline(mirror, &outbox));
    }
}
