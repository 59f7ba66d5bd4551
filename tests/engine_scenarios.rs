//! End-to-end engine behavior against the in-memory channel.

use outbox::channel::MemoryChannel;
use outbox::connectivity::ConnectivityMonitor;
use outbox::engine::{
    EngineSettings, EngineState, FlushFailure, FlushOutcome, ProcessedEvent, QueueReason,
    SubmitOutcome, SyncEngine,
};
use outbox::error::ChannelError;
use outbox::model::{Record, SyncStatus};
use outbox::storage::{LocalStore, SqliteStore};
use outbox::view::render_lines;
use std::time::Duration;
use tokio::sync::oneshot;

type Engine = SyncEngine<SqliteStore, MemoryChannel>;

fn settings() -> EngineSettings {
    EngineSettings {
        backoff_initial: Duration::from_secs(1),
        backoff_max: Duration::from_secs(8),
        flush_on_start: false,
    }
}

fn engine(online: bool, channel: Option<MemoryChannel>) -> Engine {
    SyncEngine::new(
        SqliteStore::open_memory().unwrap(),
        channel,
        ConnectivityMonitor::new(online),
        settings(),
    )
}

fn rendered(engine: &Engine) -> Vec<String> {
    render_lines(&engine.rendered())
}

async fn next_event(engine: &Engine) -> ProcessedEvent {
    tokio::time::timeout(Duration::from_secs(2), engine.process_next_event())
        .await
        .expect("no delivery")
        .expect("delivery queue closed")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Submit ────────────────────────────────────────────────────

#[tokio::test]
async fn offline_submit_is_queued_and_shown_local() {
    let engine = engine(false, Some(MemoryChannel::new()));
    engine.start().await;

    let outcome = engine.submit("buy cones").await.unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Queued {
            reason: QueueReason::Offline,
            ..
        }
    ));

    let outbox = engine.store().read_outbox().unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].text, "buy cones");
    assert_eq!(rendered(&engine), vec!["buy cones (local)"]);
    assert!(engine.rendered()[0].is_local_only);
    assert_eq!(engine.status().status, SyncStatus::Offline);
}

#[tokio::test]
async fn every_offline_submit_lands_in_outbox() {
    let engine = engine(false, Some(MemoryChannel::new()));
    engine.start().await;

    for text in ["one", "two", "three"] {
        engine.submit(text).await.unwrap();
    }

    assert_eq!(engine.store().outbox_len().unwrap(), 3);
    assert_eq!(
        rendered(&engine),
        vec!["one (local)", "two (local)", "three (local)"]
    );
}

#[tokio::test]
async fn failed_online_write_falls_back_to_outbox() {
    let channel = MemoryChannel::new();
    channel.reject_writes(true);
    let engine = engine(true, Some(channel));
    engine.start().await;

    let outcome = engine.submit("buy cones").await.unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Queued {
            reason: QueueReason::WriteFailed,
            ..
        }
    ));
    assert_eq!(engine.store().outbox_len().unwrap(), 1);

    let status = engine.status();
    assert_eq!(status.status, SyncStatus::SyncError);
    assert_eq!(status.message, "failed, saved locally");
}

#[tokio::test]
async fn online_submit_is_confirmed_by_snapshot() {
    let channel = MemoryChannel::new();
    let engine = engine(true, Some(channel.clone()));
    engine.start().await;
    assert_eq!(next_event(&engine).await, ProcessedEvent::Snapshot { records: 0 });

    let outcome = engine.submit("hello").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Sent { .. }));
    assert_eq!(engine.status().status, SyncStatus::Syncing);
    assert!(!engine.outbox_pending());

    assert_eq!(next_event(&engine).await, ProcessedEvent::Snapshot { records: 1 });
    assert_eq!(rendered(&engine), vec!["hello"]);
    assert_eq!(engine.status().status, SyncStatus::Synced);
}

// ── Flush ─────────────────────────────────────────────────────

#[tokio::test]
async fn reconnect_flushes_queued_records_in_order() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("first").await.unwrap();
    engine.submit("second").await.unwrap();
    let queued = engine.store().read_outbox().unwrap();

    engine.connectivity().set_online(true);
    assert_eq!(engine.handle_online().await, FlushOutcome::Flushed { sent: 2 });

    assert_eq!(engine.store().outbox_len().unwrap(), 0);
    let remote = channel.records();
    assert_eq!(remote.len(), 2);
    for (record, entry) in remote.iter().zip(&queued) {
        assert_eq!(record.text, entry.text);
        assert_eq!(record.created_at, Some(entry.created_at));
    }
    assert!(engine.is_subscribed());
    assert_eq!(engine.state(), EngineState::OnlineSubscribed);
}

#[tokio::test]
async fn failure_mid_flush_keeps_every_entry() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    for text in ["a", "b", "c", "d"] {
        engine.submit(text).await.unwrap();
    }

    channel.fail_attempt(2);
    engine.connectivity().set_online(true);
    let outcome = engine.flush().await;

    assert!(matches!(
        outcome,
        FlushOutcome::Failed {
            sent: 1,
            pending: 4,
            failure: FlushFailure::Write(ChannelError::Network(_)),
        }
    ));
    assert_eq!(engine.store().outbox_len().unwrap(), 4);
    assert_eq!(engine.status().status, SyncStatus::SyncError);
    assert_eq!(engine.state(), EngineState::Error);
}

#[tokio::test]
async fn retried_flush_does_not_duplicate_sent_entries() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    for text in ["a", "b", "c"] {
        engine.submit(text).await.unwrap();
    }

    channel.fail_attempt(3);
    engine.connectivity().set_online(true);
    assert!(matches!(engine.flush().await, FlushOutcome::Failed { sent: 2, .. }));

    assert_eq!(engine.flush().await, FlushOutcome::Flushed { sent: 3 });
    let texts: Vec<_> = channel.records().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn flush_of_empty_outbox_is_a_no_op() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("once").await.unwrap();

    engine.connectivity().set_online(true);
    assert_eq!(engine.flush().await, FlushOutcome::Flushed { sent: 1 });
    let attempts = channel.write_attempts();

    assert_eq!(engine.flush().await, FlushOutcome::Empty);
    assert_eq!(channel.write_attempts(), attempts);
}

#[tokio::test(start_paused = true)]
async fn entries_queued_during_flush_survive_it() {
    let channel = MemoryChannel::new();
    channel.set_write_delay(Duration::from_millis(100));
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("early").await.unwrap();
    engine.connectivity().set_online(true);

    let late_submit = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.connectivity().set_online(false);
        engine.submit("late").await.unwrap()
    };
    let (outcome, late) = tokio::join!(engine.flush(), late_submit);

    assert_eq!(outcome, FlushOutcome::Flushed { sent: 1 });
    assert!(matches!(late, SubmitOutcome::Queued { .. }));
    let left = engine.store().read_outbox().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].text, "late");
}

#[tokio::test]
async fn no_channel_keeps_everything_queued() {
    let engine = engine(true, None);
    engine.start().await;
    assert_eq!(engine.state(), EngineState::Online);
    assert_eq!(engine.status().status, SyncStatus::OfflineCached);

    engine.submit("stranded").await.unwrap();
    assert_eq!(engine.handle_online().await, FlushOutcome::Unavailable);
    assert_eq!(engine.store().outbox_len().unwrap(), 1);
    assert!(!engine.is_subscribed());
}

#[tokio::test]
async fn flush_on_start_drains_before_subscribing() {
    let channel = MemoryChannel::new();
    let store = SqliteStore::open_memory().unwrap();
    store
        .append_outbox(&outbox::model::Draft::with_timestamp("left over", 5))
        .unwrap();
    let engine = SyncEngine::new(
        store,
        Some(channel.clone()),
        ConnectivityMonitor::new(true),
        EngineSettings {
            flush_on_start: true,
            ..settings()
        },
    );

    engine.start().await;
    assert_eq!(engine.store().outbox_len().unwrap(), 0);
    assert_eq!(channel.records().len(), 1);
    assert!(engine.is_subscribed());
}

// ── Snapshots ─────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_replaces_mirror_and_renders_in_order() {
    let channel = MemoryChannel::with_records(vec![
        Record::new("b", "y", 2),
        Record::new("a", "x", 1),
    ]);
    let engine = engine(true, Some(channel));
    engine
        .store()
        .replace_mirror(&[Record::new("old", "stale", 9)])
        .unwrap();
    engine.start().await;

    assert_eq!(next_event(&engine).await, ProcessedEvent::Snapshot { records: 2 });

    let ids: Vec<_> = engine
        .store()
        .read_mirror()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(rendered(&engine), vec!["x", "y"]);
    assert_eq!(engine.status().message, "synced from remote");
}

#[tokio::test]
async fn queued_entries_stay_visible_after_snapshot() {
    let channel = MemoryChannel::with_records(vec![Record::new("a", "remote", 1)]);
    let engine = engine(true, Some(channel));
    engine
        .store()
        .append_outbox(&outbox::model::Draft::with_timestamp("pending", 5))
        .unwrap();
    engine.start().await;

    next_event(&engine).await;
    assert_eq!(rendered(&engine), vec!["remote", "pending (local)"]);
}

#[tokio::test]
async fn rendering_same_snapshot_twice_is_identical() {
    let channel = MemoryChannel::with_records(vec![
        Record::new("1", "same", 3),
        Record::new("2", "time", 3),
    ]);
    let engine = engine(true, Some(channel));
    engine.start().await;
    next_event(&engine).await;
    let first = engine.rendered();

    engine.apply_snapshot(engine.store().read_mirror().unwrap());
    assert_eq!(engine.rendered(), first);
}

// ── Connectivity and subscription lifecycle ───────────────────

#[tokio::test]
async fn offline_edge_leaves_subscription_running() {
    let engine = engine(true, Some(MemoryChannel::new()));
    engine.start().await;
    assert!(engine.is_subscribed());

    engine.connectivity().set_online(false);
    engine.handle_offline();

    assert!(engine.is_subscribed());
    assert_eq!(engine.state(), EngineState::Offline);
    assert_eq!(engine.status().status, SyncStatus::Offline);
}

#[tokio::test]
async fn reconnect_with_live_subscription_comes_to_rest() {
    let engine = engine(true, Some(MemoryChannel::new()));
    engine.start().await;
    assert_eq!(engine.state(), EngineState::OnlineSubscribed);

    engine.connectivity().set_online(false);
    engine.handle_offline();
    engine.connectivity().set_online(true);
    assert_eq!(engine.handle_online().await, FlushOutcome::Empty);

    assert!(engine.is_subscribed());
    assert_eq!(engine.state(), EngineState::OnlineSubscribed);
    assert_eq!(engine.status().status, SyncStatus::Online);
}

#[tokio::test]
async fn failed_reconnect_flush_stays_in_error() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("stuck").await.unwrap();

    channel.reject_writes(true);
    engine.connectivity().set_online(true);
    assert!(matches!(
        engine.handle_online().await,
        FlushOutcome::Failed { sent: 0, pending: 1, .. }
    ));

    assert!(engine.is_subscribed());
    assert_eq!(engine.state(), EngineState::Error);
    assert_eq!(engine.status().status, SyncStatus::SyncError);
}

#[tokio::test]
async fn subscription_error_keeps_last_mirror_visible() {
    let channel = MemoryChannel::with_records(vec![Record::new("a", "x", 1)]);
    let engine = engine(true, Some(channel.clone()));
    engine.start().await;
    next_event(&engine).await;

    channel.break_subscriptions(ChannelError::Network("socket reset".into()));
    assert_eq!(
        next_event(&engine).await,
        ProcessedEvent::Failed {
            retry_in: Duration::from_secs(1)
        }
    );

    assert!(!engine.is_subscribed());
    assert_eq!(rendered(&engine), vec!["x"]);
    assert_eq!(engine.status().status, SyncStatus::SyncError);
    assert!(engine.status().message.contains("socket reset"));

    assert!(engine.ensure_subscribed());
    assert_eq!(next_event(&engine).await, ProcessedEvent::Snapshot { records: 1 });
    assert_eq!(engine.status().status, SyncStatus::Synced);
}

#[tokio::test]
async fn repeated_subscription_errors_back_off_exponentially() {
    let engine = engine(true, Some(MemoryChannel::new()));
    engine.start().await;

    let delays: Vec<_> = (0..5)
        .map(|_| engine.handle_channel_error(&ChannelError::Closed).as_secs())
        .collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 8]);

    // A delivered snapshot resets the delay.
    engine.apply_snapshot(Vec::new());
    assert_eq!(
        engine.handle_channel_error(&ChannelError::Closed),
        Duration::from_secs(1)
    );
}

// ── Event loop ────────────────────────────────────────────────

#[tokio::test]
async fn run_loop_flushes_on_online_edge_then_subscribes() {
    let channel = MemoryChannel::new();
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("first").await.unwrap();
    engine.submit("second").await.unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let driver = async {
        tokio::task::yield_now().await;
        engine.connectivity().set_online(true);
        wait_until(|| channel.records().len() == 2 && !engine.outbox_pending()).await;
        wait_until(|| rendered(&engine) == vec!["first", "second"]).await;
        let _ = stop.send(());
    };
    let shutdown = async {
        let _ = stopped.await;
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(engine.run(shutdown), driver)
    })
    .await
    .expect("run loop stalled");

    assert_eq!(engine.status().status, SyncStatus::Synced);
    assert!(!engine.is_subscribed());
}

#[tokio::test(start_paused = true)]
async fn new_online_edge_supersedes_in_flight_flush() {
    let channel = MemoryChannel::new();
    channel.set_write_delay(Duration::from_millis(100));
    let engine = engine(false, Some(channel.clone()));
    engine.start().await;
    engine.submit("a").await.unwrap();
    engine.submit("b").await.unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let driver = async {
        tokio::task::yield_now().await;
        engine.connectivity().set_online(true);
        // First write of the first flush is still in flight.
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.connectivity().set_online(false);
        engine.connectivity().set_online(true);
        wait_until(|| !engine.outbox_pending()).await;
        let _ = stop.send(());
    };
    let shutdown = async {
        let _ = stopped.await;
    };

    tokio::join!(engine.run(shutdown), driver);

    let texts: Vec<_> = channel.records().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["a", "b"]);
    // One abandoned attempt, then a full pass.
    assert_eq!(channel.write_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_loop_resubscribes_after_backoff() {
    let channel = MemoryChannel::with_records(vec![Record::new("a", "x", 1)]);
    let engine = engine(true, Some(channel.clone()));
    engine.start().await;

    let (stop, stopped) = oneshot::channel::<()>();
    let driver = async {
        wait_until(|| rendered(&engine) == vec!["x"]).await;

        channel.break_subscriptions(ChannelError::Network("dropped".into()));
        wait_until(|| engine.status().status == SyncStatus::SyncError).await;
        let failed_at = tokio::time::Instant::now();
        assert!(!engine.is_subscribed());

        wait_until(|| engine.status().status == SyncStatus::Synced).await;
        assert!(failed_at.elapsed() >= Duration::from_millis(900));
        assert!(engine.is_subscribed());
        let _ = stop.send(());
    };
    let shutdown = async {
        let _ = stopped.await;
    };

    tokio::join!(engine.run(shutdown), driver);
    assert_eq!(rendered(&engine), vec!["x"]);
}
