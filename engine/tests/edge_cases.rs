//! Edge case tests for sweep-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use proptest::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use sweep_engine::{
    ActionKind, ActionQueue, ActionStatus, ActionStore, ConnectivityMonitor, DeliveryError,
    EventBus, FileStore, ManualClock, MemoryStore, PendingAction, QueueSnapshot, RemoteApi,
    SyncEvent, SyncOptions, SyncOrchestrator, Timestamp, Transition, SNAPSHOT_FORMAT_VERSION,
};

fn queue_with(store: Arc<dyn ActionStore>, clock: Arc<ManualClock>) -> ActionQueue {
    ActionQueue::new(store, clock, EventBus::new_shared())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[derive(Default)]
struct OrderRemote(Mutex<Vec<String>>);

#[async_trait::async_trait]
impl RemoteApi for OrderRemote {
    async fn deliver(&self, action: &PendingAction) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push(action.id.clone());
        Ok(())
    }
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[tokio::test]
async fn unicode_payloads_survive_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let clock = Arc::new(ManualClock::new(1000));

    let names = [
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    {
        let queue = queue_with(Arc::new(FileStore::open(&path).await.unwrap()), clock.clone());
        for (i, name) in names.iter().enumerate() {
            queue
                .enqueue(
                    "tasks",
                    ActionKind::Create,
                    json!({"title": name}),
                    Some(format!("a{}", i)),
                )
                .await
                .unwrap();
        }
    }

    let queue = queue_with(Arc::new(FileStore::open(&path).await.unwrap()), clock);
    for (i, name) in names.iter().enumerate() {
        let action = queue.get(&format!("a{}", i)).await.unwrap().unwrap();
        assert_eq!(action.payload["title"], *name, "payload mismatch for {:?}", name);
    }
}

#[tokio::test]
async fn large_signature_payload() {
    let clock = Arc::new(ManualClock::new(1000));
    let queue = queue_with(Arc::new(MemoryStore::new()), clock);

    // 1MB base64 image
    let signature = format!("data:image/png;base64,{}", "A".repeat(1024 * 1024));
    let id = queue
        .enqueue(
            "cleaning_logs",
            ActionKind::Sign,
            json!({"id": "log-1", "signature": signature}),
            None,
        )
        .await
        .unwrap();

    let action = queue.get(&id).await.unwrap().unwrap();
    assert_eq!(action.target_id(), "log-1");
    assert!(action.payload["signature"].as_str().unwrap().len() > 1024 * 1024);
}

#[test]
fn target_id_variants() {
    let with = |payload| PendingAction::new("act", "tasks", ActionKind::Update, payload, 0);

    assert_eq!(with(json!({"id": "row-9"})).target_id(), "row-9");
    assert_eq!(with(json!({"id": 42})).target_id(), "42");
    assert_eq!(with(json!({"id": null})).target_id(), "act");
    assert_eq!(with(json!({})).target_id(), "act");
    assert_eq!(with(json!([1, 2, 3])).target_id(), "act");
    assert_eq!(with(json!("scalar")).target_id(), "act");
}

// ============================================================================
// ID Edge Cases
// ============================================================================

#[tokio::test]
async fn ids_with_special_characters() {
    let clock = Arc::new(ManualClock::new(1000));
    let queue = queue_with(Arc::new(MemoryStore::new()), clock);

    let special_ids = [
        "simple",
        "with-dash",
        "with/slash",
        "with:colon",
        "tmp-550e8400-e29b-41d4-a716-446655440000",
        "emoji-🎉",
        "space test",
        "",
    ];

    for id in special_ids {
        queue
            .enqueue("tasks", ActionKind::Create, json!({}), Some(id.to_string()))
            .await
            .unwrap_or_else(|e| panic!("enqueue failed for {:?}: {}", id, e));
        assert!(queue.get(id).await.unwrap().is_some(), "missing {:?}", id);
    }
    assert_eq!(queue.counts().await.unwrap().pending, special_ids.len());
}

// ============================================================================
// Status Machine Edge Cases
// ============================================================================

#[test]
fn every_invalid_transition_is_rejected() {
    let mut rejected = Vec::new();
    for from in ActionStatus::ALL {
        for transition in [
            Transition::BeginSync,
            Transition::Synced,
            Transition::Failed("x".into()),
            Transition::Requeue,
        ] {
            let mut action = PendingAction::new("a", "tasks", ActionKind::Create, json!({}), 0);
            action.status = from;
            if action.apply(transition.clone(), 1).is_err() {
                assert_eq!(action.status, from, "rejected transition mutated status");
                rejected.push((from, transition.target()));
            }
        }
    }

    assert_eq!(
        rejected,
        vec![
            (ActionStatus::Pending, ActionStatus::Synced),
            (ActionStatus::Syncing, ActionStatus::Syncing),
            (ActionStatus::Synced, ActionStatus::Syncing),
            (ActionStatus::Synced, ActionStatus::Error),
            (ActionStatus::Synced, ActionStatus::Pending),
            (ActionStatus::Error, ActionStatus::Syncing),
            (ActionStatus::Error, ActionStatus::Synced),
            (ActionStatus::Error, ActionStatus::Error),
        ]
    );
}

#[test]
fn retry_count_saturates() {
    let mut action = PendingAction::new("a", "tasks", ActionKind::Create, json!({}), 0);
    action.retry_count = u32::MAX;
    action.apply(Transition::Failed("again".into()), 1).unwrap();
    assert_eq!(action.retry_count, u32::MAX);
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_empty_queue() {
    let json = QueueSnapshot::new().to_json().unwrap();
    let restored = QueueSnapshot::from_json(&json).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.format_version, SNAPSHOT_FORMAT_VERSION);
}

#[test]
fn snapshot_from_newer_version_is_rejected() {
    let json = json!({
        "formatVersion": SNAPSHOT_FORMAT_VERSION + 1,
        "nextSeq": 1,
        "actions": {}
    })
    .to_string();
    assert!(QueueSnapshot::from_json(&json).is_err());
}

#[tokio::test]
async fn memory_store_restored_from_snapshot_keeps_sequence() {
    let original = MemoryStore::new();
    for id in ["a", "b"] {
        original
            .insert(PendingAction::new(id, "tasks", ActionKind::Create, json!({}), 1000))
            .await
            .unwrap();
    }

    let json = original.snapshot().await.to_json().unwrap();
    let restored = MemoryStore::from_snapshot(QueueSnapshot::from_json(&json).unwrap());

    let c = restored
        .insert(PendingAction::new("c", "tasks", ActionKind::Create, json!({}), 1000))
        .await
        .unwrap();
    assert!(c.seq > 2);

    let ids: Vec<String> = restored
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

// ============================================================================
// Volume
// ============================================================================

#[tokio::test]
async fn many_pending_actions() {
    let clock = Arc::new(ManualClock::new(1000));
    let bus = EventBus::new_shared();
    let queued = Arc::new(Mutex::new(0usize));
    let sink = queued.clone();
    let _sub = bus.subscribe(move |e| {
        if matches!(e, SyncEvent::ActionQueued { .. }) {
            *sink.lock().unwrap() += 1;
        }
    });
    let queue = ActionQueue::new(Arc::new(MemoryStore::new()), clock.clone(), bus.clone());

    for i in 0..1000u64 {
        queue
            .enqueue("tasks", ActionKind::Create, json!({"n": i}), None)
            .await
            .unwrap();
        clock.advance(1);
    }
    assert_eq!(*queued.lock().unwrap(), 1000);

    let remote = Arc::new(OrderRemote::default());
    let connectivity = Arc::new(ConnectivityMonitor::new(true, bus.clone()));
    let sync = SyncOrchestrator::new(
        queue.clone(),
        remote.clone(),
        connectivity,
        bus,
        clock,
        SyncOptions::default(),
    );

    let report = sync.sync().await.unwrap().report().copied().unwrap();
    assert_eq!(report.success_count, 1000);
    assert_eq!(queue.counts().await.unwrap().synced, 1000);
}

// ============================================================================
// FIFO property
// ============================================================================

proptest! {
    #[test]
    fn prop_delivery_order_is_created_at_then_insertion(
        stamps in proptest::collection::vec(0u64..20, 1..40),
    ) {
        let delivered = runtime().block_on(async {
            let clock = Arc::new(ManualClock::new(0));
            let bus = EventBus::new_shared();
            let queue = ActionQueue::new(Arc::new(MemoryStore::new()), clock.clone(), bus.clone());

            for (i, stamp) in stamps.iter().enumerate() {
                clock.set(*stamp as Timestamp);
                queue
                    .enqueue("tasks", ActionKind::Create, json!({}), Some(format!("a{}", i)))
                    .await
                    .unwrap();
            }

            let remote = Arc::new(OrderRemote::default());
            let connectivity = Arc::new(ConnectivityMonitor::new(true, bus.clone()));
            let sync = SyncOrchestrator::new(
                queue,
                remote.clone(),
                connectivity,
                bus,
                clock,
                SyncOptions::default(),
            );
            sync.sync().await.unwrap();
            let delivered = remote.0.lock().unwrap().clone();
            delivered
        });

        let mut expected: Vec<(u64, usize)> =
            stamps.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        expected.sort();
        let expected: Vec<String> = expected.into_iter().map(|(_, i)| format!("a{}", i)).collect();

        prop_assert_eq!(delivered, expected);
    }
}
