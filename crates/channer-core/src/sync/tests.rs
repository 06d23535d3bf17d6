//! End-to-end behaviour of the coordinator with two devices sharing a cloud

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::clock::manual::ManualClock;
use super::*;
use crate::config::SyncConfig;
use crate::error::Error;
use crate::models::{
    ConflictResolution, DeviceOrigin, DomainDocument, SettingsDocument, SyncConflict,
    SyncEnvelope, ThreadRecord,
};
use crate::store::{CloudAdapter, MemoryStore};

type Coordinator = SyncCoordinator<Arc<MemoryStore>, Arc<MemoryStore>>;

struct Device {
    coordinator: Coordinator,
    local: Arc<MemoryStore>,
}

async fn device(cloud: &Arc<MemoryStore>, clock: &ManualClock) -> Device {
    let local = Arc::new(MemoryStore::new());
    device_with_local(cloud, Arc::clone(&local), clock).await
}

async fn device_with_local(
    cloud: &Arc<MemoryStore>,
    local: Arc<MemoryStore>,
    clock: &ManualClock,
) -> Device {
    let adapter = CloudAdapter::new(Arc::clone(cloud), Arc::clone(&local));
    let coordinator = SyncCoordinator::initialize(adapter, &SyncConfig::default())
        .await
        .unwrap()
        .with_clock(clock.clone());
    Device { coordinator, local }
}

fn thread(number: u64, modified_at: i64) -> ThreadRecord {
    ThreadRecord::new("g", number, modified_at)
}

fn drain(receiver: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn raw_envelope<T: serde::Serialize>(payload: T, at: i64, origin: DeviceOrigin) -> Vec<u8> {
    SyncEnvelope::new(payload, at, origin).encode().unwrap()
}

struct Dismiss;

impl ConflictHandler for Dismiss {
    async fn choose(&self, _conflict: &SyncConflict) -> Option<ConflictResolution> {
        None
    }
}

/// Rewrites the cloud copy while the user is "deciding"
struct RewritesCloud {
    cloud: Arc<MemoryStore>,
    bytes: Vec<u8>,
}

impl ConflictHandler for RewritesCloud {
    async fn choose(&self, conflict: &SyncConflict) -> Option<ConflictResolution> {
        self.cloud.insert_raw(conflict.key.clone(), self.bytes.clone());
        Some(ConflictResolution::Merge)
    }
}

/// Blocks until released, to hold a pass open
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ConflictHandler for Gate {
    async fn choose(&self, _conflict: &SyncConflict) -> Option<ConflictResolution> {
        self.entered.notify_one();
        self.release.notified().await;
        Some(ConflictResolution::Merge)
    }
}

/// Device A writes `local` while offline, device B pushes `remote` to the cloud
async fn diverged<T: serde::Serialize + Sync>(key: &str, local: &T, remote: &T) -> (Device, Device, Arc<MemoryStore>) {
    let cloud = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(10_000);
    let a = device(&cloud, &clock).await;
    let b = device(&cloud, &clock).await;

    assert!(b.coordinator.save(key, remote).await);
    a.coordinator.set_sync_enabled(false).await.unwrap();
    assert!(a.coordinator.save(key, local).await);
    a.coordinator.set_sync_enabled(true).await.unwrap();

    (a, b, cloud)
}

#[tokio::test]
async fn save_then_load_returns_value_and_notifies() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;
    let mut events = a.coordinator.subscribe();

    let favorites = vec![thread(1, 1), thread(2, 2)];
    assert!(a.coordinator.save(keys::FAVORITES, &favorites).await);

    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(favorites)
    );
    assert!(cloud.contains_key(keys::FAVORITES));
    assert!(a.local.contains_key(keys::FAVORITES));
    assert_eq!(
        drain(&mut events),
        vec![SyncEvent::DataChanged {
            key: keys::FAVORITES.to_string()
        }]
    );
}

#[tokio::test]
async fn load_returns_none_for_missing_or_mismatched_values() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;

    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        None
    );

    assert!(a.coordinator.save(keys::FAVORITES, &"not a list").await);
    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        None
    );
}

#[tokio::test]
async fn load_reads_legacy_bare_payloads() {
    let cloud = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());
    local.insert_raw(keys::SEARCH_HISTORY, br#"["rust","sqlite"]"#.to_vec());
    let a = device_with_local(&cloud, local, &ManualClock::at(1_000)).await;

    assert_eq!(
        a.coordinator.load::<Vec<String>>(keys::SEARCH_HISTORY).await,
        Some(vec!["rust".to_string(), "sqlite".to_string()])
    );
}

#[tokio::test]
async fn reserved_keys_cannot_be_saved() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;

    assert!(!a.coordinator.save("sync.device_id", &"spoofed").await);
}

#[tokio::test]
async fn stamps_never_go_backwards() {
    let cloud = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(5_000);
    let a = device(&cloud, &clock).await;

    assert!(a.coordinator.save(keys::CONTENT_FILTERS, &json!(["spoiler"])).await);
    clock.set(1_000);
    assert!(a.coordinator.save(keys::CONTENT_FILTERS, &json!(["spoiler", "nsfw"])).await);

    let stored = crate::models::decode_envelope(&cloud.raw(keys::CONTENT_FILTERS).unwrap()).unwrap();
    assert_eq!(stored.modified_at, 5_001);
    assert_eq!(stored.origin, a.coordinator.device_origin());
}

#[tokio::test]
async fn fallback_warning_fires_once_per_install() {
    let cloud = Arc::new(MemoryStore::new());
    cloud.set_available(false);
    let local = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(1_000);
    let a = device_with_local(&cloud, Arc::clone(&local), &clock).await;
    let mut events = a.coordinator.subscribe();

    assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);
    assert!(a.coordinator.save(keys::THREAD_HISTORY, &vec![thread(2, 1)]).await);
    assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(3, 1)]).await);

    let warnings = drain(&mut events)
        .into_iter()
        .filter(|event| *event == SyncEvent::CloudUnavailableWarning)
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(cloud.write_count(), 0);

    // A restarted app sharing the same local store stays quiet
    let restarted = device_with_local(&cloud, local, &clock).await;
    let mut events = restarted.coordinator.subscribe();
    assert!(restarted.coordinator.save(keys::FAVORITES, &vec![thread(4, 1)]).await);
    assert!(!drain(&mut events).contains(&SyncEvent::CloudUnavailableWarning));
}

#[tokio::test]
async fn oversized_save_fails_and_keeps_previous_value() {
    let cloud = Arc::new(MemoryStore::new().with_max_value_bytes(512));
    let a = device(&cloud, &ManualClock::at(1_000)).await;

    let small = vec![thread(1, 1)];
    assert!(a.coordinator.save(keys::FAVORITES, &small).await);

    let huge = (0..50)
        .map(|number| {
            let mut record = thread(number, 1);
            record.comment = "x".repeat(100);
            record
        })
        .collect::<Vec<_>>();
    assert!(!a.coordinator.save(keys::FAVORITES, &huge).await);

    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(small)
    );
}

#[tokio::test]
async fn migration_fills_only_missing_keys_and_is_idempotent() {
    let cloud = Arc::new(MemoryStore::new());
    let other = DeviceOrigin::new();
    let existing_history = raw_envelope(vec![thread(9, 9)], 9, other);
    cloud.insert_raw(keys::THREAD_HISTORY, existing_history.clone());

    let local = Arc::new(MemoryStore::new());
    local.insert_raw(
        keys::FAVORITES,
        serde_json::to_vec(&vec![thread(1, 1)]).unwrap(),
    );
    local.insert_raw(
        keys::THREAD_HISTORY,
        serde_json::to_vec(&vec![thread(2, 2)]).unwrap(),
    );
    let a = device_with_local(&cloud, local, &ManualClock::at(1_000)).await;
    let cancel = CancellationToken::new();

    let first = a.coordinator.migrate_local_data_to_cloud(&cancel).await.unwrap();
    assert_eq!(first.status, MigrationStatus::Completed);
    assert_eq!(first.migrated, vec![keys::FAVORITES.to_string()]);
    assert_eq!(first.existing, vec![keys::THREAD_HISTORY.to_string()]);
    assert_eq!(cloud.raw(keys::THREAD_HISTORY), Some(existing_history));

    let snapshot = cloud
        .keys()
        .into_iter()
        .map(|key| (cloud.raw(&key), key))
        .collect::<Vec<_>>();

    let second = a.coordinator.migrate_local_data_to_cloud(&cancel).await.unwrap();
    assert_eq!(second.status, MigrationStatus::AlreadyMigrated);
    let after = cloud
        .keys()
        .into_iter()
        .map(|key| (cloud.raw(&key), key))
        .collect::<Vec<_>>();
    assert_eq!(after, snapshot);

    let migrated =
        crate::models::decode_envelope(&cloud.raw(keys::FAVORITES).unwrap()).unwrap();
    assert_eq!(migrated.origin, a.coordinator.device_origin());
    assert!(migrated.modified_at >= 1_000);
}

#[tokio::test]
async fn migration_waits_for_cloud_and_honours_cancellation() {
    let cloud = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());
    local.insert_raw(keys::FAVORITES, b"[]".to_vec());
    let a = device_with_local(&cloud, local, &ManualClock::at(1_000)).await;

    cloud.set_available(false);
    let offline = a
        .coordinator
        .migrate_local_data_to_cloud(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(offline.status, MigrationStatus::RemoteUnavailable);

    cloud.set_available(true);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let cancelled = a.coordinator.migrate_local_data_to_cloud(&cancel).await.unwrap();
    assert_eq!(cancelled.status, MigrationStatus::Cancelled);
    assert!(!cloud.contains_key(keys::FAVORITES));

    let resumed = a
        .coordinator
        .migrate_local_data_to_cloud(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resumed.migrated, vec![keys::FAVORITES.to_string()]);
}

#[tokio::test]
async fn equal_payloads_are_in_sync_despite_skew() {
    let cloud = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(50_000);
    let b = device(&cloud, &clock).await;
    assert!(b.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);

    let local = Arc::new(MemoryStore::new());
    local.insert_raw(
        keys::FAVORITES,
        raw_envelope(vec![thread(1, 1)], 1, DeviceOrigin::new()),
    );
    let a = device_with_local(&cloud, local, &clock).await;

    assert!(a
        .coordinator
        .detect_conflict(keys::FAVORITES)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        a.coordinator
            .sync_key(keys::FAVORITES, &AutoMerge)
            .await
            .unwrap(),
        KeySyncOutcome::InSync
    );
}

#[tokio::test]
async fn own_write_echoed_back_is_not_a_conflict() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;
    assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);

    assert!(a
        .coordinator
        .detect_conflict(keys::FAVORITES)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        a.coordinator
            .sync_key(keys::FAVORITES, &Dismiss)
            .await
            .unwrap(),
        KeySyncOutcome::InSync
    );
}

#[tokio::test]
async fn merge_converges_both_devices() {
    let local = vec![thread(1, 1), thread(2, 2)];
    let remote = vec![thread(1, 3), thread(3, 4)];
    let (a, b, _cloud) = diverged(keys::FAVORITES, &local, &remote).await;

    let conflict = a
        .coordinator
        .detect_conflict(keys::FAVORITES)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conflict.conflict_type(), crate::models::ConflictType::Favorites);

    let report = a
        .coordinator
        .sync_all(&AutoMerge, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report
        .outcomes
        .contains(&(keys::FAVORITES.to_string(), KeySyncOutcome::Resolved(ConflictResolution::Merge))));
    assert_eq!(report.changed_keys(), vec![keys::FAVORITES.to_string()]);

    let expected = vec![thread(1, 3), thread(2, 2), thread(3, 4)];
    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(expected.clone())
    );

    assert_eq!(
        b.coordinator
            .sync_key(keys::FAVORITES, &Dismiss)
            .await
            .unwrap(),
        KeySyncOutcome::PulledRemote
    );
    assert_eq!(
        b.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(expected)
    );

    for device in [&a, &b] {
        assert!(device
            .coordinator
            .detect_conflict(keys::FAVORITES)
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn settings_merge_per_key() {
    let mut local = SettingsDocument::new();
    local.set("theme", "dark", 5);
    local.set("notify", true, 5);
    let mut remote = SettingsDocument::new();
    remote.set("theme", "light", 3);
    remote.set("sound", false, 3);
    let (a, _b, _cloud) = diverged(keys::SETTINGS, &local, &remote).await;

    let conflict = a
        .coordinator
        .detect_conflict(keys::SETTINGS)
        .await
        .unwrap()
        .unwrap();
    let DomainDocument::Settings(merged) = a
        .coordinator
        .resolve(conflict, ConflictResolution::Merge)
        .await
        .unwrap()
    else {
        panic!("settings conflict produced a different domain");
    };

    assert_eq!(merged.get("theme"), Some(&json!("dark")));
    assert_eq!(merged.get("notify"), Some(&json!(true)));
    assert_eq!(merged.get("sound"), Some(&json!(false)));
    assert_eq!(
        a.coordinator.load::<SettingsDocument>(keys::SETTINGS).await,
        Some(merged)
    );
}

#[tokio::test]
async fn take_remote_overwrites_local() {
    let local = vec![thread(1, 1)];
    let remote = vec![thread(2, 2)];
    let (a, _b, _cloud) = diverged(keys::THREAD_HISTORY, &local, &remote).await;

    let outcome = a
        .coordinator
        .sync_key(
            keys::THREAD_HISTORY,
            &FixedChoice(Some(ConflictResolution::TakeRemote)),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        KeySyncOutcome::Resolved(ConflictResolution::TakeRemote)
    );
    assert_eq!(
        a.coordinator
            .load::<Vec<ThreadRecord>>(keys::THREAD_HISTORY)
            .await,
        Some(remote)
    );
}

#[tokio::test]
async fn dismissed_conflict_keeps_local_and_is_detected_again() {
    let local = vec![thread(1, 1)];
    let remote = vec![thread(2, 2)];
    let (a, _b, cloud) = diverged(keys::FAVORITES, &local, &remote).await;
    let cloud_before = cloud.raw(keys::FAVORITES);

    let outcome = a
        .coordinator
        .sync_key(keys::FAVORITES, &Dismiss)
        .await
        .unwrap();
    assert_eq!(outcome, KeySyncOutcome::Unresolved);
    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(local)
    );
    assert_eq!(cloud.raw(keys::FAVORITES), cloud_before);
    assert!(a
        .coordinator
        .detect_conflict(keys::FAVORITES)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn change_during_decision_supersedes_resolution() {
    let local = vec![thread(1, 1)];
    let remote = vec![thread(2, 2)];
    let (a, _b, cloud) = diverged(keys::FAVORITES, &local, &remote).await;

    let newer = raw_envelope(vec![thread(3, 3)], 20_000, DeviceOrigin::new());
    let handler = RewritesCloud {
        cloud: Arc::clone(&cloud),
        bytes: newer.clone(),
    };

    let outcome = a
        .coordinator
        .sync_key(keys::FAVORITES, &handler)
        .await
        .unwrap();
    assert_eq!(outcome, KeySyncOutcome::Superseded);
    assert_eq!(cloud.raw(keys::FAVORITES), Some(newer));
    assert_eq!(
        a.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(local)
    );
}

#[tokio::test]
async fn opaque_domains_use_last_writer_wins() {
    let cloud = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(10_000);
    let a = device(&cloud, &clock).await;
    let b = device(&cloud, &clock).await;

    a.coordinator.set_sync_enabled(false).await.unwrap();
    assert!(a.coordinator.save(keys::SAVED_SEARCHES, &json!(["old"])).await);
    clock.advance(5_000);
    assert!(b.coordinator.save(keys::SAVED_SEARCHES, &json!(["new"])).await);
    a.coordinator.set_sync_enabled(true).await.unwrap();

    assert!(a
        .coordinator
        .detect_conflict(keys::SAVED_SEARCHES)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        a.coordinator
            .sync_key(keys::SAVED_SEARCHES, &Dismiss)
            .await
            .unwrap(),
        KeySyncOutcome::PulledRemote
    );
    assert_eq!(
        a.coordinator
            .load::<Vec<String>>(keys::SAVED_SEARCHES)
            .await,
        Some(vec!["new".to_string()])
    );
}

#[tokio::test]
async fn sync_all_reports_and_broadcasts_completion() {
    let (a, _b, _cloud) = diverged(keys::FAVORITES, &vec![thread(1, 1)], &vec![thread(2, 2)]).await;
    let mut events = a.coordinator.subscribe();
    assert_eq!(a.coordinator.status().await, SyncStatus::NeverSynced);

    a.coordinator
        .sync_all(&AutoMerge, &CancellationToken::new())
        .await
        .unwrap();

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&SyncEvent::SyncStarted));
    assert!(events.contains(&SyncEvent::SyncCompleted {
        changed_keys: vec![keys::FAVORITES.to_string()]
    }));
    assert!(events.contains(&SyncEvent::ConflictDetected {
        key: keys::FAVORITES.to_string(),
        conflict_type: crate::models::ConflictType::Favorites,
    }));
    assert_eq!(
        a.coordinator.status().await,
        SyncStatus::Synced { at: 10_000 }
    );
    assert_eq!(a.coordinator.last_synced_at().await, Some(10_000));
}

#[tokio::test]
async fn cancelled_pass_stops_before_first_key() {
    let (a, _b, _cloud) = diverged(keys::FAVORITES, &vec![thread(1, 1)], &vec![thread(2, 2)]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = a.coordinator.sync_all(&AutoMerge, &cancel).await.unwrap();
    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert_eq!(a.coordinator.last_synced_at().await, None);
}

#[tokio::test]
async fn disabled_sync_skips_passes() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;
    a.coordinator.set_sync_enabled(false).await.unwrap();

    assert_eq!(a.coordinator.status().await, SyncStatus::Disabled);
    let report = a
        .coordinator
        .sync_all(&AutoMerge, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.remote_unavailable);

    assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);
    assert!(!cloud.contains_key(keys::FAVORITES));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_passes_are_refused() {
    let (a, _b, _cloud) = diverged(keys::FAVORITES, &vec![thread(1, 1)], &vec![thread(2, 2)]).await;
    let coordinator = Arc::new(a.coordinator);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let first = {
        let coordinator = Arc::clone(&coordinator);
        let gate = Gate {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };
        tokio::spawn(async move {
            coordinator
                .sync_all(&gate, &CancellationToken::new())
                .await
        })
    };

    entered.notified().await;
    assert_eq!(coordinator.status().await, SyncStatus::Syncing);
    assert!(matches!(
        coordinator
            .sync_all(&AutoMerge, &CancellationToken::new())
            .await,
        Err(Error::SyncInProgress)
    ));

    release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.changed_keys(), vec![keys::FAVORITES.to_string()]);
}

#[tokio::test]
async fn remote_change_reasons() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;
    let mut events = a.coordinator.subscribe();

    let changed = a.coordinator.handle_remote_change(&RemoteChange {
        reason: ChangeReason::ServerChange,
        keys: vec![keys::FAVORITES.to_string(), "sync.device_id".to_string()],
    });
    assert_eq!(changed, vec![keys::FAVORITES.to_string()]);

    let quota = a.coordinator.handle_remote_change(&RemoteChange {
        reason: ChangeReason::QuotaViolation,
        keys: vec![keys::FAVORITES.to_string()],
    });
    assert!(quota.is_empty());
    assert!(matches!(
        drain(&mut events).as_slice(),
        [SyncEvent::SyncFailed { .. }]
    ));

    cloud.set_fail_writes(true);
    for _ in 0..3 {
        assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);
    }
    assert!(!a.coordinator.adapter().is_remote_available());

    cloud.set_fail_writes(false);
    let all = a.coordinator.handle_remote_change(&RemoteChange {
        reason: ChangeReason::AccountChange,
        keys: Vec::new(),
    });
    assert_eq!(all.len(), keys::SYNCED_KEYS.len());
    assert!(a.coordinator.adapter().is_remote_available());
}

#[tokio::test]
async fn sync_pass_retries_a_parked_cloud() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;

    cloud.set_fail_writes(true);
    for _ in 0..3 {
        assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(1, 1)]).await);
    }
    cloud.set_fail_writes(false);
    assert!(a.coordinator.save(keys::FAVORITES, &vec![thread(2, 2)]).await);
    assert!(!a.coordinator.adapter().is_remote_available());
    assert!(!cloud.contains_key(keys::FAVORITES));

    let report = a
        .coordinator
        .sync_all(&AutoMerge, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.remote_unavailable);
    assert!(report.failures.is_empty());
    assert!(a.coordinator.adapter().is_remote_available());
    let stored = crate::models::decode_envelope(&cloud.raw(keys::FAVORITES).unwrap()).unwrap();
    assert_eq!(stored.payload, serde_json::to_value(vec![thread(2, 2)]).unwrap());
}

#[tokio::test]
async fn malformed_document_on_one_side_yields_to_the_other() {
    let cloud = Arc::new(MemoryStore::new());
    let a = device(&cloud, &ManualClock::at(1_000)).await;
    let favorites = vec![thread(1, 1)];
    assert!(a.coordinator.save(keys::FAVORITES, &favorites).await);

    cloud.insert_raw(
        keys::FAVORITES,
        raw_envelope(json!({"oops": 1}), 50_000, DeviceOrigin::new()),
    );
    assert!(a.coordinator.detect_conflict(keys::FAVORITES).await.unwrap().is_none());

    let outcome = a
        .coordinator
        .sync_key(keys::FAVORITES, &FixedChoice(Some(ConflictResolution::TakeLocal)))
        .await
        .unwrap();
    assert_eq!(outcome, KeySyncOutcome::PushedLocal);
    let stored = crate::models::decode_envelope(&cloud.raw(keys::FAVORITES).unwrap()).unwrap();
    assert_eq!(stored.payload, serde_json::to_value(&favorites).unwrap());

    let local = Arc::new(MemoryStore::new());
    local.insert_raw(
        keys::FAVORITES,
        raw_envelope(json!("not a list"), 60_000, DeviceOrigin::new()),
    );
    let b = device_with_local(&cloud, local, &ManualClock::at(2_000)).await;
    let outcome = b.coordinator.sync_key(keys::FAVORITES, &AutoMerge).await.unwrap();
    assert_eq!(outcome, KeySyncOutcome::PulledRemote);
    assert_eq!(
        b.coordinator.load::<Vec<ThreadRecord>>(keys::FAVORITES).await,
        Some(favorites)
    );
}

#[tokio::test]
async fn reserved_keys_are_never_synced() {
    let cloud = Arc::new(MemoryStore::new());
    let local = Arc::new(MemoryStore::new());
    let clock = ManualClock::at(1_000);
    let a = device_with_local(&cloud, Arc::clone(&local), &clock).await;
    let origin = a.coordinator.device_origin();

    assert!(matches!(
        a.coordinator.sync_key("sync.device_id", &AutoMerge).await,
        Err(Error::InvalidInput(_))
    ));
    let report = a
        .coordinator
        .sync_keys(&["sync.device_id"], &AutoMerge, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(!cloud.contains_key("sync.device_id"));

    drop(a);
    let reopened = device_with_local(&cloud, local, &clock).await;
    assert_eq!(reopened.coordinator.device_origin(), origin);
}
