//! Sync coordinator: the save/load facade plus sync passes
//!
//! Domain managers only call [`SyncCoordinator::save`] and
//! [`SyncCoordinator::load`]. Everything else here runs from sync triggers:
//! app foreground, remote change notifications, or an explicit request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, SystemClock};
use super::detector::{ConflictDetector, Detection};
use super::events::{EventBus, SyncEvent};
use super::handler::ConflictHandler;
use super::keys::{self, conflict_type_for_key, is_reserved, SYNCED_KEYS};
use super::locks::KeyLocks;
use super::resolver::ConflictResolver;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{
    decode_envelope, next_stamp, ConflictData, ConflictOrdering, ConflictResolution, ConflictType,
    DeviceOrigin, DomainDocument, RawEnvelope, SyncConflict, SyncEnvelope, Timestamp,
};
use crate::state::SyncStatus;
use crate::store::{CloudAdapter, KeyValueStore, StoreError, WriteTarget};

/// Why the remote store reported changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Another device wrote
    ServerChange,
    /// First download after the account became available
    InitialSync,
    /// The account ran out of cloud storage
    QuotaViolation,
    /// The signed-in account changed
    AccountChange,
}

/// A remote change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    pub reason: ChangeReason,
    pub keys: Vec<String>,
}

/// What a sync pass did with one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySyncOutcome {
    /// Neither store has the key
    Absent,
    /// Both stores already agree
    InSync,
    /// The remote version replaced the local one
    PulledRemote,
    /// The local version was pushed to the remote
    PushedLocal,
    /// A conflict was settled with this choice
    Resolved(ConflictResolution),
    /// The handler dismissed the conflict; local state kept
    Unresolved,
    /// A side changed while the handler was deciding; retried next pass
    Superseded,
    /// The remote is not reachable
    Skipped,
}

impl KeySyncOutcome {
    /// Whether the local copy changed, so caches must re-load
    pub const fn changed_local(self) -> bool {
        matches!(self, Self::PulledRemote | Self::Resolved(_))
    }
}

/// Summary of a multi-key sync pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<(String, KeySyncOutcome)>,
    pub failures: Vec<(String, String)>,
    pub cancelled: bool,
    pub remote_unavailable: bool,
}

impl SyncReport {
    /// Keys whose local copy changed during the pass
    pub fn changed_keys(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.changed_local())
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// How a migration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationStatus {
    #[default]
    Completed,
    AlreadyMigrated,
    RemoteUnavailable,
    Cancelled,
}

/// Result of seeding the cloud from local-only data
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub status: MigrationStatus,
    /// Keys copied to the cloud
    pub migrated: Vec<String>,
    /// Keys left alone because the cloud already had them
    pub existing: Vec<String>,
    /// Keys that could not be copied
    pub failed: Vec<String>,
}

/// Local and remote copies of one key, read under its lock
#[derive(Debug)]
struct KeyState {
    local: Option<RawEnvelope>,
    remote: Option<RawEnvelope>,
    local_confirmed: bool,
}

/// Clears the in-progress flag when a pass ends, however it ends
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Coordinates reads, writes and sync passes for every domain key
pub struct SyncCoordinator<R, L> {
    adapter: CloudAdapter<R, L>,
    detector: ConflictDetector,
    clock: Arc<dyn Clock>,
    cache: Mutex<HashMap<String, RawEnvelope>>,
    locks: KeyLocks,
    events: EventBus,
    syncing: AtomicBool,
    fallback_warned: AtomicBool,
}

impl<R, L> std::fmt::Debug for SyncCoordinator<R, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("origin", &self.detector.origin())
            .field("syncing", &self.syncing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<R: KeyValueStore, L: KeyValueStore> SyncCoordinator<R, L> {
    /// Load or create this device's identity and restore persisted flags
    pub async fn initialize(adapter: CloudAdapter<R, L>, config: &SyncConfig) -> Result<Self> {
        let adapter = adapter.with_max_failures(config.max_consecutive_failures);

        let origin = match read_json::<String, _, _>(&adapter, keys::DEVICE_ID).await? {
            Some(raw) => raw.parse::<DeviceOrigin>().map_err(|error| {
                Error::InvalidInput(format!("stored device id is invalid: {error}"))
            })?,
            None => {
                let origin = DeviceOrigin::new();
                write_json(&adapter, keys::DEVICE_ID, &origin.to_string()).await?;
                tracing::info!("Registered new sync device {origin}");
                origin
            }
        };

        let enabled = read_json::<bool, _, _>(&adapter, keys::SYNC_ENABLED)
            .await?
            .unwrap_or(true);
        adapter.set_remote_enabled(enabled);

        let warned = read_json::<bool, _, _>(&adapter, keys::FALLBACK_WARNING_SHOWN)
            .await?
            .unwrap_or(false);

        tracing::info!(
            "Sync coordinator ready (device {origin}, sync {})",
            if enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            adapter,
            detector: ConflictDetector::new(origin, config.grace_window_ms),
            clock: Arc::new(SystemClock),
            cache: Mutex::new(HashMap::new()),
            locks: KeyLocks::new(),
            events: EventBus::new(),
            syncing: AtomicBool::new(false),
            fallback_warned: AtomicBool::new(warned),
        })
    }

    /// Replace the clock used for envelope stamps
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// This device's origin
    pub const fn device_origin(&self) -> DeviceOrigin {
        self.detector.origin()
    }

    /// Underlying store adapter
    pub const fn adapter(&self) -> &CloudAdapter<R, L> {
        &self.adapter
    }

    /// Register for sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // save / load
    // -----------------------------------------------------------------------

    /// Stamp and store `value` under `key`.
    ///
    /// Returns `true` once the cloud or the local fallback holds the value.
    /// Failures are logged and reported as `false`; the previous value stays.
    pub async fn save<T: Serialize + Sync>(&self, key: &str, value: &T) -> bool {
        if is_reserved(key) {
            tracing::warn!("Refusing to save reserved key '{key}'");
            return false;
        }

        let _guard = self.locks.acquire(key).await;
        match self.save_locked(key, value).await {
            Ok(()) => {
                self.events.publish(SyncEvent::DataChanged {
                    key: key.to_string(),
                });
                true
            }
            Err(error) => {
                tracing::warn!("Failed to save '{key}': {error}");
                false
            }
        }
    }

    async fn save_locked<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_value(value)?;
        let previous = self.previous_stamp(key).await;
        let envelope = SyncEnvelope::new(
            payload,
            next_stamp(self.clock.now_millis(), previous),
            self.device_origin(),
        );
        let bytes = envelope.encode()?;

        let outcome = self.adapter.put(key, &bytes).await?;
        match outcome.target {
            WriteTarget::Remote => {
                // The local copy mirrors the cloud so offline reads see it
                if let Err(error) = self.adapter.put_local(key, &bytes).await {
                    tracing::warn!("Saved '{key}' to cloud but not the local mirror: {error}");
                } else {
                    self.mark_confirmed(key, envelope.modified_at).await;
                }
            }
            WriteTarget::Local => {
                if outcome.used_fallback {
                    self.warn_fallback_once().await;
                }
            }
        }

        tracing::debug!(
            "Saved '{key}' at {} to {:?}",
            envelope.modified_at,
            outcome.target
        );
        self.cache_insert(key, envelope);
        Ok(())
    }

    /// Read the value under `key`.
    ///
    /// Returns `None` when the key was never written or does not decode as
    /// `T`; callers fall back to their domain default.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let envelope = match self.cached(key) {
            Some(envelope) => envelope,
            None => match self.read_for_load(key).await {
                Ok(Some(envelope)) => {
                    self.cache_insert(key, envelope.clone());
                    envelope
                }
                Ok(None) => return None,
                Err(error) => {
                    tracing::warn!("Failed to load '{key}': {error}");
                    return None;
                }
            },
        };

        match envelope.decode_payload::<T>() {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Stored value for '{key}' does not decode: {error}");
                None
            }
        }
    }

    /// Local copy first, then the cloud for keys this device never held
    async fn read_for_load(&self, key: &str) -> Result<Option<RawEnvelope>> {
        let bytes = match self.adapter.get_local(key).await? {
            Some(bytes) => Some(bytes),
            None if self.adapter.is_remote_available() => self.adapter.get_remote(key).await?,
            None => None,
        };
        bytes.map(|bytes| decode_envelope(&bytes)).transpose()
    }

    // -----------------------------------------------------------------------
    // migration
    // -----------------------------------------------------------------------

    /// Copy local-only values into the cloud, once per device.
    ///
    /// Only fills keys the cloud does not have. Cancelling stops between
    /// keys and leaves the run incomplete so the next call resumes it.
    pub async fn migrate_local_data_to_cloud(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        if !self.adapter.is_remote_available() {
            report.status = MigrationStatus::RemoteUnavailable;
            return Ok(report);
        }
        if self.read_flag::<bool>(keys::MIGRATED).await?.unwrap_or(false) {
            report.status = MigrationStatus::AlreadyMigrated;
            return Ok(report);
        }

        tracing::info!("Migrating local data to cloud");
        for key in SYNCED_KEYS {
            if cancel.is_cancelled() {
                tracing::info!("Migration cancelled before '{key}'");
                report.status = MigrationStatus::Cancelled;
                return Ok(report);
            }

            let _guard = self.locks.acquire(key).await;
            match self.migrate_key(key).await {
                Ok(Some(true)) => report.migrated.push(key.to_string()),
                Ok(Some(false)) => report.existing.push(key.to_string()),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!("Failed to migrate '{key}': {error}");
                    report.failed.push(key.to_string());
                }
            }
        }

        if report.failed.is_empty() {
            self.write_flag(keys::MIGRATED, &true).await?;
        }
        tracing::info!(
            "Migration finished: {} copied, {} already in cloud, {} failed",
            report.migrated.len(),
            report.existing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// `Some(true)` when copied, `Some(false)` when the cloud had it,
    /// `None` when there is nothing local
    async fn migrate_key(&self, key: &str) -> Result<Option<bool>> {
        let Some(bytes) = self.adapter.get_local(key).await? else {
            return Ok(None);
        };
        if self.adapter.get_remote(key).await?.is_some() {
            return Ok(Some(false));
        }

        let mut envelope = decode_envelope(&bytes)?;
        if envelope.origin.is_unknown() {
            envelope.modified_at = next_stamp(self.clock.now_millis(), [envelope.modified_at]);
            envelope.origin = self.device_origin();
        }
        let bytes = envelope.encode()?;

        self.adapter.put_remote(key, &bytes).await?;
        self.adapter.put_local(key, &bytes).await?;
        self.mark_confirmed(key, envelope.modified_at).await;
        self.cache_insert(key, envelope);
        Ok(Some(true))
    }

    // -----------------------------------------------------------------------
    // detection and resolution
    // -----------------------------------------------------------------------

    /// Compare both copies of `key`; `Some` when they diverge in a
    /// structured domain and need a resolution choice
    pub async fn detect_conflict(&self, key: &str) -> Result<Option<SyncConflict>> {
        let Some(kind) = conflict_type_for_key(key) else {
            return Ok(None);
        };
        if !self.adapter.is_remote_available() {
            return Ok(None);
        }

        let _guard = self.locks.acquire(key).await;
        let state = self.read_state(key).await?;
        match self.detect(&state) {
            Detection::Conflict(ordering) => {
                build_conflict(key, kind, &state, ordering).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Apply `choice` and write the converged document to both stores
    pub async fn resolve(
        &self,
        conflict: SyncConflict,
        choice: ConflictResolution,
    ) -> Result<DomainDocument> {
        let key = conflict.key.clone();
        reject_reserved(&key)?;
        let _guard = self.locks.acquire(&key).await;
        self.resolve_locked(conflict, choice).await
    }

    async fn resolve_locked(
        &self,
        conflict: SyncConflict,
        choice: ConflictResolution,
    ) -> Result<DomainDocument> {
        if !self.adapter.is_remote_available() {
            return Err(StoreError::Unavailable("cannot resolve while offline".to_string()).into());
        }

        let key = conflict.key.clone();
        let previous = [conflict.local_timestamp, conflict.remote_timestamp];
        let document = ConflictResolver::resolve(conflict, choice);
        self.write_converged(&key, document.to_value()?, previous)
            .await?;

        tracing::info!("Resolved conflict on '{key}' with {choice:?}");
        Ok(document)
    }

    /// Write one freshly stamped version to remote, then local
    async fn write_converged(
        &self,
        key: &str,
        payload: serde_json::Value,
        previous: impl IntoIterator<Item = Timestamp>,
    ) -> Result<()> {
        let envelope = SyncEnvelope::new(
            payload,
            next_stamp(self.clock.now_millis(), previous),
            self.device_origin(),
        );
        let bytes = envelope.encode()?;

        self.adapter.put_remote(key, &bytes).await?;
        self.adapter.put_local(key, &bytes).await?;
        self.mark_confirmed(key, envelope.modified_at).await;
        self.cache_insert(key, envelope);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // sync passes
    // -----------------------------------------------------------------------

    /// Bring one key into agreement between both stores
    pub async fn sync_key<H: ConflictHandler>(
        &self,
        key: &str,
        handler: &H,
    ) -> Result<KeySyncOutcome> {
        reject_reserved(key)?;
        if !self.adapter.is_remote_available() {
            return Ok(KeySyncOutcome::Skipped);
        }

        let guard = self.locks.acquire(key).await;
        let state = self.read_state(key).await?;
        let detection = self.detect(&state);
        tracing::debug!("Detection for '{key}': {detection:?}");

        let (local, remote) = match (&state.local, &state.remote) {
            (Some(local), Some(remote)) => (local, remote),
            (Some(local), None) => {
                self.push_local(key, local).await?;
                return Ok(KeySyncOutcome::PushedLocal);
            }
            (None, Some(remote)) => {
                self.pull_remote(key, remote).await?;
                return Ok(KeySyncOutcome::PulledRemote);
            }
            (None, None) => return Ok(KeySyncOutcome::Absent),
        };

        let ordering = match detection {
            Detection::Absent => return Ok(KeySyncOutcome::Absent),
            Detection::InSync => {
                if !state.local_confirmed {
                    self.mark_confirmed(key, local.modified_at).await;
                }
                return Ok(KeySyncOutcome::InSync);
            }
            Detection::AdoptLocal => {
                self.push_local(key, local).await?;
                return Ok(KeySyncOutcome::PushedLocal);
            }
            Detection::AdoptRemote => {
                self.pull_remote(key, remote).await?;
                return Ok(KeySyncOutcome::PulledRemote);
            }
            Detection::Conflict(ordering) => ordering,
        };

        let Some(kind) = conflict_type_for_key(key) else {
            // Opaque domain: last writer wins, remote on ties
            return if local.modified_at > remote.modified_at {
                self.push_local(key, local).await?;
                Ok(KeySyncOutcome::PushedLocal)
            } else {
                self.pull_remote(key, remote).await?;
                Ok(KeySyncOutcome::PulledRemote)
            };
        };

        let conflict = build_conflict(key, kind, &state, ordering)?;
        tracing::info!("Conflict on '{key}' ({kind}, {ordering:?})");
        self.events.publish(SyncEvent::ConflictDetected {
            key: key.to_string(),
            conflict_type: kind,
        });

        // The handler may wait on the user; don't block writers meanwhile
        drop(guard);
        let Some(choice) = handler.choose(&conflict).await else {
            tracing::info!("Conflict on '{key}' left unresolved");
            return Ok(KeySyncOutcome::Unresolved);
        };

        let _guard = self.locks.acquire(key).await;
        let current = self.read_state(key).await?;
        if current.local != state.local || current.remote != state.remote {
            tracing::info!("'{key}' changed while its conflict was pending");
            return Ok(KeySyncOutcome::Superseded);
        }

        self.resolve_locked(conflict, choice).await?;
        Ok(KeySyncOutcome::Resolved(choice))
    }

    /// Sync every domain key
    pub async fn sync_all<H: ConflictHandler>(
        &self,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        self.sync_keys(&SYNCED_KEYS, handler, cancel).await
    }

    /// Sync the given keys in order; only one pass runs at a time
    pub async fn sync_keys<K: AsRef<str> + Sync, H: ConflictHandler>(
        &self,
        keys: &[K],
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Err(Error::SyncInProgress);
        }
        let _pass = PassGuard(&self.syncing);
        let mut report = SyncReport::default();

        self.adapter.retry_parked_remote();
        if !self.adapter.is_remote_available() {
            report.remote_unavailable = true;
            self.events
                .publish(SyncEvent::StatusChanged(self.current_status(false).await));
            return Ok(report);
        }

        self.events.publish(SyncEvent::SyncStarted);
        self.events
            .publish(SyncEvent::StatusChanged(SyncStatus::Syncing));

        if let Err(error) = self.migrate_local_data_to_cloud(cancel).await {
            tracing::warn!("Migration before sync failed: {error}");
        }

        for key in keys {
            let key = key.as_ref();
            if cancel.is_cancelled() {
                tracing::info!("Sync pass cancelled before '{key}'");
                report.cancelled = true;
                break;
            }
            match self.sync_key(key, handler).await {
                Ok(outcome) => report.outcomes.push((key.to_string(), outcome)),
                Err(error) => {
                    tracing::warn!("Failed to sync '{key}': {error}");
                    report.failures.push((key.to_string(), error.to_string()));
                }
            }
        }

        if !report.cancelled {
            let now = self.clock.now_millis();
            if let Err(error) = self.write_flag(keys::LAST_SYNCED_AT, &now).await {
                tracing::warn!("Failed to record sync time: {error}");
            }
        }

        let changed_keys = report.changed_keys();
        if !report.cancelled || !changed_keys.is_empty() {
            tracing::info!("Cloud sync completed ({} keys changed)", changed_keys.len());
            self.events
                .publish(SyncEvent::SyncCompleted { changed_keys });
        }
        if !report.failures.is_empty() {
            let failed = report
                .failures
                .iter()
                .map(|(key, _)| key.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            self.events.publish(SyncEvent::SyncFailed {
                reason: format!("could not sync {failed}"),
            });
        }
        self.events
            .publish(SyncEvent::StatusChanged(self.current_status(false).await));

        Ok(report)
    }

    /// React to a remote change notification.
    ///
    /// Returns the keys that should go through the debouncer and then a
    /// detection pass.
    pub fn handle_remote_change(&self, change: &RemoteChange) -> Vec<String> {
        match change.reason {
            ChangeReason::QuotaViolation => {
                tracing::warn!("Cloud storage quota exceeded");
                self.events.publish(SyncEvent::SyncFailed {
                    reason: "cloud storage quota exceeded".to_string(),
                });
                Vec::new()
            }
            ChangeReason::AccountChange => {
                tracing::info!("Cloud account changed; resyncing every key");
                self.adapter.reset_remote_failures();
                SYNCED_KEYS.iter().map(ToString::to_string).collect()
            }
            ChangeReason::ServerChange | ChangeReason::InitialSync => change
                .keys
                .iter()
                .filter(|key| !is_reserved(key))
                .cloned()
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // status
    // -----------------------------------------------------------------------

    /// Turn cloud sync on or off for this device
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        self.adapter.set_remote_enabled(enabled);
        self.write_flag(keys::SYNC_ENABLED, &enabled).await?;
        tracing::info!("Cloud sync {}", if enabled { "enabled" } else { "disabled" });
        self.events
            .publish(SyncEvent::StatusChanged(self.status().await));
        Ok(())
    }

    /// Whether the user has cloud sync turned on
    pub fn is_sync_enabled(&self) -> bool {
        self.adapter.is_remote_enabled()
    }

    /// Current overall status
    pub async fn status(&self) -> SyncStatus {
        self.current_status(self.syncing.load(Ordering::SeqCst))
            .await
    }

    async fn current_status(&self, syncing: bool) -> SyncStatus {
        if !self.adapter.is_remote_enabled() {
            SyncStatus::Disabled
        } else if syncing {
            SyncStatus::Syncing
        } else if !self.adapter.is_remote_available() {
            SyncStatus::Unavailable
        } else {
            match self.last_synced_at().await {
                Some(at) => SyncStatus::Synced { at },
                None => SyncStatus::NeverSynced,
            }
        }
    }

    /// When the last complete sync pass finished
    pub async fn last_synced_at(&self) -> Option<Timestamp> {
        match self.read_flag::<Timestamp>(keys::LAST_SYNCED_AT).await {
            Ok(at) => at,
            Err(error) => {
                tracing::warn!("Failed to read last sync time: {error}");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // helpers
    // -----------------------------------------------------------------------

    fn detect(&self, state: &KeyState) -> Detection {
        self.detector.detect(
            state.local.as_ref(),
            state.remote.as_ref(),
            state.local_confirmed,
        )
    }

    async fn read_state(&self, key: &str) -> Result<KeyState> {
        let kind = conflict_type_for_key(key);
        let local = decode_side(key, "local", kind, self.adapter.get_local(key).await?);
        let remote = decode_side(key, "remote", kind, self.adapter.get_remote(key).await?);
        let confirmed = self
            .read_flag::<Timestamp>(&keys::confirmed_marker(key))
            .await?;
        let local_confirmed = matches!(
            (&local, confirmed),
            (Some(local), Some(at)) if local.modified_at == at
        );
        Ok(KeyState {
            local,
            remote,
            local_confirmed,
        })
    }

    async fn push_local(&self, key: &str, local: &RawEnvelope) -> Result<()> {
        if local.origin.is_unknown() {
            // Legacy values get a real stamp before they reach the cloud
            return self
                .write_converged(key, local.payload.clone(), [local.modified_at])
                .await;
        }
        let bytes = local.encode()?;
        self.adapter.put_remote(key, &bytes).await?;
        self.mark_confirmed(key, local.modified_at).await;
        tracing::debug!("Pushed local '{key}' to cloud");
        Ok(())
    }

    async fn pull_remote(&self, key: &str, remote: &RawEnvelope) -> Result<()> {
        let bytes = remote.encode()?;
        self.adapter.put_local(key, &bytes).await?;
        self.mark_confirmed(key, remote.modified_at).await;
        self.cache_insert(key, remote.clone());
        tracing::debug!("Pulled remote '{key}' into local store");
        Ok(())
    }

    async fn previous_stamp(&self, key: &str) -> Option<Timestamp> {
        if let Some(envelope) = self.cached(key) {
            return Some(envelope.modified_at);
        }
        match self.adapter.get_local(key).await {
            Ok(Some(bytes)) => decode_envelope(&bytes).ok().map(|envelope| envelope.modified_at),
            _ => None,
        }
    }

    async fn mark_confirmed(&self, key: &str, at: Timestamp) {
        if let Err(error) = self.write_flag(&keys::confirmed_marker(key), &at).await {
            tracing::warn!("Failed to record cloud confirmation for '{key}': {error}");
        }
    }

    async fn warn_fallback_once(&self) {
        if self.fallback_warned.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!("Cloud unavailable, using local storage");
        if let Err(error) = self.write_flag(keys::FALLBACK_WARNING_SHOWN, &true).await {
            tracing::warn!("Failed to persist fallback warning flag: {error}");
        }
        self.events.publish(SyncEvent::CloudUnavailableWarning);
    }

    async fn read_flag<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        read_json(&self.adapter, key).await
    }

    async fn write_flag<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        write_json(&self.adapter, key, value).await
    }

    fn cached(&self, key: &str) -> Option<RawEnvelope> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn cache_insert(&self, key: &str, envelope: RawEnvelope) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), envelope);
    }
}

async fn read_json<T: DeserializeOwned, R: KeyValueStore, L: KeyValueStore>(
    adapter: &CloudAdapter<R, L>,
    key: &str,
) -> Result<Option<T>> {
    match adapter.get_local(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn write_json<T: Serialize + Sync, R: KeyValueStore, L: KeyValueStore>(
    adapter: &CloudAdapter<R, L>,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    adapter.put_local(key, &bytes).await?;
    Ok(())
}

/// Decode one side; corrupt bytes, or a payload that is not a valid
/// document of the key's domain, count as absent so the other side wins
fn decode_side(
    key: &str,
    side: &str,
    kind: Option<ConflictType>,
    bytes: Option<Vec<u8>>,
) -> Option<RawEnvelope> {
    let bytes = bytes?;
    let envelope = match decode_envelope(&bytes) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!("Ignoring undecodable {side} value for '{key}': {error}");
            return None;
        }
    };
    if let Some(kind) = kind {
        if let Err(error) = DomainDocument::from_value(kind, &envelope.payload) {
            tracing::warn!("Ignoring malformed {side} {kind} document for '{key}': {error}");
            return None;
        }
    }
    Some(envelope)
}

/// Engine bookkeeping never travels through sync
fn reject_reserved(key: &str) -> Result<()> {
    if is_reserved(key) {
        return Err(Error::InvalidInput(format!(
            "'{key}' is reserved for sync bookkeeping"
        )));
    }
    Ok(())
}

fn build_conflict(
    key: &str,
    kind: ConflictType,
    state: &KeyState,
    ordering: ConflictOrdering,
) -> Result<SyncConflict> {
    let (Some(local), Some(remote)) = (&state.local, &state.remote) else {
        return Err(Error::InvalidInput(format!(
            "conflict on '{key}' needs both copies"
        )));
    };
    let data = ConflictData::pair(
        DomainDocument::from_value(kind, &local.payload)?,
        DomainDocument::from_value(kind, &remote.payload)?,
    )?;
    Ok(SyncConflict {
        key: key.to_string(),
        data,
        local_timestamp: local.modified_at,
        remote_timestamp: remote.modified_at,
        ordering,
    })
}
