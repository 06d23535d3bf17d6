//! Sync event bus
//!
//! Subscribers hold a broadcast receiver; dropping it unsubscribes.

use tokio::sync::broadcast;

use super::SyncStatus;
use crate::models::ConflictType;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 64;

/// Something observers of the engine may care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync pass began
    SyncStarted,
    /// "cloud sync completed": caches for `changed_keys` should re-load
    SyncCompleted { changed_keys: Vec<String> },
    /// A sync pass or remote notification reported a failure
    SyncFailed { reason: String },
    /// Overall status moved
    StatusChanged(SyncStatus),
    /// A key was saved on this device
    DataChanged { key: String },
    /// A conflict is waiting for a choice
    ConflictDetected {
        key: String,
        conflict_type: ConflictType,
    },
    /// Cloud unavailable, writing locally; sent once per installation
    CloudUnavailableWarning,
}

/// Fan-out channel owned by the coordinator
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Send to every current subscriber; no-op when nobody listens
    pub fn publish(&self, event: SyncEvent) {
        tracing::debug!(?event, "publishing sync event");
        let _ = self.sender.send(event);
    }
}
