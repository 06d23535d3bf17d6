//! Cross-device sync engine.
//!
//! Every domain document lives under one stable key in two stores: the
//! cloud and this device's local store. The coordinator stamps writes,
//! detects divergence between the two copies and writes converged
//! documents back to both.

mod clock;
mod coordinator;
mod debounce;
mod detector;
mod events;
mod handler;
pub mod keys;
mod locks;
mod merge;
mod resolver;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use coordinator::{
    ChangeReason, KeySyncOutcome, MigrationReport, MigrationStatus, RemoteChange,
    SyncCoordinator, SyncReport,
};
pub use debounce::{DebounceState, RemoteChangeDebouncer};
pub use detector::{ConflictDetector, Detection, DEFAULT_GRACE_WINDOW_MS};
pub use events::{EventBus, SyncEvent};
pub use handler::{AutoMerge, ConflictHandler, FixedChoice};
pub use locks::KeyLocks;
pub use merge::{merge_by_identity, merge_settings, Versioned};
pub use resolver::ConflictResolver;

pub use crate::state::SyncStatus;
