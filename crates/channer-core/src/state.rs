//! Shared sync status shown to the user.

use std::fmt;

use chrono::DateTime;

use crate::models::Timestamp;

/// Overall state of cloud sync on this device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// The user turned sync off
    Disabled,
    /// Sync is on but the cloud cannot be reached
    Unavailable,
    /// Sync is on and no pass has finished yet
    NeverSynced,
    /// A pass is running
    Syncing,
    /// The last pass finished at `at` (Unix ms)
    Synced { at: Timestamp },
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Sync disabled"),
            Self::Unavailable => f.write_str("Cloud unavailable, using local storage"),
            Self::NeverSynced => f.write_str("Never synced"),
            Self::Syncing => f.write_str("Syncing..."),
            Self::Synced { at } => match DateTime::from_timestamp_millis(*at) {
                Some(time) => write!(f, "Last synced {}", time.format("%Y-%m-%d %H:%M:%S UTC")),
                None => f.write_str("Last synced at an unknown time"),
            },
        }
    }
}
