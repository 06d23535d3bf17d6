//! Synced application settings
//!
//! Settings are independent toggles, so each entry carries its own
//! modification time and merges happen key by key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Timestamp;

/// Well-known setting keys shared by every client
pub mod keys {
    pub const DEFAULT_BOARD: &str = "defaultBoard";
    pub const SELECTED_THEME_ID: &str = "channer_selected_theme_id";
    pub const BIOMETRIC_LOCK_ENABLED: &str = "channer_faceID_authentication_enabled";
    pub const NOTIFICATIONS_ENABLED: &str = "channer_notifications_enabled";
    pub const OFFLINE_READING_ENABLED: &str = "channer_offline_reading_enabled";
    pub const LAUNCH_WITH_STARTUP_BOARD: &str = "channer_launch_with_startup_board";
    pub const BOARDS_AUTO_REFRESH_INTERVAL: &str = "channer_boards_auto_refresh_interval";
    pub const THREADS_AUTO_REFRESH_INTERVAL: &str = "channer_threads_auto_refresh_interval";
    pub const HIDDEN_BOARDS: &str = "channer_hidden_boards";
}

/// A single setting value with its own write time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    /// JSON-compatible value
    pub value: serde_json::Value,
    /// When this entry was last written (Unix ms)
    pub modified_at: Timestamp,
}

/// Flat map of setting key to entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument {
    entries: BTreeMap<String, SettingEntry>,
}

impl SettingsDocument {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, stamping the entry with `modified_at`
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
        modified_at: Timestamp,
    ) {
        self.entries.insert(
            key.into(),
            SettingEntry {
                value: value.into(),
                modified_at,
            },
        );
    }

    /// Insert a fully formed entry
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: SettingEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Get the entry for a key
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&SettingEntry> {
        self.entries.get(key)
    }

    /// Get the value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingEntry)> {
        self.entries.iter()
    }

    /// Number of settings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no settings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
