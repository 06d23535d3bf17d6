//! Stable store keys
//!
//! Domain managers address the engine only by these strings. Keys under
//! [`RESERVED_PREFIX`] hold engine bookkeeping in the local store.

use crate::models::ConflictType;

pub const FAVORITES: &str = "favorites";
pub const THREAD_HISTORY: &str = "threadHistory";
pub const BOOKMARK_CATEGORIES: &str = "bookmarkCategories";
pub const CUSTOM_THEMES: &str = "channer_custom_themes";
pub const SETTINGS: &str = "channer_settings";
pub const CONTENT_FILTERS: &str = "content_filters";
pub const SEARCH_HISTORY: &str = "searchHistory";
pub const SAVED_SEARCHES: &str = "savedSearches";
pub const HIDDEN_BOARDS: &str = "channer_hidden_boards";
pub const USER_STATISTICS: &str = "channer_user_statistics";

/// Every key a full sync pass visits, in pass order
pub const SYNCED_KEYS: [&str; 10] = [
    FAVORITES,
    THREAD_HISTORY,
    BOOKMARK_CATEGORIES,
    CUSTOM_THEMES,
    SETTINGS,
    CONTENT_FILTERS,
    SEARCH_HISTORY,
    SAVED_SEARCHES,
    HIDDEN_BOARDS,
    USER_STATISTICS,
];

/// Prefix of engine-owned keys; `save` refuses them
pub const RESERVED_PREFIX: &str = "sync.";

pub(crate) const DEVICE_ID: &str = "sync.device_id";
pub(crate) const SYNC_ENABLED: &str = "sync.enabled";
pub(crate) const MIGRATED: &str = "sync.migrated";
pub(crate) const FALLBACK_WARNING_SHOWN: &str = "sync.fallback_warning_shown";
pub(crate) const LAST_SYNCED_AT: &str = "sync.last_synced_at";

/// Marker recording the envelope timestamp the cloud last accepted for `key`
pub(crate) fn confirmed_marker(key: &str) -> String {
    format!("{RESERVED_PREFIX}confirmed.{key}")
}

/// Whether `key` is engine bookkeeping
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Structured domain stored under `key`, `None` for opaque domains
pub fn conflict_type_for_key(key: &str) -> Option<ConflictType> {
    match key {
        FAVORITES => Some(ConflictType::Favorites),
        THREAD_HISTORY => Some(ConflictType::History),
        BOOKMARK_CATEGORIES => Some(ConflictType::Categories),
        CUSTOM_THEMES => Some(ConflictType::Themes),
        SETTINGS => Some(ConflictType::Settings),
        _ => None,
    }
}
