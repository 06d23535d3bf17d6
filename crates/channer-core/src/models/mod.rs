//! Data models for Channer sync

mod category;
mod conflict;
mod envelope;
mod settings;
mod theme;
mod thread;

pub use category::{BookmarkCategory, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON};
pub use conflict::{
    ConflictData, ConflictOrdering, ConflictResolution, ConflictType, DomainDocument,
    SyncConflict,
};
pub use envelope::{
    decode_envelope, next_stamp, DeviceOrigin, RawEnvelope, SyncEnvelope, Timestamp,
};
pub use settings::{keys as setting_keys, SettingEntry, SettingsDocument};
pub use theme::Theme;
pub use thread::{ThreadKey, ThreadRecord};
