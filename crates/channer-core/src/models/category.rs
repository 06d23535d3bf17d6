//! Bookmark category model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;

/// Default accent color for new categories
pub const DEFAULT_CATEGORY_COLOR: &str = "#007AFF";
/// Default icon for new categories
pub const DEFAULT_CATEGORY_ICON: &str = "folder";

/// A user-defined folder for favorites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkCategory {
    /// Stable identifier shared across devices
    pub id: String,
    /// Display name
    pub name: String,
    /// Hex color string
    pub color: String,
    /// Icon name
    pub icon: String,
    /// Creation timestamp (Unix ms)
    pub created_at: Timestamp,
    /// Last update timestamp (Unix ms)
    pub updated_at: Timestamp,
}

impl BookmarkCategory {
    /// Create a new category with default color and icon
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            icon: DEFAULT_CATEGORY_ICON.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
