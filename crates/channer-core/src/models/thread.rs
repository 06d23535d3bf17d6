//! Thread snapshot stored in the favorites and history lists

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Timestamp;

/// Identity of a thread across devices
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadKey {
    /// Board abbreviation (e.g. "g")
    pub board_id: String,
    /// Thread number on that board
    pub thread_number: u64,
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.board_id, self.thread_number)
    }
}

/// Denormalized snapshot of a thread, small enough to be replaced wholesale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    /// Board abbreviation
    pub board_id: String,
    /// Thread number on the board
    pub thread_number: u64,
    /// Subject line
    #[serde(default)]
    pub title: String,
    /// Opening post body
    #[serde(default)]
    pub comment: String,
    /// Thumbnail URL, empty when the post has no image
    #[serde(default)]
    pub image_url: String,
    /// "replies/images" summary shown in lists
    #[serde(default)]
    pub stats: String,
    /// Reply count when the thread was saved
    #[serde(default)]
    pub replies: u32,
    /// Latest known reply count
    #[serde(default)]
    pub current_replies: Option<u32>,
    /// Whether new replies arrived since the user last opened it
    #[serde(default)]
    pub has_new_replies: bool,
    /// Bookmark category this favorite is filed under
    #[serde(default)]
    pub category_id: Option<String>,
    /// Last time this entry changed (Unix ms)
    pub modified_at: Timestamp,
}

impl ThreadRecord {
    /// Create a record with empty display fields
    #[must_use]
    pub fn new(board_id: impl Into<String>, thread_number: u64, modified_at: Timestamp) -> Self {
        Self {
            board_id: board_id.into(),
            thread_number,
            title: String::new(),
            comment: String::new(),
            image_url: String::new(),
            stats: String::new(),
            replies: 0,
            current_replies: None,
            has_new_replies: false,
            category_id: None,
            modified_at,
        }
    }

    /// Identity used to de-duplicate entries
    #[must_use]
    pub fn key(&self) -> ThreadKey {
        ThreadKey {
            board_id: self.board_id.clone(),
            thread_number: self.thread_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_key_display_uses_board_path() {
        let record = ThreadRecord::new("g", 12345, 1);
        assert_eq!(record.key().to_string(), "/g/12345");
    }

    #[test]
    fn missing_optional_fields_default() {
        let record: ThreadRecord =
            serde_json::from_str(r#"{"board_id":"a","thread_number":7,"modified_at":3}"#).unwrap();
        assert_eq!(record, ThreadRecord::new("a", 7, 3));
    }
}
