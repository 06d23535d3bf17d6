//! Sync conflict model
//!
//! A conflict pairs the local and remote copy of one domain document. The
//! pair is a tagged union so both sides always share a document type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{BookmarkCategory, SettingsDocument, Theme, ThreadRecord, Timestamp};
use crate::error::{Error, Result};

/// Domain a conflict belongs to; selects the merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Favorites,
    History,
    Categories,
    Themes,
    Settings,
}

impl ConflictType {
    /// All domains with structured conflict handling
    pub const ALL: [Self; 5] = [
        Self::Favorites,
        Self::History,
        Self::Categories,
        Self::Themes,
        Self::Settings,
    ];

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::History => "history",
            Self::Categories => "categories",
            Self::Themes => "themes",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| Error::InvalidInput(format!("unknown conflict type: {s}")))
    }
}

/// How a conflict should be settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    TakeLocal,
    TakeRemote,
    Merge,
}

/// Relative age of the two sides of a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOrdering {
    /// Local was written later, beyond the grace window
    LocalNewer,
    /// Remote was written later, beyond the grace window
    RemoteNewer,
    /// Timestamps fall within the grace window; ordering is ambiguous
    Concurrent,
}

impl ConflictOrdering {
    /// Classify two timestamps given a grace window in milliseconds
    #[must_use]
    pub const fn classify(local: Timestamp, remote: Timestamp, grace_window_ms: i64) -> Self {
        let delta = local.saturating_sub(remote);
        if delta > grace_window_ms {
            Self::LocalNewer
        } else if delta < -grace_window_ms {
            Self::RemoteNewer
        } else {
            Self::Concurrent
        }
    }
}

/// A single strongly typed domain document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainDocument {
    Favorites(Vec<ThreadRecord>),
    History(Vec<ThreadRecord>),
    Categories(Vec<BookmarkCategory>),
    Themes(Vec<Theme>),
    Settings(SettingsDocument),
}

impl DomainDocument {
    /// Decode a JSON payload as the document type for `kind`
    pub fn from_value(kind: ConflictType, value: &serde_json::Value) -> Result<Self> {
        Ok(match kind {
            ConflictType::Favorites => Self::Favorites(Vec::deserialize(value)?),
            ConflictType::History => Self::History(Vec::deserialize(value)?),
            ConflictType::Categories => Self::Categories(Vec::deserialize(value)?),
            ConflictType::Themes => Self::Themes(Vec::deserialize(value)?),
            ConflictType::Settings => Self::Settings(SettingsDocument::deserialize(value)?),
        })
    }

    /// Encode the document as a JSON payload
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Favorites(records) | Self::History(records) => serde_json::to_value(records)?,
            Self::Categories(categories) => serde_json::to_value(categories)?,
            Self::Themes(themes) => serde_json::to_value(themes)?,
            Self::Settings(settings) => serde_json::to_value(settings)?,
        })
    }

    /// Domain of this document
    #[must_use]
    pub const fn conflict_type(&self) -> ConflictType {
        match self {
            Self::Favorites(_) => ConflictType::Favorites,
            Self::History(_) => ConflictType::History,
            Self::Categories(_) => ConflictType::Categories,
            Self::Themes(_) => ConflictType::Themes,
            Self::Settings(_) => ConflictType::Settings,
        }
    }

    /// Number of entries, for summaries shown to the user
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Favorites(records) | Self::History(records) => records.len(),
            Self::Categories(categories) => categories.len(),
            Self::Themes(themes) => themes.len(),
            Self::Settings(settings) => settings.len(),
        }
    }

    /// Whether the document has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Local and remote documents of the same domain
#[derive(Debug, PartialEq, Eq)]
pub enum ConflictData {
    Favorites {
        local: Vec<ThreadRecord>,
        remote: Vec<ThreadRecord>,
    },
    History {
        local: Vec<ThreadRecord>,
        remote: Vec<ThreadRecord>,
    },
    Categories {
        local: Vec<BookmarkCategory>,
        remote: Vec<BookmarkCategory>,
    },
    Themes {
        local: Vec<Theme>,
        remote: Vec<Theme>,
    },
    Settings {
        local: SettingsDocument,
        remote: SettingsDocument,
    },
}

impl ConflictData {
    /// Pair two documents; fails when they belong to different domains
    pub fn pair(local: DomainDocument, remote: DomainDocument) -> Result<Self> {
        use DomainDocument as D;

        Ok(match (local, remote) {
            (D::Favorites(local), D::Favorites(remote)) => Self::Favorites { local, remote },
            (D::History(local), D::History(remote)) => Self::History { local, remote },
            (D::Categories(local), D::Categories(remote)) => Self::Categories { local, remote },
            (D::Themes(local), D::Themes(remote)) => Self::Themes { local, remote },
            (D::Settings(local), D::Settings(remote)) => Self::Settings { local, remote },
            (local, remote) => {
                return Err(Error::InvalidInput(format!(
                    "cannot pair {} document with {} document",
                    local.conflict_type(),
                    remote.conflict_type()
                )))
            }
        })
    }

    /// Domain of both documents
    #[must_use]
    pub const fn conflict_type(&self) -> ConflictType {
        match self {
            Self::Favorites { .. } => ConflictType::Favorites,
            Self::History { .. } => ConflictType::History,
            Self::Categories { .. } => ConflictType::Categories,
            Self::Themes { .. } => ConflictType::Themes,
            Self::Settings { .. } => ConflictType::Settings,
        }
    }

    /// Split back into the two documents
    #[must_use]
    pub fn into_documents(self) -> (DomainDocument, DomainDocument) {
        use DomainDocument as D;

        match self {
            Self::Favorites { local, remote } => (D::Favorites(local), D::Favorites(remote)),
            Self::History { local, remote } => (D::History(local), D::History(remote)),
            Self::Categories { local, remote } => (D::Categories(local), D::Categories(remote)),
            Self::Themes { local, remote } => (D::Themes(local), D::Themes(remote)),
            Self::Settings { local, remote } => (D::Settings(local), D::Settings(remote)),
        }
    }
}

/// Divergent local and remote versions of one key.
///
/// Built by the detector, consumed once by the resolver, never persisted.
#[derive(Debug)]
pub struct SyncConflict {
    /// Store key the documents live under
    pub key: String,
    /// Both documents
    pub data: ConflictData,
    /// Local envelope timestamp
    pub local_timestamp: Timestamp,
    /// Remote envelope timestamp
    pub remote_timestamp: Timestamp,
    /// Which side looks newer
    pub ordering: ConflictOrdering,
}

impl SyncConflict {
    /// Domain of the conflicting documents
    #[must_use]
    pub const fn conflict_type(&self) -> ConflictType {
        self.data.conflict_type()
    }
}
