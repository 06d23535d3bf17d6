//! Conflict resolution policies

use crate::models::{ConflictData, ConflictResolution, DomainDocument, SyncConflict};

use super::merge::{merge_by_identity, merge_settings};

/// Turns a conflict and a choice into the converged document.
///
/// Pure: the output depends only on the two documents and the choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Consume `conflict` and produce the document both stores should hold
    pub fn resolve(conflict: SyncConflict, choice: ConflictResolution) -> DomainDocument {
        match choice {
            ConflictResolution::TakeLocal => conflict.data.into_documents().0,
            ConflictResolution::TakeRemote => conflict.data.into_documents().1,
            ConflictResolution::Merge => Self::merge(&conflict.data),
        }
    }

    /// Domain-specific merge of both sides
    pub fn merge(data: &ConflictData) -> DomainDocument {
        match data {
            ConflictData::Favorites { local, remote } => {
                DomainDocument::Favorites(merge_by_identity(local, remote))
            }
            ConflictData::History { local, remote } => {
                DomainDocument::History(merge_by_identity(local, remote))
            }
            ConflictData::Categories { local, remote } => {
                DomainDocument::Categories(merge_by_identity(local, remote))
            }
            ConflictData::Themes { local, remote } => {
                DomainDocument::Themes(merge_by_identity(local, remote))
            }
            ConflictData::Settings { local, remote } => {
                DomainDocument::Settings(merge_settings(local, remote))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictOrdering, SettingsDocument, Theme, ThreadRecord};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn favorites_conflict() -> SyncConflict {
        SyncConflict {
            key: "favorites".to_string(),
            data: ConflictData::Favorites {
                local: vec![ThreadRecord::new("g", 1, 1), ThreadRecord::new("g", 2, 2)],
                remote: vec![ThreadRecord::new("g", 1, 3), ThreadRecord::new("g", 3, 4)],
            },
            local_timestamp: 2,
            remote_timestamp: 4,
            ordering: ConflictOrdering::Concurrent,
        }
    }

    #[test]
    fn take_local_and_remote_are_verbatim() {
        let local = ConflictResolver::resolve(favorites_conflict(), ConflictResolution::TakeLocal);
        assert_eq!(
            local,
            DomainDocument::Favorites(vec![
                ThreadRecord::new("g", 1, 1),
                ThreadRecord::new("g", 2, 2)
            ])
        );

        let remote = ConflictResolver::resolve(favorites_conflict(), ConflictResolution::TakeRemote);
        assert_eq!(
            remote,
            DomainDocument::Favorites(vec![
                ThreadRecord::new("g", 1, 3),
                ThreadRecord::new("g", 3, 4)
            ])
        );
    }

    #[test]
    fn merge_unions_favorites() {
        let merged = ConflictResolver::resolve(favorites_conflict(), ConflictResolution::Merge);
        assert_eq!(
            merged,
            DomainDocument::Favorites(vec![
                ThreadRecord::new("g", 1, 3),
                ThreadRecord::new("g", 2, 2),
                ThreadRecord::new("g", 3, 4),
            ])
        );
    }

    #[test]
    fn merge_is_deterministic() {
        let theme = |id: &str, at| Theme {
            id: id.to_string(),
            name: id.to_uppercase(),
            palette: BTreeMap::new(),
            updated_at: at,
        };
        let data = ConflictData::Themes {
            local: vec![theme("a", 1), theme("b", 5)],
            remote: vec![theme("b", 7), theme("c", 2)],
        };

        assert_eq!(ConflictResolver::merge(&data), ConflictResolver::merge(&data));
        assert_eq!(
            ConflictResolver::merge(&data),
            DomainDocument::Themes(vec![theme("a", 1), theme("b", 7), theme("c", 2)])
        );
    }

    #[test]
    fn merge_settings_document() {
        let mut local = SettingsDocument::new();
        local.set("theme", "dark", 5);
        let remote = SettingsDocument::new();

        let merged = ConflictResolver::merge(&ConflictData::Settings {
            local: local.clone(),
            remote,
        });
        assert_eq!(merged, DomainDocument::Settings(local));
    }
}
