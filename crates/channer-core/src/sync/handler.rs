//! Collaborator that picks a resolution for a surfaced conflict

use std::future::Future;

use crate::models::{ConflictResolution, SyncConflict};

/// Chooses how a conflict is settled, usually by asking the user.
///
/// Returning `None` dismisses the conflict: the key keeps its local state
/// and the next sync pass detects it again.
pub trait ConflictHandler: Send + Sync {
    fn choose(
        &self,
        conflict: &SyncConflict,
    ) -> impl Future<Output = Option<ConflictResolution>> + Send;
}

/// Always merges
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoMerge;

impl ConflictHandler for AutoMerge {
    async fn choose(&self, _conflict: &SyncConflict) -> Option<ConflictResolution> {
        Some(ConflictResolution::Merge)
    }
}

/// Always answers with the same choice, or always dismisses
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub Option<ConflictResolution>);

impl ConflictHandler for FixedChoice {
    async fn choose(&self, _conflict: &SyncConflict) -> Option<ConflictResolution> {
        self.0
    }
}
