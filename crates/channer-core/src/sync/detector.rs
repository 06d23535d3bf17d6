//! Conflict detection between the local and remote copy of one key

use crate::models::{ConflictOrdering, DeviceOrigin, SyncEnvelope};

/// Default window inside which two writes count as concurrent
pub const DEFAULT_GRACE_WINDOW_MS: i64 = 2_000;

/// What a sync pass should do with one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Neither store has the key
    Absent,
    /// Payloads are structurally equal
    InSync,
    /// Local is authoritative; push it to the remote
    AdoptLocal,
    /// Remote is authoritative; pull it into the local store
    AdoptRemote,
    /// Both sides changed independently
    Conflict(ConflictOrdering),
}

/// Pure decision procedure over two envelopes
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    origin: DeviceOrigin,
    grace_window_ms: i64,
}

impl ConflictDetector {
    pub const fn new(origin: DeviceOrigin, grace_window_ms: i64) -> Self {
        Self {
            origin,
            grace_window_ms,
        }
    }

    /// This device's origin
    pub const fn origin(&self) -> DeviceOrigin {
        self.origin
    }

    /// Compare `local` against `remote`.
    ///
    /// `local_confirmed` is true when the cloud last accepted exactly the
    /// local version, meaning the local copy carries no unpushed edit.
    pub fn detect<T: PartialEq>(
        &self,
        local: Option<&SyncEnvelope<T>>,
        remote: Option<&SyncEnvelope<T>>,
        local_confirmed: bool,
    ) -> Detection {
        let (local, remote) = match (local, remote) {
            (None, None) => return Detection::Absent,
            (Some(_), None) => return Detection::AdoptLocal,
            (None, Some(_)) => return Detection::AdoptRemote,
            (Some(local), Some(remote)) => (local, remote),
        };

        if local.payload == remote.payload {
            return Detection::InSync;
        }

        if remote.origin == self.origin {
            // The remote copy is one of our own writes; the newer of the two wins
            if remote.modified_at > local.modified_at {
                Detection::AdoptRemote
            } else {
                Detection::AdoptLocal
            }
        } else if local_confirmed {
            // Nothing unpushed here, so the foreign remote copy supersedes it
            Detection::AdoptRemote
        } else {
            Detection::Conflict(ConflictOrdering::classify(
                local.modified_at,
                remote.modified_at,
                self.grace_window_ms,
            ))
        }
    }
}
