//! Domain merge strategies
//!
//! Merges are pure functions of the two documents. Entry timestamps decide
//! which side wins; exact ties go to the entry with the greater JSON encoding
//! so both devices pick the same winner.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::models::{
    BookmarkCategory, SettingEntry, SettingsDocument, Theme, ThreadKey, ThreadRecord, Timestamp,
};

/// A list entry with a stable identity and its own write time
pub trait Versioned: Serialize + Clone {
    type Id: Eq + Hash;

    fn identity(&self) -> Self::Id;

    fn version(&self) -> Timestamp;
}

impl Versioned for ThreadRecord {
    type Id = ThreadKey;

    fn identity(&self) -> ThreadKey {
        self.key()
    }

    fn version(&self) -> Timestamp {
        self.modified_at
    }
}

impl Versioned for BookmarkCategory {
    type Id = String;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> Timestamp {
        self.updated_at
    }
}

impl Versioned for Theme {
    type Id = String;

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn version(&self) -> Timestamp {
        self.updated_at
    }
}

/// Union of both lists, de-duplicated by identity.
///
/// Entries keep the position of their first appearance (local entries
/// first). When both sides hold the same identity the newer entry replaces
/// the older one wholesale. Nothing is dropped for being absent on one side.
pub fn merge_by_identity<T: Versioned>(local: &[T], remote: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(local.len() + remote.len());
    let mut positions: HashMap<T::Id, usize> = HashMap::new();

    for item in local.iter().chain(remote) {
        match positions.entry(item.identity()) {
            Entry::Occupied(slot) => {
                let current = &mut merged[*slot.get()];
                if prefers(item, item.version(), current, current.version()) {
                    *current = item.clone();
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}

/// Per-key last-writer-wins over two settings documents
pub fn merge_settings(local: &SettingsDocument, remote: &SettingsDocument) -> SettingsDocument {
    let mut merged = local.clone();

    for (key, theirs) in remote.iter() {
        let keep_theirs = merged
            .entry(key)
            .map_or(true, |ours| prefers_entry(theirs, ours));
        if keep_theirs {
            merged.insert_entry(key.clone(), theirs.clone());
        }
    }

    merged
}

fn prefers_entry(candidate: &SettingEntry, current: &SettingEntry) -> bool {
    prefers(
        &candidate.value,
        candidate.modified_at,
        &current.value,
        current.modified_at,
    )
}

/// Whether `candidate` should replace `current`
fn prefers<T: Serialize>(
    candidate: &T,
    candidate_at: Timestamp,
    current: &T,
    current_at: Timestamp,
) -> bool {
    match candidate_at.cmp(&current_at) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            serde_json::to_vec(candidate).ok() > serde_json::to_vec(current).ok()
        }
    }
}
