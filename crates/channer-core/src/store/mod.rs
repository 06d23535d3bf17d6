//! Key-value stores the sync engine reads and writes
//!
//! Every store speaks raw bytes per key. Writes are all-or-nothing per key.

mod adapter;
mod http;
mod libsql_store;
mod memory;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

pub use adapter::{CloudAdapter, WriteOutcome, WriteTarget, DEFAULT_MAX_CONSECUTIVE_FAILURES};
pub use http::HttpCloudStore;
pub use libsql_store::LibSqlStore;
pub use memory::MemoryStore;

/// Errors raised by a key-value store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Remote unreachable or no account signed in
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Value exceeds the per-key size ceiling; nothing was written
    #[error("payload for '{key}' is {size} bytes, limit is {limit}")]
    PayloadTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },
    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Byte-level key-value store
pub trait KeyValueStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> impl Future<Output = StoreResult<()>> + Send;

    /// Read the value under `key`, `None` when it was never written
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<Vec<u8>>>> + Send;

    /// Whether the store can currently serve requests
    fn is_available(&self) -> bool;

    /// Per-key size ceiling in bytes, if any
    fn max_value_bytes(&self) -> Option<usize> {
        None
    }
}

impl<S: KeyValueStore> KeyValueStore for Arc<S> {
    fn put(&self, key: &str, value: &[u8]) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<Vec<u8>>>> + Send {
        (**self).get(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn max_value_bytes(&self) -> Option<usize> {
        (**self).max_value_bytes()
    }
}

/// Reject values above `limit` before anything is written
pub(crate) fn check_value_size(key: &str, size: usize, limit: Option<usize>) -> StoreResult<()> {
    match limit {
        Some(limit) if size > limit => Err(StoreError::PayloadTooLarge {
            key: key.to_string(),
            size,
            limit,
        }),
        _ => Ok(()),
    }
}
