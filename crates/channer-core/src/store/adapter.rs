//! Cloud-or-local write routing
//!
//! Sends writes to the remote store while it is usable and falls back to the
//! local store otherwise. Repeated remote failures park the remote until
//! something resets the counter: a successful write, an account change, or
//! the retry at the start of each sync pass.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::{check_value_size, KeyValueStore, StoreError, StoreResult};

/// Remote failures in a row before writes stop trying the remote
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Where a write ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Remote,
    Local,
}

/// Result of a routed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Store that accepted the value
    pub target: WriteTarget,
    /// True when the remote was wanted but could not take the write
    pub used_fallback: bool,
}

/// Routes reads and writes between a remote and a local store
#[derive(Debug)]
pub struct CloudAdapter<R, L> {
    remote: R,
    local: L,
    remote_enabled: AtomicBool,
    consecutive_failures: AtomicU32,
    max_failures: u32,
}

impl<R: KeyValueStore, L: KeyValueStore> CloudAdapter<R, L> {
    /// Create an adapter with remote writes enabled
    pub const fn new(remote: R, local: L) -> Self {
        Self {
            remote,
            local,
            remote_enabled: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            max_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Override how many remote failures in a row are tolerated
    #[must_use]
    pub const fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Remote store
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Local store
    pub const fn local(&self) -> &L {
        &self.local
    }

    /// Turn remote sync on or off (user toggle)
    pub fn set_remote_enabled(&self, enabled: bool) {
        self.remote_enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            self.reset_remote_failures();
        }
    }

    /// Whether the user has remote sync turned on
    pub fn is_remote_enabled(&self) -> bool {
        self.remote_enabled.load(Ordering::SeqCst)
    }

    /// Forget earlier remote failures
    pub fn reset_remote_failures(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Remote failures since the last success or reset
    pub fn remote_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Give a parked remote another chance.
    ///
    /// Returns `true` when the remote was parked. The next failure parks it
    /// again only once the failure budget is spent a second time.
    pub fn retry_parked_remote(&self) -> bool {
        let parked = self.is_remote_enabled()
            && self.remote.is_available()
            && self.remote_failures() >= self.max_failures;
        if parked {
            tracing::info!("Retrying remote store after {} failures", self.remote_failures());
            self.reset_remote_failures();
        }
        parked
    }

    /// Whether reads and writes should currently go to the remote
    pub fn is_remote_available(&self) -> bool {
        self.is_remote_enabled()
            && self.remote.is_available()
            && self.remote_failures() < self.max_failures
    }

    /// Write `value`, preferring the remote.
    ///
    /// Values above the remote size ceiling are rejected before anything is
    /// written, whichever store would have received them.
    pub async fn put(&self, key: &str, value: &[u8]) -> StoreResult<WriteOutcome> {
        check_value_size(key, value.len(), self.remote.max_value_bytes())?;

        if !self.is_remote_enabled() {
            self.local.put(key, value).await?;
            return Ok(WriteOutcome {
                target: WriteTarget::Local,
                used_fallback: false,
            });
        }

        if self.is_remote_available() {
            match self.put_remote(key, value).await {
                Ok(()) => {
                    return Ok(WriteOutcome {
                        target: WriteTarget::Remote,
                        used_fallback: false,
                    })
                }
                Err(error @ StoreError::PayloadTooLarge { .. }) => return Err(error),
                Err(error) => {
                    tracing::warn!("Remote write for '{key}' failed, using local store: {error}");
                }
            }
        } else {
            tracing::debug!("Remote unavailable, writing '{key}' locally");
        }

        self.local.put(key, value).await?;
        Ok(WriteOutcome {
            target: WriteTarget::Local,
            used_fallback: true,
        })
    }

    /// Read `key`, preferring the remote and falling back to local
    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if self.is_remote_available() {
            match self.remote.get(key).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    tracing::warn!("Remote read for '{key}' failed, using local store: {error}");
                }
            }
        }
        self.local.get(key).await
    }

    /// Write to the remote only, tracking failures
    pub async fn put_remote(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_value_size(key, value.len(), self.remote.max_value_bytes())?;

        match self.remote.put(key, value).await {
            Ok(()) => {
                self.reset_remote_failures();
                Ok(())
            }
            Err(error @ StoreError::PayloadTooLarge { .. }) => Err(error),
            Err(error) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures == self.max_failures {
                    tracing::warn!("Remote store failed {failures} times in a row; pausing remote writes");
                }
                Err(error)
            }
        }
    }

    /// Read from the remote only
    pub async fn get_remote(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.remote.get(key).await
    }

    /// Write to the local store only
    pub async fn put_local(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.local.put(key, value).await
    }

    /// Read from the local store only
    pub async fn get_local(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.local.get(key).await
    }
}
