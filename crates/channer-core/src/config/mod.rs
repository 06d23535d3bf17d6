//! Sync engine configuration.
//!
//! Loaded from a JSON file, then overridden from the environment. Every
//! field has a default so an empty object is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Environment variable overriding the cloud endpoint
pub const CLOUD_URL_ENV: &str = "CHANNER_CLOUD_URL";
/// Environment variable overriding the cloud bearer token
pub const CLOUD_TOKEN_ENV: &str = "CHANNER_CLOUD_TOKEN";

const DEFAULT_MAX_VALUE_BYTES: usize = 1024 * 1024;
const DEFAULT_GRACE_WINDOW_MS: i64 = 2_000;
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_AUTO_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Tunables for the sync engine and its cloud connection.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// Base URL of the cloud key-value store; sync is local-only without it
    pub cloud_url: Option<String>,
    /// Bearer token for the cloud store
    pub auth_token: Option<String>,
    /// Per-key size ceiling enforced before remote writes
    pub max_value_bytes: usize,
    /// Writes closer together than this are treated as concurrent
    pub grace_window_ms: i64,
    /// Quiet window for remote change notifications
    pub debounce_ms: u64,
    /// Interval between background sync passes
    pub auto_sync_interval_secs: u64,
    /// Remote failures in a row before writes go local-only
    pub max_consecutive_failures: u32,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("cloud_url", &self.cloud_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_value_bytes", &self.max_value_bytes)
            .field("grace_window_ms", &self.grace_window_ms)
            .field("debounce_ms", &self.debounce_ms)
            .field("auto_sync_interval_secs", &self.auto_sync_interval_secs)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cloud_url: None,
            auth_token: None,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            auto_sync_interval_secs: DEFAULT_AUTO_SYNC_INTERVAL_SECS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl SyncConfig {
    /// Parse a config from JSON text and validate it
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid sync config JSON: {error}")))?;
        config.validated()
    }

    /// Read a config file; a missing file yields the defaults
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No sync config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let payload = std::fs::read_to_string(path)?;
        Self::from_json(&payload)
    }

    /// Apply `CHANNER_CLOUD_URL` / `CHANNER_CLOUD_TOKEN` from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(CLOUD_URL_ENV)) {
            self.cloud_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(CLOUD_TOKEN_ENV)) {
            self.auth_token = Some(token);
        }
        self.validated()
    }

    /// Check invariants and normalize the cloud URL
    pub fn validated(mut self) -> Result<Self> {
        self.cloud_url = match normalize_text_option(self.cloud_url.take()) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(_) => {
                return Err(Error::Config(
                    "cloud_url must include http:// or https://".to_string(),
                ))
            }
            None => None,
        };
        self.auth_token = normalize_text_option(self.auth_token.take());

        if self.max_value_bytes == 0 {
            return Err(Error::Config("max_value_bytes must be positive".to_string()));
        }
        if self.grace_window_ms < 0 {
            return Err(Error::Config(
                "grace_window_ms must not be negative".to_string(),
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Debounce window as a duration
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Background sync interval as a duration
    pub const fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.auto_sync_interval_secs)
    }
}
