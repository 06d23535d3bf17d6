//! Sync envelope: a domain payload stamped with its last-modified time and writer

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Result;

/// Unix timestamp in milliseconds
pub type Timestamp = i64;

/// Identifies the device that produced a write.
///
/// Lets the engine recognise its own writes when they come back from the
/// cloud instead of treating them as foreign edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceOrigin(Uuid);

impl DeviceOrigin {
    /// Origin of payloads written before envelopes existed
    pub const UNKNOWN: Self = Self(Uuid::nil());

    /// Create a new unique device origin
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Whether this is the placeholder used for legacy payloads
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for DeviceOrigin {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceOrigin {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The unit exchanged with the stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope<T> {
    /// Domain document
    pub payload: T,
    /// Last local write time (Unix ms)
    pub modified_at: Timestamp,
    /// Device that wrote this version
    pub origin: DeviceOrigin,
}

/// Envelope with an untyped JSON payload, used wherever the engine handles
/// documents without knowing their domain type
pub type RawEnvelope = SyncEnvelope<serde_json::Value>;

impl<T> SyncEnvelope<T> {
    /// Wrap a payload
    pub const fn new(payload: T, modified_at: Timestamp, origin: DeviceOrigin) -> Self {
        Self {
            payload,
            modified_at,
            origin,
        }
    }
}

impl<T: Serialize> SyncEnvelope<T> {
    /// Encode as JSON bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl RawEnvelope {
    /// Deserialize the payload into a concrete document type
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// Decode stored bytes into an envelope.
///
/// Bytes written before envelopes existed hold the bare payload; those are
/// wrapped with `modified_at = 0` and an unknown origin so they always lose
/// a timestamp comparison against any stamped write.
pub fn decode_envelope(bytes: &[u8]) -> Result<RawEnvelope> {
    if let Ok(envelope) = serde_json::from_slice::<RawEnvelope>(bytes) {
        return Ok(envelope);
    }
    let payload = serde_json::from_slice::<serde_json::Value>(bytes)?;
    Ok(SyncEnvelope::new(payload, 0, DeviceOrigin::UNKNOWN))
}

/// Next timestamp for a write that replaces versions stamped at `previous`.
///
/// Never goes backwards, even when the wall clock does.
pub fn next_stamp(now: Timestamp, previous: impl IntoIterator<Item = Timestamp>) -> Timestamp {
    previous
        .into_iter()
        .map(|stamp| stamp.saturating_add(1))
        .fold(now, Timestamp::max)
}
