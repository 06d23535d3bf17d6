//! Custom theme model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Timestamp;

/// A user-created color theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Stable identifier shared across devices
    pub id: String,
    /// Display name
    pub name: String,
    /// Color role (e.g. "background", "accent") to hex color
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
    /// Last update timestamp (Unix ms)
    pub updated_at: Timestamp,
}
