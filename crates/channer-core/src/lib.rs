//! channer-core - Sync engine for Channer
//!
//! This crate contains the synced data models, the local and cloud stores,
//! and the coordinator that keeps both in agreement across devices.

pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use state::SyncStatus;
pub use sync::SyncCoordinator;
