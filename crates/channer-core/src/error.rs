//! Error types for channer-core

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using channer-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in channer-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Key-value store error (remote or local)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sync pass is already running
    #[error("A sync pass is already in progress")]
    SyncInProgress,
}
