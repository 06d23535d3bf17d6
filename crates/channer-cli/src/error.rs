use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] channer_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown key '{0}'. Known keys: {1}")]
    UnknownKey(String, String),
    #[error("No value provided")]
    EmptyValue,
    #[error("Nothing stored under '{0}'")]
    KeyNotFound(String),
    #[error("Failed to save '{0}'; see log output for details")]
    SaveFailed(String),
    #[error("Cloud is not reachable; check CHANNER_CLOUD_URL and CHANNER_CLOUD_TOKEN")]
    CloudUnavailable,
    #[error("Configuration error: {0}")]
    Config(String),
}
