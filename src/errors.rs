// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DicyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("A build is already in progress")]
    BuildInProgress,

    /// Raised at kill checkpoints once cancellation has been requested.
    #[error("Build cancelled: {0}")]
    Cancelled(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DicyError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DicyError::Cancelled(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DicyError>;
