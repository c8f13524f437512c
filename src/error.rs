//! Error types for the release watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors (state file, version record, release log, manifests)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Release lock is held by another process: {0}")]
    LockBusy(PathBuf),
}

impl StorageError {
    /// Wrap an I/O failure with the operation and path that produced it.
    pub(crate) fn io_at(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            err.kind(),
            format!("Failed to {} {}: {}", action, path.display(), err),
        ))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Top-level errors surfaced by the engine, watcher and CLI
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watch root does not exist or is not a directory: {0}")]
    RootMissing(PathBuf),

    #[error("Freeze calendar {path} is unreadable: {reason}")]
    FreezeSourceUnreadable { path: PathBuf, reason: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Release could not be persisted: {0}")]
    PersistFailed(String),
}

impl ReleaseError {
    /// True when the error leaves the pending change-set intact for a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReleaseError::StorageError(_) | ReleaseError::PersistFailed(_)
        )
    }
}

impl From<config::ConfigError> for ReleaseError {
    fn from(err: config::ConfigError) -> Self {
        ReleaseError::ConfigError(err.to_string())
    }
}
