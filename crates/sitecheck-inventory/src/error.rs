//! Inventory error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors that can occur while fetching the managed site list.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to run {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exited with {status}: {stderr}")]
    CommandFailed {
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
