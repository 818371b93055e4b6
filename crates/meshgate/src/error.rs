//! Error types for the meshgate facade.

use std::path::PathBuf;

use meshgate_config::ConfigError;
use meshgate_rbac::{DocumentError, SnapshotError};
use thiserror::Error;

/// Result type for meshgate operations.
pub type Result<T> = std::result::Result<T, MeshgateError>;

/// Errors raised while loading policy or serving decisions.
#[derive(Debug, Error)]
pub enum MeshgateError {
    /// The policy document could not be read.
    #[error("Failed to read policy document at {path}: {source}")]
    PolicyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy document could not be parsed or was rejected at admission.
    #[error("Invalid policy document at {path}: {source}")]
    PolicyInvalid {
        path: PathBuf,
        source: DocumentError,
    },

    /// A document published directly was rejected.
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Layered settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] anyhow::Error),
}
