//! Loader error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for loader operations
pub type LoaderResult<T> = std::result::Result<T, LoaderError>;

/// Loader-specific error types
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Bad file {}: {reason}", path.display())]
    BadFile { path: PathBuf, reason: String },

    #[error("{} isn't a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Not a directory or file: {}", .0.display())]
    UnknownPath(PathBuf),

    #[error("Store error: {0}")]
    Store(#[from] ontology_core::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl LoaderError {
    pub(crate) fn bad_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::BadFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
