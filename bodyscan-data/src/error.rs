//! Error types for reading and writing scan data.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::skeleton::FormatIssue;

/// Errors that can occur while loading or storing scan data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed content from an in-memory reader; carries no path yet.
    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Malformed file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("Unsupported PCD encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Skeleton schema violation: {0}")]
    Schema(#[from] FormatIssue),
}

impl DataError {
    /// Attach the file path to reader-level errors.
    pub fn at_path(self, path: &Path) -> Self {
        match self {
            DataError::Malformed(reason) => DataError::Format {
                path: path.to_path_buf(),
                reason,
            },
            DataError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => DataError::NotFound {
                path: path.to_path_buf(),
            },
            other => other,
        }
    }
}

/// Open a file for reading, reporting a missing file as [`DataError::NotFound`].
pub(crate) fn open(path: &Path) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|e| DataError::from(e).at_path(path))
}
