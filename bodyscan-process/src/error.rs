//! Error types for scan processing operations.

use bodyscan_data::{DataError, FormatIssue};
use std::path::PathBuf;
use thiserror::Error;

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors that can occur while processing a scan.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A spatial index was requested over zero points.
    #[error("point cloud is empty")]
    EmptyInput,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A neighbourhood is too small for the requested fit. Recoverable:
    /// the smoother degrades instead of failing.
    #[error("insufficient neighbors: need at least {required}, found {found}")]
    InsufficientNeighbors { required: usize, found: usize },

    #[error("failed to read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: DataError,
    },

    #[error("skeleton file {} is unavailable: {source}", path.display())]
    SkeletonUnavailable {
        path: PathBuf,
        #[source]
        source: DataError,
    },

    #[error("skeleton format error: {0}")]
    Format(#[from] FormatIssue),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: DataError,
    },
}
