use crate::tracking::TrackingError;
use std::path::PathBuf;
use thiserror::Error;

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("no '{column}' column in {file}")]
    MissingColumn { file: String, column: &'static str },

    #[error("invalid record at line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReplayError {
    /// Whether this error means the file was skipped rather than failed.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::MissingFile(_) | Self::MissingColumn { .. })
    }
}
