//! Tracking backend error types.

use std::io;

/// Tracking backend errors.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Local store error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transport error talking to the Hub or a Space.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// Missing or rejected Hub token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Run already exists and resuming was not allowed.
    #[error("run '{run}' already exists in project '{project}'")]
    RunExists { project: String, run: String },

    /// Run must exist to be resumed.
    #[error("run '{run}' not found in project '{project}'")]
    RunNotFound { project: String, run: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tracking operations.
pub type TrackingResult<T> = std::result::Result<T, TrackingError>;
