//! Error types for ffwatch.
//!
//! `FfwatchError` covers the fallible plumbing inside the library (spawning,
//! channel I/O, configuration). Failures of a run are not returned as errors;
//! they are folded into a [`RunOutcome`](crate::RunOutcome) at the
//! `Transcoder::start` boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ffwatch library.
#[derive(Debug, Error)]
pub enum FfwatchError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid signal name: {0}")]
    InvalidSignal(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for ffwatch operations.
pub type Result<T> = std::result::Result<T, FfwatchError>;

impl FfwatchError {
    /// Create an IO error with a short description of what was being done.
    pub fn io(context: &str, err: std::io::Error) -> Self {
        FfwatchError::Io {
            message: format!("{context}: {err}"),
            source: err,
        }
    }
}
