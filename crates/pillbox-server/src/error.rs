//! Error types for pillbox-server

use pillbox_multiplexer::MultiplexerError;
use thiserror::Error;

/// Errors returned to query callers
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    #[error("Unknown tag {tag:?} in run {run:?}")]
    UnknownTag { run: String, tag: String },

    #[error("Invalid step range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    /// Refreshing the index failed before the lookup could be answered
    #[error("Reload failed: {0}")]
    Reload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<MultiplexerError> for QueryError {
    fn from(err: MultiplexerError) -> Self {
        match err {
            MultiplexerError::UnknownRun(run) => Self::UnknownRun(run),
            MultiplexerError::UnknownTag { run, tag } => Self::UnknownTag { run, tag },
            other => Self::Reload(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
