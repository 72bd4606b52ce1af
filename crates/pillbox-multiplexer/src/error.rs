//! Error types for pillbox-multiplexer

use pillbox_storage::StorageError;
use thiserror::Error;

/// Errors returned by multiplexer queries and reloads
#[derive(Debug, Error)]
pub enum MultiplexerError {
    /// The run was never registered
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// The run exists but has no values under this tag
    #[error("Unknown tag {tag:?} in run {run:?}")]
    UnknownTag { run: String, tag: String },

    /// Reading a run's log failed
    #[error("Failed to reload run {run:?}: {source}")]
    Reload {
        run: String,
        #[source]
        source: StorageError,
    },

    /// Walking a log directory for runs failed
    #[error("Run discovery failed: {0}")]
    Discovery(#[source] StorageError),
}

impl MultiplexerError {
    pub fn unknown_run(run: impl Into<String>) -> Self {
        Self::UnknownRun(run.into())
    }

    pub fn unknown_tag(run: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::UnknownTag {
            run: run.into(),
            tag: tag.into(),
        }
    }
}
