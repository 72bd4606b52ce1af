//! Error types for pillbox-storage

use std::path::{Path, PathBuf};

use pillbox_core::CodecError;
use thiserror::Error;

/// Errors that can occur in run log operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing a log
    #[error("I/O error: {0}")]
    Io(String),

    /// A run directory or segment does not exist
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A segment with the generated name already exists
    #[error("Segment already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A record could not be framed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Write attempted after the writer released its file
    #[error("Writer is closed")]
    WriterClosed,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Wrap an I/O error with the path it happened on
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            _ => Self::Io(format!("{}: {}", path.display(), err)),
        }
    }

    /// Whether this error means the path is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
