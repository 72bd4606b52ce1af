//! Error types for Pillbox core

use thiserror::Error;

/// A frame could not be encoded or decoded
///
/// Raised for truncated or corrupt frames. The storage layer absorbs these at
/// the tail of a log; they are only surfaced by the direct [`crate::codec`]
/// entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Frame length {len} exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Frame has zero length")]
    EmptyFrame,

    #[error("Frame checksum mismatch")]
    ChecksumMismatch,

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Failed to encode record: {0}")]
    Encode(String),
}

impl CodecError {
    /// Whether more bytes could turn this into a valid frame
    ///
    /// A partially flushed record looks exactly like this; a reader should
    /// stop and retry from the same offset later.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

impl From<postcard::Error> for CodecError {
    fn from(err: postcard::Error) -> Self {
        CodecError::Payload(err.to_string())
    }
}
