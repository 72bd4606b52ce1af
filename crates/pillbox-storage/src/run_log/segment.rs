//! Segment discovery and frame-at-a-time reading

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use pillbox_core::codec::{self, FRAME_HEADER_LEN, FRAME_TRAILER_LEN};
use pillbox_core::{CodecError, EventRecord};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, warn};

use super::RunLogConfig;
use crate::error::StorageError;

/// An undecodable tail that ended a segment's stream
#[derive(Debug, Clone, PartialEq)]
pub struct TailReport {
    pub segment: PathBuf,
    /// Offset of the first byte that could not be decoded
    pub offset: u64,
    pub error: CodecError,
}

impl TailReport {
    /// A partly flushed frame, as opposed to corrupt bytes
    pub fn is_incomplete(&self) -> bool {
        self.error.is_incomplete()
    }
}

/// List the segments of a run, oldest first
///
/// `run_path` may be a run directory or a single segment file. Fails with
/// [`StorageError::NotFound`] if it does not exist.
pub async fn list_segments(
    run_path: &Path,
    config: &RunLogConfig,
) -> Result<Vec<PathBuf>, StorageError> {
    let metadata = tokio::fs::metadata(run_path)
        .await
        .map_err(|e| StorageError::io_at(run_path, e))?;
    if metadata.is_file() {
        return Ok(vec![run_path.to_path_buf()]);
    }

    let mut entries = tokio::fs::read_dir(run_path)
        .await
        .map_err(|e| StorageError::io_at(run_path, e))?;
    let mut segments = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io_at(run_path, e))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && config.is_segment_name(&entry.file_name().to_string_lossy()) {
            segments.push(entry.path());
        }
    }
    segments.sort();
    Ok(segments)
}

/// Result of reading one frame
#[derive(Debug)]
pub(crate) enum FrameRead {
    Record(EventRecord),
    /// Clean end: no bytes left after the last frame
    End,
    /// Bytes remain that do not form a valid frame
    Tail(CodecError),
}

/// Reads frames from a segment, tracking the offset after the last good one
pub(crate) struct FrameReader {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    max_frame_len: usize,
}

impl FrameReader {
    /// Open `path` positioned at `offset`
    pub(crate) async fn open(
        path: &Path,
        offset: u64,
        max_frame_len: usize,
    ) -> Result<Self, StorageError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::io_at(path, e))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| StorageError::io_at(path, e))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset,
            max_frame_len,
        })
    }

    /// Offset just past the last fully decoded frame
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next frame
    ///
    /// After a [`FrameRead::Tail`] the reader must not be used again; the
    /// offset still points at the start of the bad frame.
    pub(crate) async fn next_frame(&mut self) -> Result<FrameRead, StorageError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let got = read_fully(&mut self.reader, &mut header)
            .await
            .map_err(|e| StorageError::io_at(&self.path, e))?;
        if got == 0 {
            return Ok(FrameRead::End);
        }
        if got < FRAME_HEADER_LEN {
            return Ok(FrameRead::Tail(CodecError::Truncated {
                needed: FRAME_HEADER_LEN,
                available: got,
            }));
        }

        let len = match codec::payload_len(header, self.max_frame_len) {
            Ok(len) => len,
            Err(e) => return Ok(FrameRead::Tail(e)),
        };

        let mut body = vec![0u8; len + FRAME_TRAILER_LEN];
        let got = read_fully(&mut self.reader, &mut body)
            .await
            .map_err(|e| StorageError::io_at(&self.path, e))?;
        if got < body.len() {
            return Ok(FrameRead::Tail(CodecError::Truncated {
                needed: FRAME_HEADER_LEN + body.len(),
                available: FRAME_HEADER_LEN + got,
            }));
        }

        let mut trailer = [0u8; FRAME_TRAILER_LEN];
        trailer.copy_from_slice(&body[len..]);
        match codec::decode_payload(&body[..len], trailer) {
            Ok(record) => {
                self.offset += (FRAME_HEADER_LEN + body.len()) as u64;
                Ok(FrameRead::Record(record))
            }
            Err(e) => Ok(FrameRead::Tail(e)),
        }
    }

    /// Turn a tail error into a report, logging it at the right level
    pub(crate) fn tail_report(&self, error: CodecError) -> TailReport {
        if error.is_incomplete() {
            debug!(
                path = %self.path.display(),
                offset = self.offset,
                error = %error,
                "Partial record at segment tail, stopping"
            );
        } else {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                error = %error,
                "Corrupt record at segment tail, stopping"
            );
        }
        TailReport {
            segment: self.path.clone(),
            offset: self.offset,
            error,
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
async fn read_fully<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
