//! Lazy sequential reader over a whole run

use std::path::{Path, PathBuf};

use pillbox_core::EventRecord;
use tracing::{debug, instrument};

use super::RunLogConfig;
use super::segment::{FrameRead, FrameReader, TailReport, list_segments};
use crate::error::StorageError;

/// Reads every record of a run in write order, one segment after another
///
/// The segment list is fixed when the reader is opened. A bad tail ends the
/// current segment and is recorded in [`RunLogReader::tail_reports`]; it is
/// never returned as an error. [`RunLogReader::rewind`] restarts the sequence.
pub struct RunLogReader {
    run_path: PathBuf,
    segments: Vec<PathBuf>,
    next_segment: usize,
    current: Option<FrameReader>,
    max_frame_len: usize,
    tails: Vec<TailReport>,
}

impl RunLogReader {
    /// Open a run for reading
    ///
    /// Fails with [`StorageError::NotFound`] if `run_path` does not exist.
    #[instrument(skip_all, fields(run_path = %run_path.as_ref().display()))]
    pub async fn open_for_read(
        run_path: impl AsRef<Path>,
        config: &RunLogConfig,
    ) -> Result<Self, StorageError> {
        let run_path = run_path.as_ref().to_path_buf();
        let segments = list_segments(&run_path, config).await?;
        debug!(segments = segments.len(), "Opened run log for read");

        Ok(Self {
            run_path,
            segments,
            next_segment: 0,
            current: None,
            max_frame_len: config.max_frame_len,
            tails: Vec::new(),
        })
    }

    /// Next record, or `None` once every segment is exhausted
    pub async fn next_record(&mut self) -> Result<Option<EventRecord>, StorageError> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.segments.get(self.next_segment) else {
                    return Ok(None);
                };
                self.next_segment += 1;
                self.current = Some(FrameReader::open(path, 0, self.max_frame_len).await?);
            }

            let Some(reader) = self.current.as_mut() else {
                continue;
            };
            match reader.next_frame().await? {
                FrameRead::Record(record) => return Ok(Some(record)),
                FrameRead::End => {
                    debug!(segment = %reader.path().display(), "Segment exhausted");
                    self.current = None;
                }
                FrameRead::Tail(error) => {
                    self.tails.push(reader.tail_report(error));
                    self.current = None;
                }
            }
        }
    }

    /// Drain the remaining records
    pub async fn read_all(&mut self) -> Result<Vec<EventRecord>, StorageError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Start over from the first segment
    pub fn rewind(&mut self) {
        self.next_segment = 0;
        self.current = None;
        self.tails.clear();
    }

    /// Bad tails met so far
    pub fn tail_reports(&self) -> &[TailReport] {
        &self.tails
    }

    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    pub fn run_path(&self) -> &Path {
        &self.run_path
    }
}
