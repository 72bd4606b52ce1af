//! Segment writer
//!
//! Producers are usually synchronous training loops, so the writer uses
//! blocking I/O. Records are buffered; they become visible to readers once
//! the buffer is flushed, either explicitly or by `close`/drop.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pillbox_core::{EventRecord, codec};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::RunLogConfig;
use crate::error::StorageError;

/// Counters reported when a writer is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterStats {
    pub records_written: u64,
    pub bytes_written: u64,
}

/// Exclusive append stream over one new segment of a run
///
/// Dropping the writer flushes whatever is still buffered; use
/// [`RunLogWriter::close`] to observe flush and sync errors.
pub struct RunLogWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    max_frame_len: usize,
    sync_on_close: bool,
    stats: WriterStats,
}

impl RunLogWriter {
    /// Create a fresh segment in `run_dir`, creating the directory if needed
    #[instrument(skip_all, fields(run_dir = %run_dir.as_ref().display()))]
    pub fn open_for_write(
        run_dir: impl AsRef<Path>,
        config: &RunLogConfig,
    ) -> Result<Self, StorageError> {
        let run_dir = run_dir.as_ref();
        std::fs::create_dir_all(run_dir).map_err(|e| StorageError::io_at(run_dir, e))?;

        let path = run_dir.join(segment_file_name(&config.file_prefix));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::io_at(&path, e))?;

        info!(path = %path.display(), "Opened run log segment for write");

        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(config.write_buffer_size, file)),
            max_frame_len: config.max_frame_len,
            sync_on_close: config.sync_on_close,
            stats: WriterStats::default(),
        })
    }

    /// Append one record
    ///
    /// Returns the offset of the record's frame within the segment. The record
    /// is not guaranteed to reach the file until [`Self::flush`] or
    /// [`Self::close`]. Records larger than the configured frame limit are
    /// rejected without touching the segment.
    pub fn append(&mut self, record: &EventRecord) -> Result<u64, StorageError> {
        let frame = codec::encode_with_limit(record, self.max_frame_len)?;
        let writer = self.writer.as_mut().ok_or(StorageError::WriterClosed)?;
        writer
            .write_all(&frame)
            .map_err(|e| StorageError::io_at(&self.path, e))?;

        let offset = self.stats.bytes_written;
        self.stats.records_written += 1;
        self.stats.bytes_written += frame.len() as u64;

        debug!(step = record.step, tag = %record.tag, offset, "Appended record");
        Ok(offset)
    }

    /// Push buffered records to the file so concurrent readers can see them
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let writer = self.writer.as_mut().ok_or(StorageError::WriterClosed)?;
        writer.flush().map_err(|e| StorageError::io_at(&self.path, e))
    }

    /// Flush, optionally sync, and release the segment
    pub fn close(mut self) -> Result<WriterStats, StorageError> {
        let writer = self.writer.take().ok_or(StorageError::WriterClosed)?;
        let file = writer
            .into_inner()
            .map_err(|e| StorageError::io_at(&self.path, e.into_error()))?;
        if self.sync_on_close {
            file.sync_all().map_err(|e| StorageError::io_at(&self.path, e))?;
        }

        info!(
            path = %self.path.display(),
            records = self.stats.records_written,
            bytes = self.stats.bytes_written,
            "Closed run log segment"
        );
        Ok(self.stats)
    }

    /// Path of the segment being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }
}

impl Drop for RunLogWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.into_inner()
        {
            warn!(
                path = %self.path.display(),
                error = %e.error(),
                "Failed to flush run log on drop"
            );
        }
    }
}

/// Write `records` to a new segment of `run_dir` and close it
pub fn write_run<'a>(
    run_dir: impl AsRef<Path>,
    config: &RunLogConfig,
    records: impl IntoIterator<Item = &'a EventRecord>,
) -> Result<WriterStats, StorageError> {
    let mut writer = RunLogWriter::open_for_write(run_dir, config)?;
    for record in records {
        writer.append(record)?;
    }
    writer.close()
}

/// `<prefix>.<micros>.<uuid>`; zero-padded micros keep lexical order chronological
fn segment_file_name(prefix: &str) -> String {
    let micros = chrono::Utc::now().timestamp_micros().max(0);
    format!("{}.{:020}.{}", prefix, micros, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_log::RunLogReader;
    use pillbox_core::{CodecError, TensorPayload};
    use tempfile::TempDir;

    fn record(step: i64) -> EventRecord {
        EventRecord::new(step, step as f64, "t", "n", TensorPayload::vector(vec![step as f64]))
    }

    #[test]
    fn test_open_creates_run_directory() {
        let temp = TempDir::new().unwrap();
        let run_dir = temp.path().join("nested").join("run_a");
        let writer = RunLogWriter::open_for_write(&run_dir, &RunLogConfig::default()).unwrap();
        assert!(run_dir.is_dir());
        assert!(writer.path().starts_with(&run_dir));
        writer.close().unwrap();
    }

    #[test]
    fn test_append_reports_offsets() {
        let temp = TempDir::new().unwrap();
        let mut writer =
            RunLogWriter::open_for_write(temp.path(), &RunLogConfig::default()).unwrap();

        let first = writer.append(&record(1)).unwrap();
        let second = writer.append(&record(2)).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, codec::encode(&record(1)).unwrap().len() as u64);

        let stats = writer.close().unwrap();
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_records_invisible_until_flush() {
        let temp = TempDir::new().unwrap();
        let mut writer =
            RunLogWriter::open_for_write(temp.path(), &RunLogConfig::default()).unwrap();
        writer.append(&record(1)).unwrap();
        assert_eq!(std::fs::metadata(writer.path()).unwrap().len(), 0);

        writer.flush().unwrap();
        assert_eq!(
            std::fs::metadata(writer.path()).unwrap().len(),
            writer.stats().bytes_written
        );
    }

    #[test]
    fn test_drop_flushes_buffer() {
        let temp = TempDir::new().unwrap();
        let path = {
            let mut writer =
                RunLogWriter::open_for_write(temp.path(), &RunLogConfig::default()).unwrap();
            writer.append(&record(1)).unwrap();
            writer.path().to_path_buf()
        };
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        // A regular file where the run directory should be
        let result = RunLogWriter::open_for_write(blocker.join("run"), &RunLogConfig::default());
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn test_oversized_record_rejected_before_write() {
        let temp = TempDir::new().unwrap();
        let config = RunLogConfig {
            max_frame_len: 1024,
            ..Default::default()
        };
        let big = EventRecord::new(1, 1.0, "t", "n", TensorPayload::vector(vec![0.5; 512]));

        let mut writer = RunLogWriter::open_for_write(temp.path(), &config).unwrap();
        let err = writer.append(&big).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Codec(CodecError::FrameTooLarge { max: 1024, .. })
        ));
        assert_eq!(writer.stats(), WriterStats::default());

        writer.append(&record(2)).unwrap();
        writer.close().unwrap();

        let mut reader = RunLogReader::open_for_read(temp.path(), &config).await.unwrap();
        let records = reader.read_all().await.unwrap();
        assert_eq!(records, vec![record(2)]);
        assert!(reader.tail_reports().is_empty());
    }

    #[test]
    fn test_segment_names_sort_chronologically() {
        let a = segment_file_name("events.debugger");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = segment_file_name("events.debugger");
        assert!(a < b);
    }
}
