//! # Pillbox Storage
//!
//! Append-only run log storage.
//!
//! Each run is a directory of segment files written by a single producer. This
//! crate provides the producer-side writer and two read paths: a lazy reader
//! that walks a whole run once, and an incremental scan that resumes from a
//! [`RunCursor`] and is what the multiplexer uses on reload.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pillbox_core::{EventRecord, TensorPayload};
//! use pillbox_storage::{RunLogConfig, RunLogReader, RunLogWriter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RunLogConfig::default();
//!
//!     let mut writer = RunLogWriter::open_for_write("/tmp/logs/run_a", &config).unwrap();
//!     writer
//!         .append(&EventRecord::new(1, 0.0, "loss", "loss:0", TensorPayload::vector(vec![0.3])))
//!         .unwrap();
//!     writer.close().unwrap();
//!
//!     let mut reader = RunLogReader::open_for_read("/tmp/logs/run_a", &config).await.unwrap();
//!     while let Some(record) = reader.next_record().await.unwrap() {
//!         println!("{} @ {}", record.tag, record.step);
//!     }
//! }
//! ```

pub mod error;
pub mod run_log;

// Re-exports
pub use error::StorageError;
pub use run_log::{
    RunCursor, RunLogConfig, RunLogReader, RunLogWriter, RunScan, TailReport, WriterStats,
    list_segments, scan_run, write_run,
};
