//! Append-only run logs
//!
//! A run is a directory holding one or more segment files. Each segment is
//! written once, by one producer, and is a plain sequence of codec frames:
//! ```text
//! [4 bytes: len][len bytes: postcard record][4 bytes: checksum][4 bytes: len][...]
//! ```
//!
//! Readers never fail on the tail of a segment: a frame that is only partly
//! flushed, or whose checksum does not match, ends that segment's stream and
//! is picked up again on the next scan from the same offset.

mod cursor;
mod reader;
mod segment;
mod writer;

use serde::{Deserialize, Serialize};

pub use cursor::{RunCursor, RunScan, scan_run};
pub use reader::RunLogReader;
pub use segment::{TailReport, list_segments};
pub use writer::{RunLogWriter, WriterStats, write_run};

/// Configuration shared by run log writers and readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLogConfig {
    /// Segment file names start with this prefix
    pub file_prefix: String,
    /// Largest payload a writer will produce and a reader will accept
    pub max_frame_len: usize,
    /// Whether `close` syncs the segment to disk
    pub sync_on_close: bool,
    /// Writer buffer capacity in bytes
    pub write_buffer_size: usize,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            file_prefix: "events.debugger".to_string(),
            max_frame_len: pillbox_core::MAX_FRAME_LEN,
            sync_on_close: true,
            write_buffer_size: 64 * 1024,
        }
    }
}

impl RunLogConfig {
    /// Whether `file_name` looks like a segment of this log
    pub fn is_segment_name(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.file_prefix)
    }
}
