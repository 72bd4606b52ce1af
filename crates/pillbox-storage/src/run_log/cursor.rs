//! Incremental scanning with per-segment read offsets

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use pillbox_core::EventRecord;
use tracing::{debug, instrument, warn};

use super::RunLogConfig;
use super::segment::{FrameRead, FrameReader, TailReport, list_segments};
use crate::error::StorageError;

/// How far each segment of a run has been consumed
///
/// Keyed by segment file name; the offset is always the end of the last
/// fully decoded frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCursor {
    offsets: BTreeMap<String, u64>,
}

impl RunCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumed bytes of `segment`
    pub fn offset(&self, segment: &str) -> u64 {
        self.offsets.get(segment).copied().unwrap_or(0)
    }

    /// Total consumed bytes across all segments
    pub fn total_offset(&self) -> u64 {
        self.offsets.values().sum()
    }

    pub fn segment_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Records appended since a cursor, plus the advanced cursor
#[derive(Debug, Clone, Default)]
pub struct RunScan {
    pub records: Vec<EventRecord>,
    /// Cursor to pass to the next scan
    pub cursor: RunCursor,
    /// Bad tails that stopped a segment; retried on the next scan
    pub tails: Vec<TailReport>,
    /// A segment is shorter than the cursor says, or has disappeared; nothing
    /// was read and the caller should rescan from an empty cursor
    pub truncated: bool,
}

/// Read everything appended to a run since `cursor`
///
/// The input cursor is not modified, so a failed or discarded scan can simply
/// be retried. Fails with [`StorageError::NotFound`] if the run path is absent.
#[instrument(skip_all, fields(run_path = %run_path.display()))]
pub async fn scan_run(
    run_path: &Path,
    cursor: &RunCursor,
    config: &RunLogConfig,
) -> Result<RunScan, StorageError> {
    let segments = list_segments(run_path, config).await?;

    // Check for truncation before consuming anything
    let listed: BTreeSet<String> = segments.iter().map(|p| segment_key(p)).collect();
    if let Some(gone) = cursor.offsets.keys().find(|name| !listed.contains(*name)) {
        warn!(segment = %gone, "Previously read segment is gone");
        return Ok(RunScan {
            cursor: cursor.clone(),
            truncated: true,
            ..Default::default()
        });
    }

    let mut sizes = Vec::with_capacity(segments.len());
    for path in &segments {
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::io_at(path, e))?
            .len();
        let name = segment_key(path);
        if len < cursor.offset(&name) {
            warn!(
                segment = %path.display(),
                len,
                offset = cursor.offset(&name),
                "Segment shrank below read offset"
            );
            return Ok(RunScan {
                cursor: cursor.clone(),
                truncated: true,
                ..Default::default()
            });
        }
        sizes.push((name, len));
    }

    let mut scan = RunScan {
        cursor: cursor.clone(),
        ..Default::default()
    };

    for (path, (name, len)) in segments.iter().zip(sizes) {
        let start = cursor.offset(&name);
        if len == start {
            scan.cursor.offsets.insert(name, start);
            continue;
        }

        let mut reader = FrameReader::open(path, start, config.max_frame_len).await?;
        loop {
            match reader.next_frame().await? {
                FrameRead::Record(record) => scan.records.push(record),
                FrameRead::End => break,
                FrameRead::Tail(error) => {
                    scan.tails.push(reader.tail_report(error));
                    break;
                }
            }
        }

        debug!(
            segment = %name,
            from = start,
            to = reader.offset(),
            "Scanned segment"
        );
        scan.cursor.offsets.insert(name, reader.offset());
    }

    Ok(scan)
}

fn segment_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
