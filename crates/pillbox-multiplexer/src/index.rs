//! Derived index of run values
//!
//! The index is never authoritative: every piece of it can be rebuilt by
//! rescanning the run logs. Snapshots are immutable once published; reloads
//! copy the runs they touch and publish a new snapshot.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use pillbox_core::{EventRecord, ValueSummary};
use serde::{Deserialize, Serialize};

/// One indexed observation of a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedValue {
    pub step: i64,
    pub wall_time: f64,
    pub summary: ValueSummary,
}

impl IndexedValue {
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            step: record.step,
            wall_time: record.wall_time,
            summary: ValueSummary::from_record(record),
        }
    }

    /// Sort key: step, then wall time
    fn key_cmp(&self, step: i64, wall_time: f64) -> Ordering {
        self.step
            .cmp(&step)
            .then_with(|| self.wall_time.total_cmp(&wall_time))
    }
}

/// Values of one tag, kept ordered by (step, wall_time, insertion)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSeries {
    values: Vec<IndexedValue>,
}

impl TagSeries {
    /// Insert after every value with an equal or smaller key
    pub fn insert(&mut self, value: IndexedValue) {
        let pos = self
            .values
            .partition_point(|v| v.key_cmp(value.step, value.wall_time) != Ordering::Greater);
        self.values.insert(pos, value);
    }

    pub fn values(&self) -> &[IndexedValue] {
        &self.values
    }

    /// Values with `start <= step <= end`
    pub fn range(&self, start: Option<i64>, end: Option<i64>) -> &[IndexedValue] {
        let lo = match start {
            Some(s) => self.values.partition_point(|v| v.step < s),
            None => 0,
        };
        let hi = match end {
            Some(e) => self.values.partition_point(|v| v.step <= e),
            None => self.values.len(),
        };
        if lo >= hi { &[] } else { &self.values[lo..hi] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-run state as seen by queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Registered but never reloaded
    Registered,
    /// Reloaded, nothing indexed yet
    Empty,
    /// At least one record indexed
    Loaded,
}

/// Index of a single run
#[derive(Debug, Clone, Default)]
pub struct RunIndex {
    tags: BTreeMap<String, TagSeries>,
    /// plugin name -> tag -> latest plugin content
    plugin_content: BTreeMap<String, BTreeMap<String, Bytes>>,
    record_count: u64,
    reloaded: bool,
}

impl RunIndex {
    /// Index a decoded record under its tag
    pub fn insert(&mut self, record: &EventRecord) {
        self.tags
            .entry(record.tag.clone())
            .or_default()
            .insert(IndexedValue::from_record(record));

        if !record.metadata.plugin_name.is_empty() {
            self.plugin_content
                .entry(record.metadata.plugin_name.clone())
                .or_default()
                .insert(record.tag.clone(), record.metadata.plugin_content.clone());
        }
        self.record_count += 1;
    }

    pub(crate) fn mark_reloaded(&mut self) {
        self.reloaded = true;
    }

    pub fn state(&self) -> RunState {
        match (self.reloaded, self.record_count) {
            (false, _) => RunState::Registered,
            (true, 0) => RunState::Empty,
            (true, _) => RunState::Loaded,
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn series(&self, tag: &str) -> Option<&TagSeries> {
        self.tags.get(tag)
    }

    /// Tag -> content for every tag written by `plugin_name`
    pub fn plugin_tags(&self, plugin_name: &str) -> Option<&BTreeMap<String, Bytes>> {
        self.plugin_content.get(plugin_name)
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }
}

/// Point-in-time view of every run
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub(crate) runs: BTreeMap<String, Arc<RunIndex>>,
}

impl IndexSnapshot {
    pub fn run(&self, name: &str) -> Option<&RunIndex> {
        self.runs.get(name).map(Arc::as_ref)
    }

    pub fn run_names(&self) -> impl Iterator<Item = &str> {
        self.runs.keys().map(String::as_str)
    }

    /// Total records indexed across all runs
    pub fn record_count(&self) -> u64 {
        self.runs.values().map(|r| r.record_count).sum()
    }
}
