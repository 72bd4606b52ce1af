//! Debugger log fixture
//!
//! Writes two runs of `DebugNumericSummary` records: run `"."` at the log
//! root (4 records over steps 2, 7, 7, 8) and run `"run_foo"` (1 record at
//! step 42).

use std::path::{Path, PathBuf};

use pillbox_core::{DataType, EventRecord};
use pillbox_storage::{RunLogConfig, StorageError, write_run};
use tracing::info;

pub const DEBUGGER_DEVICE: &str = "/job:localhost/replica:0/task:0/cpu:0";

/// A run written by [`seed_debugger_logdir`]
#[derive(Debug, Clone, PartialEq)]
pub struct SeededRun {
    pub name: String,
    pub path: PathBuf,
    pub records: u64,
}

/// Health pill values: statistics 0..12, then dtype enum and `rank, dims...`
pub fn health_pill_values(dtype: DataType, rank_and_dims: &[f64]) -> Vec<f64> {
    (0..12)
        .map(f64::from)
        .chain([f64::from(dtype.as_enum())])
        .chain(rank_and_dims.iter().copied())
        .collect()
}

fn summary(op: &str, slot: u32, wall_time: f64, step: i64, values: Vec<f64>) -> EventRecord {
    EventRecord::debug_numeric_summary(DEBUGGER_DEVICE, op, slot, wall_time, step, values)
}

/// Records of each fixture run, keyed by run name
pub fn fixture_runs() -> Vec<(&'static str, Vec<EventRecord>)> {
    use DataType::{Float32, Float64, Int16, Int32};
    let pill = health_pill_values;
    vec![
        (
            ".",
            vec![
                summary("layers/Matmul", 0, 42.0, 2, pill(Float32, &[1.0, 3.0])),
                summary("layers/Matmul", 1, 43.0, 7, pill(Float64, &[2.0, 3.0, 3.0])),
                summary("logits/Add", 0, 1337.0, 7, pill(Int32, &[2.0, 3.0, 3.0])),
                summary("logits/Add", 0, 1338.0, 8, pill(Int16, &[0.0])),
            ],
        ),
        (
            "run_foo",
            vec![summary("layers/Variable", 0, 4242.0, 42, pill(Int16, &[1.0, 8.0]))],
        ),
    ]
}

/// Write the fixture runs under `logdir`
pub fn seed_debugger_logdir(
    logdir: impl AsRef<Path>,
    config: &RunLogConfig,
) -> Result<Vec<SeededRun>, StorageError> {
    let logdir = logdir.as_ref();
    let mut seeded = Vec::new();

    for (name, records) in fixture_runs() {
        let path = match name {
            "." => logdir.to_path_buf(),
            _ => logdir.join(name),
        };
        let stats = write_run(&path, config, &records)?;
        seeded.push(SeededRun {
            name: name.to_string(),
            path,
            records: stats.records_written,
        });
    }

    info!(logdir = %logdir.display(), runs = seeded.len(), "Seeded debugger logdir");
    Ok(seeded)
}
