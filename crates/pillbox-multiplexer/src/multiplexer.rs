//! Run multiplexer
//!
//! Tracks a set of named run logs and a derived [`IndexSnapshot`] over them.
//! `reload` scans every run from its last cursor without holding any lock
//! that queries need, builds a new snapshot, and publishes it in one swap.
//! Queries clone the current `Arc` and never observe a half-applied reload.
//! Runs with nothing new keep sharing their index with the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use pillbox_core::EventRecord;
use pillbox_storage::{RunCursor, StorageError, TailReport, scan_run};
use tracing::{debug, info, instrument, warn};

use crate::config::MultiplexerConfig;
use crate::discovery::discover_runs;
use crate::error::MultiplexerError;
use crate::index::{IndexSnapshot, IndexedValue, RunIndex, RunState};

/// Where a run lives and how far it has been read
#[derive(Debug, Clone)]
struct RunSource {
    path: PathBuf,
    cursor: RunCursor,
    /// Bumped whenever the path changes
    generation: u64,
    /// Drop the run's indexed values before applying the next scan
    reset_pending: bool,
}

/// What a reload did for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReloadStats {
    pub run: String,
    pub new_records: usize,
    /// The run was rebuilt from scratch (path changed or log truncated)
    pub rebuilt: bool,
    /// The run directory does not exist yet
    pub missing: bool,
    /// Bad tails left for the next reload
    pub tails: Vec<TailReport>,
}

/// Summary of a reload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReloadReport {
    pub runs: Vec<RunReloadStats>,
}

impl ReloadReport {
    pub fn new_records(&self) -> usize {
        self.runs.iter().map(|r| r.new_records).sum()
    }
}

/// Scan result for one run, applied when the snapshot is published
struct PendingRun {
    run: String,
    generation: u64,
    records: Vec<EventRecord>,
    cursor: RunCursor,
    rebuild: bool,
    missing: bool,
    tails: Vec<TailReport>,
}

/// Aggregates named run logs and answers queries over their values
pub struct Multiplexer {
    config: MultiplexerConfig,
    sources: Mutex<BTreeMap<String, RunSource>>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    /// Serializes reloads; there is one logical indexer
    reload_lock: tokio::sync::Mutex<()>,
    /// Reloads that have started scanning, bumped under `reload_lock`
    reloads_started: AtomicU64,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(MultiplexerConfig::default())
    }
}

impl Multiplexer {
    pub fn new(config: MultiplexerConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(BTreeMap::new()),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            reload_lock: tokio::sync::Mutex::new(()),
            reloads_started: AtomicU64::new(0),
        }
    }

    /// Create a multiplexer with an initial run -> path mapping
    pub fn with_runs<I, N, P>(config: MultiplexerConfig, runs: I) -> Self
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: Into<PathBuf>,
    {
        let mux = Self::new(config);
        for (name, path) in runs {
            mux.register(name, path);
        }
        mux
    }

    pub fn config(&self) -> &MultiplexerConfig {
        &self.config
    }

    /// Add a run, or point an existing run at a new path
    ///
    /// Nothing is read until the next [`Self::reload`]. Re-registering the
    /// same path is a no-op; a different path makes the next reload rebuild
    /// the run from the new location.
    pub fn register(&self, run: impl Into<String>, path: impl Into<PathBuf>) {
        let run = run.into();
        let path = path.into();

        {
            let mut sources = self.sources.lock();
            match sources.get_mut(&run) {
                Some(source) if source.path == path => return,
                Some(source) => {
                    info!(
                        run = %run,
                        from = %source.path.display(),
                        to = %path.display(),
                        "Run path replaced"
                    );
                    source.path = path;
                    source.cursor = RunCursor::new();
                    source.generation += 1;
                    source.reset_pending = true;
                }
                None => {
                    debug!(run = %run, path = %path.display(), "Registered run");
                    sources.insert(
                        run.clone(),
                        RunSource {
                            path,
                            cursor: RunCursor::new(),
                            generation: 0,
                            reset_pending: false,
                        },
                    );
                }
            }
        }

        let mut snapshot = self.snapshot.write();
        if !snapshot.runs.contains_key(&run) {
            Arc::make_mut(&mut *snapshot)
                .runs
                .insert(run, Arc::new(RunIndex::default()));
        }
    }

    /// Register every run found under `root`
    ///
    /// Returns the names of the discovered runs. A missing root registers
    /// nothing.
    #[instrument(skip(self, root), fields(root = %root.as_ref().display()))]
    pub async fn add_runs_from_directory(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<Vec<String>, MultiplexerError> {
        let runs = discover_runs(root.as_ref(), &self.config.run_log)
            .await
            .map_err(MultiplexerError::Discovery)?;
        let names: Vec<String> = runs.iter().map(|(name, _)| name.clone()).collect();
        for (name, path) in runs {
            self.register(name, path);
        }
        info!(runs = names.len(), "Discovered runs");
        Ok(names)
    }

    /// Index everything appended to every registered run since the last reload
    ///
    /// Runs whose directory does not exist yet are treated as empty. If a run
    /// fails to read, the other runs are still applied and the first failure
    /// is returned; the failed run is retried from the same cursor next time.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<ReloadReport, MultiplexerError> {
        let _reload_guard = self.reload_lock.lock().await;
        self.reload_locked().await
    }

    /// Reload unless a reload that started after this call has already run
    ///
    /// Callers queued behind an in-flight reload share the one reload that
    /// runs after it, instead of each scanning every run again. Returns
    /// `None` when this call was satisfied by another caller's reload.
    #[instrument(skip(self))]
    pub async fn reload_coalesced(&self) -> Result<Option<ReloadReport>, MultiplexerError> {
        let ticket = self.reloads_started.load(Ordering::Acquire);
        let _reload_guard = self.reload_lock.lock().await;
        if self.reloads_started.load(Ordering::Acquire) > ticket {
            debug!("Reload already ran since request, skipping");
            return Ok(None);
        }
        self.reload_locked().await.map(Some)
    }

    /// Body of a reload; the caller holds `reload_lock`
    async fn reload_locked(&self) -> Result<ReloadReport, MultiplexerError> {
        self.reloads_started.fetch_add(1, Ordering::AcqRel);

        let plan: Vec<(String, RunSource)> = self
            .sources
            .lock()
            .iter()
            .map(|(name, source)| (name.clone(), source.clone()))
            .collect();

        let mut pending = Vec::with_capacity(plan.len());
        let mut first_error = None;
        for (run, source) in plan {
            match self.scan_source(&run, &source).await {
                Ok(result) => pending.push(result),
                Err(e) => {
                    warn!(run = %run, error = %e, "Run reload failed");
                    if first_error.is_none() {
                        first_error = Some(MultiplexerError::Reload { run, source: e });
                    }
                }
            }
        }

        let report = self.publish(pending);
        info!(
            runs = report.runs.len(),
            new_records = report.new_records(),
            "Reload complete"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn scan_source(&self, run: &str, source: &RunSource) -> Result<PendingRun, StorageError> {
        let config = &self.config.run_log;
        let mut rebuild = source.reset_pending;

        let scan = match scan_run(&source.path, &source.cursor, config).await {
            Ok(scan) if scan.truncated => {
                warn!(
                    run = %run,
                    path = %source.path.display(),
                    "Run log truncated, rebuilding"
                );
                rebuild = true;
                scan_run(&source.path, &RunCursor::new(), config).await?
            }
            Ok(scan) => scan,
            Err(e) if e.is_not_found() => {
                debug!(
                    run = %run,
                    path = %source.path.display(),
                    "Run path missing, treating as empty"
                );
                return Ok(PendingRun {
                    run: run.to_string(),
                    generation: source.generation,
                    records: Vec::new(),
                    cursor: source.cursor.clone(),
                    rebuild,
                    missing: true,
                    tails: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };

        debug!(
            run = %run,
            records = scan.records.len(),
            segments = scan.cursor.segment_count(),
            bytes_read = scan.cursor.total_offset(),
            "Scanned run"
        );
        Ok(PendingRun {
            run: run.to_string(),
            generation: source.generation,
            records: scan.records,
            cursor: scan.cursor,
            rebuild,
            missing: false,
            tails: scan.tails,
        })
    }

    /// Apply scan results to a copy of the index and swap it in
    fn publish(&self, pending: Vec<PendingRun>) -> ReloadReport {
        let mut report = ReloadReport::default();
        let mut next = (**self.snapshot.read()).clone();
        let mut applied = Vec::with_capacity(pending.len());

        {
            let sources = self.sources.lock();
            for run in pending {
                // Skip runs re-registered while we were scanning
                let current = sources.get(&run.run).map(|s| s.generation);
                if current != Some(run.generation) {
                    debug!(run = %run.run, "Run changed during reload, deferring");
                    continue;
                }

                let entry = next.runs.entry(run.run.clone()).or_default();
                let unchanged = run.records.is_empty()
                    && !run.rebuild
                    && entry.state() != RunState::Registered;
                if !unchanged {
                    let index = Arc::make_mut(entry);
                    if run.rebuild {
                        *index = RunIndex::default();
                    }
                    for record in &run.records {
                        index.insert(record);
                    }
                    index.mark_reloaded();
                }

                report.runs.push(RunReloadStats {
                    run: run.run.clone(),
                    new_records: run.records.len(),
                    rebuilt: run.rebuild,
                    missing: run.missing,
                    tails: run.tails,
                });
                applied.push((run.run, run.generation, run.cursor));
            }
        }

        {
            let mut sources = self.sources.lock();
            let mut snapshot = self.snapshot.write();
            // Keep runs registered since `next` was copied
            for (name, index) in &snapshot.runs {
                next.runs
                    .entry(name.clone())
                    .or_insert_with(|| index.clone());
            }
            *snapshot = Arc::new(next);

            for (run, generation, cursor) in applied {
                if let Some(source) = sources.get_mut(&run)
                    && source.generation == generation
                {
                    source.cursor = cursor;
                    source.reset_pending = false;
                }
            }
        }

        report
    }

    /// Current point-in-time view of the index
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().clone()
    }

    /// Names of all registered runs
    pub fn list_runs(&self) -> BTreeSet<String> {
        self.snapshot().run_names().map(str::to_string).collect()
    }

    /// Tags indexed for `run`
    pub fn list_tags(&self, run: &str) -> Result<BTreeSet<String>, MultiplexerError> {
        let snapshot = self.snapshot();
        let index = snapshot
            .run(run)
            .ok_or_else(|| MultiplexerError::unknown_run(run))?;
        Ok(index.tags().map(str::to_string).collect())
    }

    /// Values of `tag` in `run`, ordered by step, then wall time, then arrival
    pub fn get_values(&self, run: &str, tag: &str) -> Result<Vec<IndexedValue>, MultiplexerError> {
        let snapshot = self.snapshot();
        let index = snapshot
            .run(run)
            .ok_or_else(|| MultiplexerError::unknown_run(run))?;
        let series = index
            .series(tag)
            .ok_or_else(|| MultiplexerError::unknown_tag(run, tag))?;
        Ok(series.values().to_vec())
    }

    pub fn run_state(&self, run: &str) -> Result<RunState, MultiplexerError> {
        self.snapshot()
            .run(run)
            .map(RunIndex::state)
            .ok_or_else(|| MultiplexerError::unknown_run(run))
    }

    /// Source path of a registered run
    pub fn run_path(&self, run: &str) -> Option<PathBuf> {
        self.sources.lock().get(run).map(|s| s.path.clone())
    }

    /// Run -> tag -> latest content for every tag written by `plugin_name`
    ///
    /// Runs without such tags map to an empty table.
    pub fn plugin_run_to_tag_to_content(
        &self,
        plugin_name: &str,
    ) -> BTreeMap<String, BTreeMap<String, Bytes>> {
        let snapshot = self.snapshot();
        snapshot
            .runs
            .iter()
            .map(|(name, index)| {
                let tags = index.plugin_tags(plugin_name).cloned().unwrap_or_default();
                (name.clone(), tags)
            })
            .collect()
    }
}
