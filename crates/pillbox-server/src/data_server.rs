//! Query server facade
//!
//! [`DataServer`] is the only query-facing contract. [`IndexDataServer`]
//! answers from the multiplexer's published snapshot; tests inject
//! [`FakeDataServer`](crate::FakeDataServer) instead.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pillbox_multiplexer::{Multiplexer, RunState};
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::QueryError;
use crate::health::{HealthPillEvent, collect_health_pills};
use crate::lookup::{LookupRequest, LookupResponse};

/// Answers value and health pill queries
#[async_trait]
pub trait DataServer: Send + Sync {
    /// Ordered values of one tag, optionally restricted to a step range
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, QueryError>;

    /// Node name -> health pills of the requested nodes
    async fn health_pills(
        &self,
        run: &str,
        node_names: &[String],
        step: Option<i64>,
    ) -> Result<BTreeMap<String, Vec<HealthPillEvent>>, QueryError>;
}

/// [`DataServer`] backed by a [`Multiplexer`]
pub struct IndexDataServer {
    mux: Arc<Multiplexer>,
    request_timeout: Duration,
    /// Searched for new runs before every refresh
    logdir: Option<PathBuf>,
}

impl IndexDataServer {
    pub fn new(mux: Arc<Multiplexer>, request_timeout: Duration) -> Self {
        Self {
            mux,
            request_timeout,
            logdir: None,
        }
    }

    /// Discover runs under `logdir` on every refresh
    pub fn with_logdir(mut self, logdir: impl Into<PathBuf>) -> Self {
        self.logdir = Some(logdir.into());
        self
    }

    /// Register the configured runs and every run found under the log directory
    ///
    /// Nothing is read until the first reload.
    pub async fn open(config: &ServerConfig) -> Result<Self, QueryError> {
        let mux = Multiplexer::with_runs(config.multiplexer.clone(), config.runs.clone());
        let discovered = mux.add_runs_from_directory(&config.logdir).await?;
        info!(
            logdir = %config.logdir.display(),
            configured = config.runs.len(),
            discovered = discovered.len(),
            "Opened data server"
        );
        Ok(Self::new(Arc::new(mux), config.request_timeout()).with_logdir(config.logdir.clone()))
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.mux
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Answer from the current snapshot without reloading
    ///
    /// A run that has nothing indexed yet yields an empty, not-ready
    /// response; unknown runs and tags are errors.
    pub fn lookup_snapshot(&self, request: &LookupRequest) -> Result<LookupResponse, QueryError> {
        request.validate()?;

        let snapshot = self.mux.snapshot();
        let index = snapshot
            .run(&request.run)
            .ok_or_else(|| QueryError::UnknownRun(request.run.clone()))?;

        if index.state() != RunState::Loaded {
            debug!(run = %request.run, state = ?index.state(), "Run not indexed yet");
            return Ok(LookupResponse::not_ready(request));
        }

        let series = index.series(&request.tag).ok_or_else(|| QueryError::UnknownTag {
            run: request.run.clone(),
            tag: request.tag.clone(),
        })?;
        let values = match &request.step_range {
            Some(range) => series.range(range.start, range.end).to_vec(),
            None => series.values().to_vec(),
        };

        Ok(LookupResponse {
            run: request.run.clone(),
            tag: request.tag.clone(),
            values,
            ready: true,
        })
    }

    /// Reload, waiting at most `timeout`, then answer from the latest snapshot
    ///
    /// A reload that misses the deadline keeps running in the background and
    /// the response is marked not ready.
    #[instrument(skip(self, request), fields(run = %request.run, tag = %request.tag))]
    pub async fn refresh_and_lookup(
        &self,
        request: &LookupRequest,
        timeout: Duration,
    ) -> Result<LookupResponse, QueryError> {
        request.validate()?;

        let finished = self.refresh(timeout).await?;
        let mut response = self.lookup_snapshot(request)?;
        response.ready &= finished;
        Ok(response)
    }

    /// Rediscover runs and reload within `timeout`; returns whether the reload
    /// finished
    ///
    /// Refreshes that arrive while a reload is running share the next one. A
    /// zero `timeout` starts the reload in the background and returns at once.
    pub async fn refresh(&self, timeout: Duration) -> Result<bool, QueryError> {
        let mux = self.mux.clone();
        let logdir = self.logdir.clone();
        let reload = tokio::spawn(async move {
            if let Some(logdir) = logdir {
                mux.add_runs_from_directory(&logdir).await?;
            }
            mux.reload_coalesced().await
        });

        if timeout.is_zero() {
            debug!("Reload started in background");
            return Ok(false);
        }

        match tokio::time::timeout(timeout, reload).await {
            Ok(Ok(Ok(Some(report)))) => {
                debug!(new_records = report.new_records(), "Refreshed index");
                Ok(true)
            }
            Ok(Ok(Ok(None))) => {
                debug!("Refresh served by a concurrent reload");
                Ok(true)
            }
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(join_error)) => Err(QueryError::Reload(join_error.to_string())),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Reload missed deadline");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl DataServer for IndexDataServer {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, QueryError> {
        self.lookup_snapshot(request)
    }

    async fn health_pills(
        &self,
        run: &str,
        node_names: &[String],
        step: Option<i64>,
    ) -> Result<BTreeMap<String, Vec<HealthPillEvent>>, QueryError> {
        let snapshot = self.mux.snapshot();
        let index = snapshot
            .run(run)
            .ok_or_else(|| QueryError::UnknownRun(run.to_string()))?;
        Ok(collect_health_pills(index, node_names, step))
    }
}
