//! Server configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or none at
//! all) is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pillbox_logging::LogConfig;
use pillbox_multiplexer::MultiplexerConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::QueryError;

/// Configuration for the query server and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root directory searched for runs
    pub logdir: PathBuf,
    /// Deadline for a refresh before answering from the current index
    pub request_timeout_ms: u64,
    /// Runs registered explicitly, in addition to the discovered ones
    pub runs: BTreeMap<String, PathBuf>,
    /// Run log scanning options
    pub multiplexer: MultiplexerConfig,
    /// Logging setup for the binary
    pub logging: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            logdir: PathBuf::from("./logdir"),
            request_timeout_ms: 5_000,
            runs: BTreeMap::new(),
            multiplexer: MultiplexerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Configuration rooted at `logdir`
    pub fn with_logdir(logdir: impl Into<PathBuf>) -> Self {
        Self {
            logdir: logdir.into(),
            ..Default::default()
        }
    }

    /// Register a run explicitly
    pub fn with_run(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.runs.insert(name.into(), path.into());
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, QueryError> {
        toml::from_str(contents).map_err(|e| QueryError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, QueryError> {
        toml::to_string(self).map_err(|e| QueryError::Config(e.to_string()))
    }
}
