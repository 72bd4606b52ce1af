//! Structured logging bootstrap for Pillbox
//!
//! Installs a global `tracing` subscriber with:
//!
//! - **Console output**: JSON lines (default) or pretty output, on stderr
//! - **File output**: JSON lines through a non-blocking rolling appender
//! - **RUST_LOG override**: the environment filter wins over the configured level
//!
//! # Quick Start
//!
//! ```ignore
//! use pillbox_logging::{LogConfig, PillboxSubscriberBuilder};
//!
//! // Keep the guard alive for as long as file output is needed
//! let _guard = PillboxSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```

pub mod config;

pub use config::{
    ConsoleConfig, ConsoleFormat, FileConfig, JsonConfig, LogConfig, RotationStrategy,
};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),

    #[error("Failed to open log file: {0}")]
    File(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and installing the Pillbox subscriber
///
/// By default console output uses JSON lines. Use [`LogConfig::development`]
/// for pretty output.
pub struct PillboxSubscriberBuilder {
    config: LogConfig,
}

impl PillboxSubscriberBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the filter used when RUST_LOG is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured; dropping
    /// it flushes and stops the background writer. Fails if a global
    /// subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => parse_filter(&self.config.level)?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer()?);
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(self.json_layer(writer));
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    fn console_layer(&self) -> Result<BoxedLayer, LoggingError> {
        let console = &self.config.console;
        let json = &self.config.json;

        let layer: BoxedLayer = match console.format {
            ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(console.color)
                .with_writer(std::io::stderr)
                .boxed(),
            ConsoleFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(json.span_list)
                .flatten_event(json.flatten_events)
                .with_file(json.source_location)
                .with_line_number(json.source_location)
                .with_writer(std::io::stderr)
                .boxed(),
        };

        match &console.level {
            Some(level) => Ok(layer.with_filter(parse_filter(level)?).boxed()),
            None => Ok(layer),
        }
    }

    fn json_layer(&self, writer: NonBlocking) -> BoxedLayer {
        let json = &self.config.json;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(json.span_list)
            .flatten_event(json.flatten_events)
            .with_file(json.source_location)
            .with_line_number(json.source_location)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

impl Default for PillboxSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
}

/// `Never` truncates a single `<prefix>.log`; rotating strategies append
fn create_file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory).map_err(|e| LoggingError::File(e.to_string()))?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(|e| LoggingError::File(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Minutely => Rotation::MINUTELY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Daily => Rotation::DAILY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if let Some(retain) = config.retain_files {
        builder = builder.max_log_files(retain);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}
