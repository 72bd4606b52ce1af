//! Logging configuration
//!
//! Every type deserializes from a partial table, so a `[logging]` section in
//! a TOML file only needs the fields it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directives used when RUST_LOG is unset, e.g. `"info,pillbox_storage=debug"`
    pub level: String,
    pub console: ConsoleConfig,
    /// JSON lines file output; disabled when absent
    pub file: Option<FileConfig>,
    pub json: JsonConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonConfig::default(),
        }
    }
}

impl LogConfig {
    /// Debug level, colored human-readable console
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleConfig {
                format: ConsoleFormat::Pretty,
                color: true,
                ..ConsoleConfig::default()
            },
            ..Self::default()
        }
    }

    /// Daily-rotated JSON files under `log_dir`, console off
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                ..ConsoleConfig::default()
            },
            file: Some(FileConfig {
                directory: log_dir,
                retain_files: Some(30),
                ..FileConfig::default()
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Multi-line human-readable events
    Pretty,
}

/// Console output, written to stderr
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// ANSI colors (pretty format only)
    pub color: bool,
    /// Stricter filter for the console than `LogConfig::level`
    pub level: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            color: false,
            level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// Files are named `<prefix>.<date>.log`, or `<prefix>.log` without rotation
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Oldest rotated files beyond this count are deleted
    pub retain_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "pillbox".to_string(),
            rotation: RotationStrategy::Daily,
            retain_files: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    Minutely,
    Hourly,
    #[default]
    Daily,
    /// Single file, truncated at startup
    Never,
}

/// Shape of JSON lines, for both console and file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Emit the list of entered spans with each event
    pub span_list: bool,
    /// Emit source file and line
    pub source_location: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            span_list: true,
            source_location: true,
        }
    }
}
