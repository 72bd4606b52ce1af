//! Multiplexer configuration

use pillbox_storage::RunLogConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplexerConfig {
    /// Segment naming and frame limits used when scanning runs
    pub run_log: RunLogConfig,
}

impl MultiplexerConfig {
    pub fn with_run_log(mut self, run_log: RunLogConfig) -> Self {
        self.run_log = run_log;
        self
    }
}
