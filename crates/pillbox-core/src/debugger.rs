//! Debugger plugin conventions
//!
//! Records emitted by debug ops carry a JSON blob in their plugin content and
//! a node name of the form `<op>:<slot>:DebugNumericSummary`.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Plugin name attached to debugger records
pub const DEBUGGER_PLUGIN_NAME: &str = "debugger";

/// Debug op that produces health pills
pub const DEBUG_NUMERIC_SUMMARY_OP: &str = "DebugNumericSummary";

/// Typed content of a debugger record's plugin data
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebuggerEventMetadata {
    pub device: String,
    pub output_slot: u32,
}

impl DebuggerEventMetadata {
    pub fn new(device: impl Into<String>, output_slot: u32) -> Self {
        Self {
            device: device.into(),
            output_slot,
        }
    }

    /// Encode as the JSON bytes stored in `RecordMetadata::plugin_content`
    pub fn to_content(&self) -> Bytes {
        // Serializing a plain struct of a string and an integer cannot fail.
        Bytes::from(serde_json::to_vec(self).unwrap_or_default())
    }

    /// Parse plugin content written by [`Self::to_content`]
    pub fn from_content(content: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(content).map_err(|e| CodecError::Payload(e.to_string()))
    }
}

/// Node name of a debug op watching one output of another op
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugNodeName {
    pub op_name: String,
    pub output_slot: u32,
    pub debug_op: String,
}

impl DebugNodeName {
    /// Name of the `DebugNumericSummary` op watching `op_name:output_slot`
    pub fn new(op_name: impl Into<String>, output_slot: u32) -> Self {
        Self {
            op_name: op_name.into(),
            output_slot,
            debug_op: DEBUG_NUMERIC_SUMMARY_OP.to_string(),
        }
    }

    /// Parse `<op>:<slot>:<debug_op>`
    ///
    /// Op names may themselves contain `:`, so the string is split from the
    /// right.
    pub fn parse(node_name: &str) -> Option<Self> {
        let mut parts = node_name.rsplitn(3, ':');
        let debug_op = parts.next()?;
        let slot = parts.next()?.parse().ok()?;
        let op_name = parts.next()?;
        if op_name.is_empty() || debug_op.is_empty() {
            return None;
        }
        Some(Self {
            op_name: op_name.to_string(),
            output_slot: slot,
            debug_op: debug_op.to_string(),
        })
    }
}

impl fmt::Display for DebugNodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.op_name, self.output_slot, self.debug_op)
    }
}
