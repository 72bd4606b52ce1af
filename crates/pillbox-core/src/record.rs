//! Event records
//!
//! An [`EventRecord`] is one observation of one tensor output at one step.
//! Records are written by a single producer per run and never mutated.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::debugger::{DEBUGGER_PLUGIN_NAME, DebugNodeName, DebuggerEventMetadata};

/// Element type of a tensor
///
/// Discriminants follow the TensorFlow `DataType` enum so that dtype values
/// embedded in debug summaries can be mapped back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Float32,
    Float64,
    Int32,
    UInt8,
    Int16,
    Int8,
    String,
    Int64,
    Bool,
    UInt16,
    Float16,
}

impl DataType {
    /// Map a TensorFlow dtype enum value to a [`DataType`]
    pub fn from_enum(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Float32,
            2 => Self::Float64,
            3 => Self::Int32,
            4 => Self::UInt8,
            5 => Self::Int16,
            6 => Self::Int8,
            7 => Self::String,
            9 => Self::Int64,
            10 => Self::Bool,
            17 => Self::UInt16,
            19 => Self::Float16,
            _ => return None,
        })
    }

    /// The TensorFlow dtype enum value
    pub fn as_enum(self) -> u32 {
        match self {
            Self::Float32 => 1,
            Self::Float64 => 2,
            Self::Int32 => 3,
            Self::UInt8 => 4,
            Self::Int16 => 5,
            Self::Int8 => 6,
            Self::String => 7,
            Self::Int64 => 9,
            Self::Bool => 10,
            Self::UInt16 => 17,
            Self::Float16 => 19,
        }
    }

    /// Lower-case name as used in query responses (`"float32"`, `"int16"`, ...)
    pub fn name(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int32 => "int32",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::Int8 => "int8",
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::UInt16 => "uint16",
            Self::Float16 => "float16",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tensor-like payload: element type, shape and the flattened values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorPayload {
    pub dtype: DataType,
    pub shape: Vec<u64>,
    pub values: Vec<f64>,
}

impl TensorPayload {
    /// A rank-1 `float64` tensor holding `values`
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            dtype: DataType::Float64,
            shape: vec![values.len() as u64],
            values,
        }
    }
}

/// Per-record metadata
///
/// `plugin_content` is opaque to everything except the plugin named by
/// `plugin_name`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub device: String,
    pub output_slot: u32,
    pub plugin_name: String,
    pub plugin_content: Bytes,
}

/// A single timestamped, stepped record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Producer step; monotonic per run but repeated across output slots
    pub step: i64,
    /// Seconds since the Unix epoch
    pub wall_time: f64,
    /// Name of the signal (op or output) this record belongs to
    pub tag: String,
    pub node_name: String,
    pub tensor: TensorPayload,
    pub metadata: RecordMetadata,
}

impl EventRecord {
    /// Create a record with empty metadata
    pub fn new(
        step: i64,
        wall_time: f64,
        tag: impl Into<String>,
        node_name: impl Into<String>,
        tensor: TensorPayload,
    ) -> Self {
        Self {
            step,
            wall_time,
            tag: tag.into(),
            node_name: node_name.into(),
            tensor,
            metadata: RecordMetadata::default(),
        }
    }

    /// Replace the metadata
    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build a record carrying a `DebugNumericSummary` health pill
    ///
    /// The tag is the op name, the node name is `<op>:<slot>:DebugNumericSummary`
    /// and the debugger plugin metadata is attached as JSON content.
    pub fn debug_numeric_summary(
        device: impl Into<String>,
        op_name: impl Into<String>,
        output_slot: u32,
        wall_time: f64,
        step: i64,
        values: Vec<f64>,
    ) -> Self {
        let device = device.into();
        let op_name = op_name.into();
        let node_name = DebugNodeName::new(op_name.clone(), output_slot).to_string();
        let content = DebuggerEventMetadata::new(device.clone(), output_slot).to_content();

        Self {
            step,
            wall_time,
            tag: op_name,
            node_name,
            tensor: TensorPayload::vector(values),
            metadata: RecordMetadata {
                device,
                output_slot,
                plugin_name: DEBUGGER_PLUGIN_NAME.to_string(),
                plugin_content: content,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_enum_mapping() {
        for dtype in [
            DataType::Float32,
            DataType::Float64,
            DataType::Int32,
            DataType::UInt8,
            DataType::Int16,
            DataType::Int8,
            DataType::String,
            DataType::Int64,
            DataType::Bool,
            DataType::UInt16,
            DataType::Float16,
        ] {
            assert_eq!(DataType::from_enum(dtype.as_enum()), Some(dtype));
        }
        assert_eq!(DataType::from_enum(0), None);
        assert_eq!(DataType::from_enum(8), None);
    }

    #[test]
    fn test_vector_payload_shape() {
        let payload = TensorPayload::vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(payload.shape, vec![3]);
        assert_eq!(payload.dtype, DataType::Float64);
    }

    #[test]
    fn test_debug_numeric_summary_record() {
        let record = EventRecord::debug_numeric_summary(
            "/job:localhost/replica:0/task:0/cpu:0",
            "layers/Matmul",
            1,
            43.0,
            7,
            vec![0.0; 15],
        );
        assert_eq!(record.tag, "layers/Matmul");
        assert_eq!(record.node_name, "layers/Matmul:1:DebugNumericSummary");
        assert_eq!(record.metadata.output_slot, 1);
        assert_eq!(record.metadata.plugin_name, DEBUGGER_PLUGIN_NAME);

        let parsed = DebuggerEventMetadata::from_content(&record.metadata.plugin_content).unwrap();
        assert_eq!(parsed.output_slot, 1);
        assert_eq!(parsed.device, "/job:localhost/replica:0/task:0/cpu:0");
    }
}
