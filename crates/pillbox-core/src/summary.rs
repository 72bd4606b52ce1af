//! Value summaries and health pills

use serde::{Deserialize, Serialize};

use crate::record::{DataType, EventRecord};

/// Number of leading statistics in a `DebugNumericSummary` tensor
const HEALTH_PILL_STATS: usize = 12;

/// Compact per-step summary of one tensor output, as stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub node_name: String,
    pub device: String,
    pub output_slot: u32,
    pub dtype: DataType,
    pub shape: Vec<u64>,
    pub values: Vec<f64>,
}

impl ValueSummary {
    /// Summary of a record's tensor payload
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            node_name: record.node_name.clone(),
            device: record.metadata.device.clone(),
            output_slot: record.metadata.output_slot,
            dtype: record.tensor.dtype,
            shape: record.tensor.shape.clone(),
            values: record.tensor.values.clone(),
        }
    }

    /// Interpret the values as a health pill, if they are one
    pub fn health_pill(&self) -> Option<HealthPill> {
        HealthPill::from_values(&self.values)
    }
}

/// Typed view of a `DebugNumericSummary` tensor
///
/// Layout: 12 statistics, then the watched tensor's dtype enum, its rank and
/// its dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPill {
    pub is_initialized: bool,
    pub element_count: u64,
    pub nan_count: u64,
    pub neg_inf_count: u64,
    pub negative_count: u64,
    pub zero_count: u64,
    pub positive_count: u64,
    pub pos_inf_count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    /// `None` for payloads predating dtype reporting or with an unknown enum
    pub tensor_dtype: Option<DataType>,
    pub tensor_shape: Vec<u64>,
}

impl HealthPill {
    /// Decode a health pill from raw summary values
    ///
    /// Returns `None` for payloads too short to hold the statistics.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < HEALTH_PILL_STATS {
            return None;
        }

        let count = |i: usize| values[i].max(0.0) as u64;
        let tensor_dtype = values
            .get(HEALTH_PILL_STATS)
            .and_then(|v| DataType::from_enum(*v as u32));
        let tensor_shape = match values.get(HEALTH_PILL_STATS + 1) {
            Some(rank) => {
                // `as` saturates, so an infinite or huge rank clamps to the payload
                let start = HEALTH_PILL_STATS + 2;
                let end = start.saturating_add(rank.max(0.0) as usize).min(values.len());
                values
                    .get(start..end)
                    .unwrap_or_default()
                    .iter()
                    .map(|d| d.max(0.0) as u64)
                    .collect()
            }
            None => Vec::new(),
        };

        Some(Self {
            is_initialized: values[0] != 0.0,
            element_count: count(1),
            nan_count: count(2),
            neg_inf_count: count(3),
            negative_count: count(4),
            zero_count: count(5),
            positive_count: count(6),
            pos_inf_count: count(7),
            min: values[8],
            max: values[9],
            mean: values[10],
            variance: values[11],
            tensor_dtype,
            tensor_shape,
        })
    }
}
