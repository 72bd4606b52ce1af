//! Health pill events served to the debugger frontend

use std::collections::BTreeMap;

use pillbox_core::{DEBUGGER_PLUGIN_NAME, DataType};
use pillbox_multiplexer::{IndexedValue, RunIndex};
use serde::{Deserialize, Serialize};

/// One health pill of one op output at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPillEvent {
    pub wall_time: f64,
    pub step: i64,
    pub device_name: String,
    pub node_name: String,
    pub output_slot: u32,
    /// Dtype of the watched tensor, when the pill carries it
    pub dtype: Option<DataType>,
    pub shape: Vec<u64>,
    /// Raw summary values, statistics first
    pub value: Vec<f64>,
}

impl HealthPillEvent {
    /// Event for `value`, or `None` if its summary is not a health pill
    pub fn from_indexed(node_name: &str, value: &IndexedValue) -> Option<Self> {
        let pill = value.summary.health_pill()?;
        Some(Self {
            wall_time: value.wall_time,
            step: value.step,
            device_name: value.summary.device.clone(),
            node_name: node_name.to_string(),
            output_slot: value.summary.output_slot,
            dtype: pill.tensor_dtype,
            shape: pill.tensor_shape,
            value: value.summary.values.clone(),
        })
    }
}

/// Node name -> health pills for the debugger tags of one run
///
/// Node names are op names. Nodes without pills (or not written by the
/// debugger plugin) are omitted. `step` keeps a single step.
pub fn collect_health_pills(
    index: &RunIndex,
    node_names: &[String],
    step: Option<i64>,
) -> BTreeMap<String, Vec<HealthPillEvent>> {
    let Some(debugger_tags) = index.plugin_tags(DEBUGGER_PLUGIN_NAME) else {
        return BTreeMap::new();
    };

    let mut pills = BTreeMap::new();
    for node_name in node_names {
        if !debugger_tags.contains_key(node_name) {
            continue;
        }
        let Some(series) = index.series(node_name) else {
            continue;
        };
        let events: Vec<_> = series
            .range(step, step)
            .iter()
            .filter_map(|value| HealthPillEvent::from_indexed(node_name, value))
            .collect();
        if !events.is_empty() {
            pills.insert(node_name.clone(), events);
        }
    }
    pills
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillbox_core::{EventRecord, TensorPayload};

    const DEVICE: &str = "/job:localhost/replica:0/task:0/cpu:0";

    fn pill(dtype: f64, shape: &[f64]) -> Vec<f64> {
        (0..12).map(f64::from).chain([dtype]).chain(shape.iter().copied()).collect()
    }

    fn summary(op: &str, slot: u32, wall_time: f64, step: i64, values: Vec<f64>) -> EventRecord {
        EventRecord::debug_numeric_summary(DEVICE, op, slot, wall_time, step, values)
    }

    fn index() -> RunIndex {
        let mut index = RunIndex::default();
        for record in [
            summary("layers/Matmul", 0, 42.0, 2, pill(1.0, &[1.0, 3.0])),
            summary("layers/Matmul", 1, 43.0, 7, pill(2.0, &[2.0, 3.0, 3.0])),
            summary("logits/Add", 0, 1337.0, 7, pill(3.0, &[2.0, 3.0, 3.0])),
            EventRecord::new(3, 3.0, "scalar/loss", "loss", TensorPayload::vector(vec![0.5])),
        ] {
            index.insert(&record);
        }
        index
    }

    #[test]
    fn test_pills_for_requested_nodes() {
        let pills = collect_health_pills(
            &index(),
            &["layers/Matmul".to_string(), "missing/Op".to_string()],
            None,
        );

        assert_eq!(pills.len(), 1);
        let matmul = &pills["layers/Matmul"];
        assert_eq!(matmul.len(), 2);
        assert_eq!(matmul[0].step, 2);
        assert_eq!(matmul[0].dtype, Some(DataType::Float32));
        assert_eq!(matmul[0].shape, vec![3]);
        assert_eq!(matmul[1].output_slot, 1);
        assert_eq!(matmul[1].shape, vec![3, 3]);
        assert_eq!(matmul[1].device_name, DEVICE);
        assert_eq!(matmul[1].value.len(), 16);
    }

    #[test]
    fn test_step_filter() {
        let pills = collect_health_pills(
            &index(),
            &["layers/Matmul".to_string(), "logits/Add".to_string()],
            Some(7),
        );
        assert_eq!(pills["layers/Matmul"].len(), 1);
        assert_eq!(pills["layers/Matmul"][0].wall_time, 43.0);
        assert_eq!(pills["logits/Add"][0].wall_time, 1337.0);

        assert!(collect_health_pills(&index(), &["logits/Add".to_string()], Some(99)).is_empty());
    }

    #[test]
    fn test_non_debugger_tags_are_skipped() {
        let pills = collect_health_pills(&index(), &["scalar/loss".to_string()], None);
        assert!(pills.is_empty());
    }
}
