//! Execution statistics

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::features::text_format::{ParsedObject, ParsedObjectExt, ParsedValue};

/// Execution stats of one node, or the aggregate of a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub total_bytes: u64,
    pub start_micros: Option<i64>,
    pub end_micros: Option<i64>,
    /// Dims of each output tensor
    pub output_size: Option<Vec<Vec<i64>>>,
}

impl NodeStats {
    pub fn new(output_size: Option<Vec<Vec<i64>>>) -> Self {
        Self {
            output_size,
            ..Self::default()
        }
    }

    /// Widen the execution window to cover `[start, end]`
    pub fn add_execution_time(&mut self, start: i64, end: i64) {
        self.start_micros = Some(self.start_micros.map_or(start, |s| s.min(start)));
        self.end_micros = Some(self.end_micros.map_or(end, |e| e.max(end)));
    }

    /// Kernel executions of one op keep the largest allocation
    pub fn add_bytes_allocation(&mut self, bytes: u64) {
        self.total_bytes = self.total_bytes.max(bytes);
    }

    /// Fold a child's stats into a group aggregate
    pub fn combine(&mut self, other: &NodeStats) {
        self.total_bytes += other.total_bytes;
        if let (Some(start), Some(end)) = (other.start_micros, other.end_micros) {
            self.add_execution_time(start, end);
        }
    }

    pub fn total_micros(&self) -> Option<i64> {
        Some(self.end_micros? - self.start_micros?)
    }
}

/// Stats of one node on one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeExecStats {
    pub node_name: String,
    pub all_start_micros: i64,
    pub all_end_rel_micros: Option<i64>,
    /// `total_bytes` of each recorded allocation
    pub memory: Vec<i64>,
    pub output: Option<Vec<Vec<i64>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStepStats {
    pub device: String,
    pub node_stats: Vec<NodeExecStats>,
}

/// Per-device execution stats of one step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStats {
    pub dev_stats: Vec<DeviceStepStats>,
}

impl StepStats {
    /// Interpret the `step_stats` object of parsed run metadata
    pub fn from_parsed(step_stats: &ParsedObject) -> Result<Self> {
        let dev_stats = step_stats
            .get_items("dev_stats")
            .filter_map(ParsedValue::as_object)
            .map(|dev| DeviceStepStats {
                device: dev.get_str("device").unwrap_or_default().to_string(),
                node_stats: dev
                    .get_items("node_stats")
                    .filter_map(ParsedValue::as_object)
                    .filter_map(node_exec_stats_from)
                    .collect(),
            })
            .collect();
        Ok(Self { dev_stats })
    }
}

fn node_exec_stats_from(obj: &ParsedObject) -> Option<NodeExecStats> {
    let node_name = obj.get_str("node_name")?.to_string();

    let memory = obj
        .get_items("memory")
        .filter_map(ParsedValue::as_object)
        .filter_map(|m| m.get_i64("total_bytes"))
        .collect();

    let output = obj.get("output").map(|outputs| {
        outputs
            .items()
            .filter_map(ParsedValue::as_object)
            .map(|out| {
                out.get_object("tensor_description")
                    .and_then(|td| td.get_object("shape"))
                    .map(|shape| {
                        shape
                            .get_items("dim")
                            .filter_map(ParsedValue::as_object)
                            .map(|d| d.get_i64("size").unwrap_or(-1))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    });

    Some(NodeExecStats {
        node_name,
        all_start_micros: obj.get_i64("all_start_micros").unwrap_or(0),
        all_end_rel_micros: obj.get_i64("all_end_rel_micros"),
        memory,
        output,
    })
}
