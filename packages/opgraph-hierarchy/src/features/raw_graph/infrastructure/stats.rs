//! Joining execution stats onto the raw graph

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::features::raw_graph::domain::{NodeStats, RawGraph, StepStats};
use crate::shared::strict_name;

/// Attach per-node execution stats
///
/// Existing stats are cleared first. Nodes are looked up by name, then by
/// strict name (`A/B` → `A/B/(B)`). When `devices` is given, only those
/// devices contribute. Returns the number of stats records applied.
pub fn join_stats_info_with_graph(
    graph: &mut RawGraph,
    stats: &StepStats,
    devices: Option<&BTreeSet<String>>,
) -> usize {
    for node in graph.nodes_mut() {
        node.stats = None;
    }

    let mut applied = 0usize;
    for dev in &stats.dev_stats {
        if devices.is_some_and(|d| !d.contains(&dev.device)) {
            continue;
        }
        for exec in &dev.node_stats {
            let name = if graph.contains(&exec.node_name) {
                exec.node_name.clone()
            } else {
                strict_name(&exec.node_name)
            };
            let Some(node) = graph.node_mut(&name) else {
                debug!(node = %exec.node_name, "Stats for unknown node");
                continue;
            };

            let mut total_bytes = 0u64;
            for &bytes in &exec.memory {
                if bytes > 0 {
                    total_bytes += bytes as u64;
                } else if bytes < 0 {
                    warn!(node = %name, "Ignoring negative memory allocation");
                }
            }

            node.device = Some(dev.device.clone());
            let node_stats = node
                .stats
                .get_or_insert_with(|| NodeStats::new(exec.output.clone()));
            node_stats.add_bytes_allocation(total_bytes);

            if let Some(rel) = exec.all_end_rel_micros {
                if rel > 0 {
                    node_stats.add_execution_time(exec.all_start_micros, exec.all_start_micros + rel);
                } else if rel < 0 {
                    warn!(node = %name, "Ignoring negative runtime");
                }
            }
            applied += 1;
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::raw_graph::domain::{DeviceStepStats, NodeExecStats, OpNode};

    fn exec(name: &str, start: i64, rel: i64, memory: Vec<i64>) -> NodeExecStats {
        NodeExecStats {
            node_name: name.to_string(),
            all_start_micros: start,
            all_end_rel_micros: Some(rel),
            memory,
            output: None,
        }
    }

    #[test]
    fn test_join_by_name_and_strict_name() {
        let mut graph = RawGraph::new();
        graph.add_node(OpNode::new("a", "Add"));
        graph.add_node(OpNode::new("b/(b)", "Mul"));
        let stats = StepStats {
            dev_stats: vec![DeviceStepStats {
                device: "/gpu:0".to_string(),
                node_stats: vec![
                    exec("a", 10, 5, vec![64, -1]),
                    exec("b", 0, -3, vec![8]),
                    exec("missing", 0, 1, vec![]),
                ],
            }],
        };
        assert_eq!(join_stats_info_with_graph(&mut graph, &stats, None), 2);

        let a = graph.node("a").unwrap();
        assert_eq!(a.device.as_deref(), Some("/gpu:0"));
        let a_stats = a.stats.as_ref().unwrap();
        assert_eq!(a_stats.total_bytes, 64);
        assert_eq!(a_stats.total_micros(), Some(5));

        let b_stats = graph.node("b/(b)").unwrap().stats.as_ref().unwrap();
        assert_eq!(b_stats.total_bytes, 8);
        assert_eq!(b_stats.total_micros(), None);
    }

    #[test]
    fn test_device_filter() {
        let mut graph = RawGraph::new();
        graph.add_node(OpNode::new("a", "Add"));
        let stats = StepStats {
            dev_stats: vec![DeviceStepStats {
                device: "/cpu:0".to_string(),
                node_stats: vec![exec("a", 0, 1, vec![])],
            }],
        };
        let only_gpu: BTreeSet<String> = ["/gpu:0".to_string()].into_iter().collect();
        assert_eq!(join_stats_info_with_graph(&mut graph, &stats, Some(&only_gpu)), 0);
        assert!(graph.node("a").unwrap().stats.is_none());
    }
}
