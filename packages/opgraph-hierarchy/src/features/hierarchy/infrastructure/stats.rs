//! Execution statistics on the hierarchy

use std::collections::BTreeSet;

use tracing::info;

use crate::errors::Result;
use crate::features::hierarchy::domain::{Hierarchy, NodeHistograms, NodeId};
use crate::features::raw_graph::{NodeStats, RawGraph};

impl Hierarchy {
    /// Copy stats and devices from `raw` onto op leaves, then rebuild every
    /// group's stats and device histogram from its leaves
    ///
    /// Group compatibility and op histograms are left untouched.
    pub fn join_and_aggregate_stats(&mut self, raw: &RawGraph) -> Result<()> {
        for op in raw.nodes() {
            let Some(id) = self.id_of(&op.name) else {
                continue;
            };
            if let Some(leaf) = self.get_mut(id).op_leaf_mut() {
                leaf.op.stats = op.stats.clone();
                if op.device.is_some() && op.device != leaf.op.device {
                    leaf.op.device = op.device.clone();
                    leaf.histograms = if leaf.embedded {
                        NodeHistograms::for_embedding(&leaf.op)
                    } else {
                        NodeHistograms::for_op(&leaf.op)
                    };
                }
            }
        }

        for node in self.arena_mut() {
            if let Some(group) = node.group_mut() {
                group.stats = Some(NodeStats::default());
                group.histograms.device_histogram.clear();
            }
        }

        let root = self.root().name.clone();
        let mut devices = BTreeSet::new();
        for leaf_name in self.leaves(&root)? {
            let Some(id) = self.id_of(&leaf_name) else {
                continue;
            };
            let node = self.get(id);
            let device_histogram = node.histograms().device_histogram.clone();
            let stats = node.op_leaf().and_then(|l| l.op.stats.clone());
            devices.extend(device_histogram.keys().cloned());

            let ancestors: Vec<NodeId> = self.ancestor_ids(id).into_iter().skip(1).collect();
            for ancestor in ancestors {
                let group = self.group_mut(ancestor)?;
                for (device, n) in &device_histogram {
                    *group.histograms.device_histogram.entry(device.clone()).or_insert(0) += n;
                }
                if let (Some(total), Some(stats)) = (group.stats.as_mut(), stats.as_ref()) {
                    total.combine(stats);
                }
            }
        }

        self.devices = devices.into_iter().collect();
        info!(devices = self.devices.len(), "Aggregated execution stats");
        Ok(())
    }
}
