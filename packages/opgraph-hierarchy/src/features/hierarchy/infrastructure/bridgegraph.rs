//! Bridgegraphs
//!
//! The bridgegraph of a group holds the metaedges that connect its direct
//! children to nodes outside the group. It is derived from the parent's
//! metagraph and the parent's own bridgegraph, computed on first request
//! and memoized on the group.

use tracing::debug;

use crate::errors::{HierarchyError, Result};
use crate::features::hierarchy::domain::{GraphKind, Hierarchy, Metaedge, Metagraph, NodeId};

impl Hierarchy {
    /// Bridgegraph of a group; `None` for op nodes
    ///
    /// Repeated calls return the same cached graph.
    pub fn bridgegraph(&self, name: &str) -> Result<Option<&Metagraph>> {
        let id = self.id_of(name).ok_or_else(|| HierarchyError::lookup(name))?;
        let Some(group) = self.get(id).group() else {
            return Ok(None);
        };
        group
            .bridgegraph
            .get_or_try_init(|| self.compute_bridgegraph(id))
            .map(Some)
    }

    fn compute_bridgegraph(&self, id: NodeId) -> Result<Metagraph> {
        let node = self.get(id);
        let mut bridge = Metagraph::new(format!("{}/(bridge)", node.name), GraphKind::Bridge);

        let Some(parent_id) = node.parent else {
            return Ok(bridge);
        };
        let parent = self.get(parent_id);
        let Some(parent_group) = parent.group() else {
            return Ok(bridge);
        };
        let parent_bridge = self.bridgegraph(&parent.name)?;

        let parent_edges = parent_group
            .metagraph
            .edges()
            .chain(parent_bridge.into_iter().flat_map(|b| b.edges()));
        for parent_edge in parent_edges {
            if parent_edge.v != node.name && parent_edge.w != node.name {
                continue;
            }
            let inbound = parent_edge.w == node.name;
            for base in &parent_edge.base_edges {
                let (descendant, other) = if inbound {
                    (base.target.as_str(), parent_edge.v.as_str())
                } else {
                    (base.source.as_str(), parent_edge.w.as_str())
                };
                let child = self.child_name(&node.name, descendant)?;
                let (v, w) = if inbound { (other, child) } else { (child, other) };

                let (size, _) = self.edge_size(base);
                let (metaedge, created) = bridge.find_or_create_edge(v, w);
                if created {
                    metaedge.inbound = Some(inbound);
                }
                metaedge.add_base_edge(base.clone(), size);
                self.note_metaedge_size(metaedge.total_size);
            }
        }

        debug!(group = %node.name, edges = bridge.edge_count(), "Computed bridgegraph");
        Ok(bridge)
    }

    /// Direct child of `group` that contains `descendant`
    pub fn child_name(&self, group: &str, descendant: &str) -> Result<&str> {
        let mut current = self.id_of(descendant).map(|id| self.get(id));
        while let Some(node) = current {
            let parent = node.parent.map(|p| self.get(p));
            if parent.map_or(false, |p| p.name == group) {
                return Ok(&node.name);
            }
            current = parent;
        }
        Err(HierarchyError::structural(format!(
            "could not find immediate child of '{group}' for descendant '{descendant}'"
        )))
    }

    /// Bridge metaedges touching one child, split by direction
    pub(crate) fn bridge_edges_of(&self, group: &str, child: &str) -> Result<(Vec<&Metaedge>, Vec<&Metaedge>)> {
        let Some(bridge) = self.bridgegraph(group)? else {
            return Ok((Vec::new(), Vec::new()));
        };
        Ok((bridge.in_edges(child), bridge.out_edges(child)))
    }
}
