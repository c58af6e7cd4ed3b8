//! Hierarchy: node arena, name index and build-wide bookkeeping
//!
//! Invariant: every node reachable from the root through metagraphs, plus
//! every embedding, has exactly one arena slot and one index entry under its
//! own name.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use serde::Serialize;

use crate::config::SeriesGroupingType;
use crate::errors::{HierarchyError, Result};
use crate::features::raw_graph::BaseEdge;
use crate::shared::ROOT_NAME;

use super::metagraph::GraphKind;
use super::node::{GroupData, HierNode, Metanode, NodeId, NodeKind};

/// Library function and the nodes that call it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryFunction {
    /// Metanode holding the function body
    pub node: String,
    /// Nodes whose op is the function name
    pub usages: Vec<String>,
}

#[derive(Debug)]
pub struct Hierarchy {
    nodes: Vec<HierNode>,
    index: AHashMap<String, NodeId>,
    root: NodeId,
    pub library_functions: BTreeMap<String, LibraryFunction>,
    pub devices: Vec<String>,
    pub xla_clusters: Vec<String>,
    pub has_shape_info: bool,
    max_metaedge_size: AtomicU64,
    /// Effective grouping per series name: caller overrides plus series
    /// left ungrouped for being below the size threshold
    pub series_grouping: BTreeMap<String, SeriesGroupingType>,
    /// Member name → name of the series node it was moved into
    pub series_names: BTreeMap<String, String>,
}

impl Hierarchy {
    /// Empty hierarchy holding only the root group
    pub fn new() -> Self {
        let root = HierNode {
            name: ROOT_NAME.to_string(),
            parent: None,
            kind: NodeKind::Meta(Metanode {
                group: GroupData::new(ROOT_NAME, GraphKind::Meta),
                associated_function: None,
            }),
        };
        let mut index = AHashMap::new();
        index.insert(ROOT_NAME.to_string(), NodeId(0));
        Self {
            nodes: vec![root],
            index,
            root: NodeId(0),
            library_functions: BTreeMap::new(),
            devices: Vec::new(),
            xla_clusters: Vec::new(),
            has_shape_info: false,
            max_metaedge_size: AtomicU64::new(0),
            series_grouping: BTreeMap::new(),
            series_names: BTreeMap::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &HierNode {
        &self.nodes[self.root.0]
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() <= 1
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&HierNode> {
        self.id_of(name).map(|id| &self.nodes[id.0])
    }

    /// Like [`Hierarchy::node`] but an absent name is a lookup error
    pub fn require(&self, name: &str) -> Result<&HierNode> {
        self.node(name).ok_or_else(|| HierarchyError::lookup(name))
    }

    pub fn get(&self, id: NodeId) -> &HierNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, name: &str) -> Result<Option<&HierNode>> {
        Ok(self.require(name)?.parent.map(|p| self.get(p)))
    }

    /// Direct children of a group, in metagraph order
    pub fn children(&self, name: &str) -> Result<Vec<&str>> {
        Ok(self
            .require(name)?
            .group()
            .map(|g| g.metagraph.node_names().collect())
            .unwrap_or_default())
    }

    /// Names of all indexed nodes
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn max_metaedge_size(&self) -> u64 {
        self.max_metaedge_size.load(Ordering::Relaxed)
    }

    pub(crate) fn note_metaedge_size(&self, total_size: u64) {
        self.max_metaedge_size.fetch_max(total_size, Ordering::Relaxed);
    }

    /// Tensor size carried by `edge`: output size of its source op, 1 when unknown
    pub(crate) fn edge_size(&self, edge: &BaseEdge) -> (u64, bool) {
        match self
            .node(&edge.source)
            .and_then(|n| n.op_leaf())
            .and_then(|leaf| leaf.op.output_size())
        {
            Some(size) => (size, true),
            None => (1, false),
        }
    }

    /// Ids from `id` up to and including the root
    pub fn ancestor_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            path.push(c);
            current = self.nodes[c.0].parent;
        }
        path
    }

    pub(crate) fn alloc(&mut self, node: HierNode) -> Result<NodeId> {
        if self.index.contains_key(&node.name) {
            return Err(HierarchyError::structural(format!(
                "node '{}' already exists in the hierarchy",
                node.name
            )));
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.name.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut HierNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn group_mut(&mut self, id: NodeId) -> Result<&mut GroupData> {
        let node = &mut self.nodes[id.0];
        let name = node.name.clone();
        node.group_mut()
            .ok_or_else(|| HierarchyError::structural(format!("'{name}' is not a group")))
    }

    pub(crate) fn arena(&self) -> &[HierNode] {
        &self.nodes
    }

    pub(crate) fn arena_mut(&mut self) -> &mut [HierNode] {
        &mut self.nodes
    }
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}
