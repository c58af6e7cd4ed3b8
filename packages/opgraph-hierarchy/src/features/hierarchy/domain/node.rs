//! Hierarchy nodes
//!
//! Nodes live in an arena owned by the hierarchy and are addressed by
//! [`NodeId`]. Children are owned through the group's metagraph (by name);
//! `parent` is a plain id and never an owning link.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::features::raw_graph::{NodeStats, OpNode};
use crate::shared::strict_name;

use super::metagraph::{GraphKind, Metagraph};

/// Arena slot of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityHistogram {
    pub compatible: u64,
    pub incompatible: u64,
}

/// Aggregated counts of a subtree
///
/// For a group this is the elementwise sum over its direct children; for an
/// op it covers the op and its embeddings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeHistograms {
    pub cardinality: u64,
    pub op_histogram: BTreeMap<String, u64>,
    pub device_histogram: BTreeMap<String, u64>,
    pub compatibility: CompatibilityHistogram,
}

impl NodeHistograms {
    /// Footprint of one op leaf
    pub fn for_op(node: &OpNode) -> Self {
        let mut hist = Self {
            cardinality: 1,
            ..Self::default()
        };
        for op in node.self_and_embeddings() {
            *hist.op_histogram.entry(op.op.clone()).or_insert(0) += 1;
            if let Some(device) = &op.device {
                *hist.device_histogram.entry(device.clone()).or_insert(0) += 1;
            }
            if op.compatible {
                hist.compatibility.compatible += 1;
            } else {
                hist.compatibility.incompatible += 1;
            }
        }
        hist
    }

    /// Footprint of an embedding on its own
    pub fn for_embedding(node: &OpNode) -> Self {
        let mut alone = node.clone();
        alone.in_embeddings.clear();
        alone.out_embeddings.clear();
        Self::for_op(&alone)
    }

    pub fn add(&mut self, other: &NodeHistograms) {
        self.cardinality += other.cardinality;
        for (op, n) in &other.op_histogram {
            *self.op_histogram.entry(op.clone()).or_insert(0) += n;
        }
        for (device, n) in &other.device_histogram {
            *self.device_histogram.entry(device.clone()).or_insert(0) += n;
        }
        self.compatibility.compatible += other.compatibility.compatible;
        self.compatibility.incompatible += other.compatibility.incompatible;
    }
}

/// State shared by metanodes and series nodes
#[derive(Debug)]
pub struct GroupData {
    pub metagraph: Metagraph,
    pub(crate) bridgegraph: OnceCell<Metagraph>,
    pub(crate) ordering: OnceCell<BTreeMap<String, usize>>,
    pub histograms: NodeHistograms,
    /// Longest path below this group; layout bookkeeping only
    pub depth: u32,
    pub has_non_control_edges: bool,
    pub stats: Option<NodeStats>,
}

impl GroupData {
    pub fn new(name: &str, kind: GraphKind) -> Self {
        Self {
            metagraph: Metagraph::new(name, kind),
            bridgegraph: OnceCell::new(),
            ordering: OnceCell::new(),
            histograms: NodeHistograms::default(),
            depth: 1,
            has_non_control_edges: false,
            stats: None,
        }
    }

    /// Bridgegraph if it has been computed already
    pub fn cached_bridgegraph(&self) -> Option<&Metagraph> {
        self.bridgegraph.get()
    }
}

/// Leaf op in the tree, or an embedding attached to one
#[derive(Debug)]
pub struct OpLeaf {
    pub op: OpNode,
    pub histograms: NodeHistograms,
    /// Series this op was detected in, grouped or not
    pub owning_series: Option<String>,
    /// Attached to a host op instead of sitting in a metagraph
    pub embedded: bool,
}

/// Namespace group
#[derive(Debug)]
pub struct Metanode {
    pub group: GroupData,
    /// Library function this namespace defines
    pub associated_function: Option<String>,
}

impl Metanode {
    /// The `X/(X)` child holding the op that shares this namespace's name
    pub fn root_op(&self) -> Option<&str> {
        let strict = strict_name(self.group.metagraph.name());
        self.group
            .metagraph
            .node_names()
            .find(|name| *name == strict)
    }

    pub fn first_child(&self) -> Option<&str> {
        self.group.metagraph.node_names().next()
    }
}

/// Collapsed run of numbered siblings
#[derive(Debug)]
pub struct SeriesNode {
    pub group: GroupData,
    pub prefix: String,
    pub suffix: String,
    pub parent_path: String,
    /// Op shared by the members
    pub cluster_id: String,
    /// Member ids in insertion order
    pub ids: Vec<i64>,
}

#[derive(Debug)]
pub enum NodeKind {
    Op(OpLeaf),
    Meta(Metanode),
    Series(SeriesNode),
}

/// Group flavour, for callers that only need the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    Meta,
    Series,
}

#[derive(Debug)]
pub struct HierNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl HierNode {
    pub fn is_group(&self) -> bool {
        !matches!(self.kind, NodeKind::Op(_))
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        match self.kind {
            NodeKind::Op(_) => None,
            NodeKind::Meta(_) => Some(GroupKind::Meta),
            NodeKind::Series(_) => Some(GroupKind::Series),
        }
    }

    pub fn group(&self) -> Option<&GroupData> {
        match &self.kind {
            NodeKind::Op(_) => None,
            NodeKind::Meta(m) => Some(&m.group),
            NodeKind::Series(s) => Some(&s.group),
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut GroupData> {
        match &mut self.kind {
            NodeKind::Op(_) => None,
            NodeKind::Meta(m) => Some(&mut m.group),
            NodeKind::Series(s) => Some(&mut s.group),
        }
    }

    pub fn op_leaf(&self) -> Option<&OpLeaf> {
        match &self.kind {
            NodeKind::Op(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn op_leaf_mut(&mut self) -> Option<&mut OpLeaf> {
        match &mut self.kind {
            NodeKind::Op(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn series(&self) -> Option<&SeriesNode> {
        match &self.kind {
            NodeKind::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn metanode(&self) -> Option<&Metanode> {
        match &self.kind {
            NodeKind::Meta(m) => Some(m),
            _ => None,
        }
    }

    pub fn histograms(&self) -> &NodeHistograms {
        match &self.kind {
            NodeKind::Op(leaf) => &leaf.histograms,
            NodeKind::Meta(m) => &m.group.histograms,
            NodeKind::Series(s) => &s.group.histograms,
        }
    }

    /// Op type; empty for groups
    pub fn op(&self) -> &str {
        self.op_leaf().map(|l| l.op.op.as_str()).unwrap_or("")
    }

    pub fn device(&self) -> Option<&str> {
        self.op_leaf().and_then(|l| l.op.device.as_deref())
    }

    pub fn cardinality(&self) -> u64 {
        self.histograms().cardinality
    }
}
