//! Hierarchy builder
//!
//! # Phases
//! 1. Adding nodes: walk each op's namespace path from the root, creating
//!    metanodes on first sight and folding the op's histograms into every
//!    ancestor on the way down.
//! 2. Detect series: collapse numbered sibling runs (see `series`).
//! 3. Adding edges: place each base edge into the metagraph of the lowest
//!    common ancestor of its endpoints.
//!
//! Phases run as separate tracked tasks; cancellation is checked between
//! them and a failed or cancelled build returns no hierarchy.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::config::HierarchyParams;
use crate::errors::{HierarchyError, Result};
use crate::features::hierarchy::domain::{
    GraphKind, GroupData, HierNode, Hierarchy, LibraryFunction, Metanode, NodeHistograms, NodeId,
    NodeKind, OpLeaf,
};
use crate::features::raw_graph::{BaseEdge, OpNode, RawGraph};
use crate::shared::{
    hierarchy_path, run_task, run_task_async, CancellationFlag, NoopTracker, ProgressTracker,
    FUNCTION_LIBRARY_NODE_PREFIX,
};

use super::series::group_series;

static NOOP_TRACKER: NoopTracker = NoopTracker;

const PHASE_NODES: (&str, f64) = ("Adding nodes", 20.0);
const PHASE_SERIES: (&str, f64) = ("Detect series", 20.0);
const PHASE_EDGES: (&str, f64) = ("Adding edges", 30.0);

/// Builds a [`Hierarchy`] from a [`RawGraph`]
pub struct HierarchyBuilder<'a> {
    params: HierarchyParams,
    tracker: &'a dyn ProgressTracker,
    cancel: CancellationFlag,
}

impl HierarchyBuilder<'static> {
    pub fn new(params: HierarchyParams) -> Self {
        Self {
            params,
            tracker: &NOOP_TRACKER,
            cancel: CancellationFlag::new(),
        }
    }
}

impl<'a> HierarchyBuilder<'a> {
    pub fn with_tracker<'b>(self, tracker: &'b dyn ProgressTracker) -> HierarchyBuilder<'b> {
        HierarchyBuilder {
            params: self.params,
            tracker,
            cancel: self.cancel,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn params(&self) -> &HierarchyParams {
        &self.params
    }

    /// Run all phases on the current thread
    pub fn build_blocking(&self, raw: &RawGraph) -> Result<Hierarchy> {
        if raw.is_empty() {
            return Err(HierarchyError::EmptyGraph);
        }
        let mut h = Hierarchy::new();
        let (name, weight) = PHASE_NODES;
        run_task(name, weight, self.tracker, &self.cancel, || add_nodes(&mut h, raw))?;
        let (name, weight) = PHASE_SERIES;
        run_task(name, weight, self.tracker, &self.cancel, || group_series(&mut h, &self.params))?;
        let (name, weight) = PHASE_EDGES;
        run_task(name, weight, self.tracker, &self.cancel, || add_edges(&mut h, raw))?;
        log_summary(&h);
        Ok(h)
    }

    /// Run all phases, yielding to the runtime between them
    pub async fn build(&self, raw: &RawGraph) -> Result<Hierarchy> {
        if raw.is_empty() {
            return Err(HierarchyError::EmptyGraph);
        }
        let mut h = Hierarchy::new();
        let (name, weight) = PHASE_NODES;
        run_task_async(name, weight, self.tracker, &self.cancel, || add_nodes(&mut h, raw)).await?;
        let (name, weight) = PHASE_SERIES;
        run_task_async(name, weight, self.tracker, &self.cancel, || {
            group_series(&mut h, &self.params)
        })
        .await?;
        let (name, weight) = PHASE_EDGES;
        run_task_async(name, weight, self.tracker, &self.cancel, || add_edges(&mut h, raw)).await?;
        log_summary(&h);
        Ok(h)
    }
}

/// Build with default tracking and no cancellation
pub fn build_hierarchy(raw: &RawGraph, params: &HierarchyParams) -> Result<Hierarchy> {
    HierarchyBuilder::new(params.clone()).build_blocking(raw)
}

fn log_summary(h: &Hierarchy) {
    let groups = h.arena().iter().filter(|n| n.is_group()).count();
    info!(
        nodes = h.len(),
        groups,
        series = h.series_names.values().collect::<BTreeSet<_>>().len(),
        max_metaedge_size = h.max_metaedge_size(),
        "Hierarchy built"
    );
}

fn new_metanode(name: &str, parent: NodeId) -> HierNode {
    HierNode {
        name: name.to_string(),
        parent: Some(parent),
        kind: NodeKind::Meta(Metanode {
            group: GroupData::new(name, GraphKind::Meta),
            associated_function: None,
        }),
    }
}

fn new_op_leaf(op: &OpNode, parent: NodeId, embedded: bool) -> HierNode {
    let histograms = if embedded {
        NodeHistograms::for_embedding(op)
    } else {
        NodeHistograms::for_op(op)
    };
    HierNode {
        name: op.name.clone(),
        parent: Some(parent),
        kind: NodeKind::Op(OpLeaf {
            op: op.clone(),
            histograms,
            owning_series: None,
            embedded,
        }),
    }
}

/// Phase 1: create metanodes along every op's path and attach the op
pub fn add_nodes(h: &mut Hierarchy, raw: &RawGraph) -> Result<()> {
    let root = h.root_id();
    let mut function_metanodes: Vec<(String, String)> = Vec::new();

    for node in raw.nodes() {
        let path = hierarchy_path(&node.name);
        let footprint = NodeHistograms::for_op(node);
        let segments = path.len() as u32 + 1;

        let mut parent = root;
        for level in 0..=path.len() {
            let group = h.group_mut(parent)?;
            group.depth = group.depth.max(segments - level as u32);
            group.histograms.add(&footprint);
            if level == path.len() {
                break;
            }

            let prefix = &path[level];
            let child = match h.id_of(prefix) {
                Some(existing) if h.get(existing).is_group() => existing,
                Some(_) => {
                    return Err(HierarchyError::structural(format!(
                        "op '{prefix}' is also the namespace of '{}'",
                        node.name
                    )))
                }
                None => {
                    let id = h.alloc(new_metanode(prefix, parent))?;
                    h.group_mut(parent)?.metagraph.add_node(prefix);
                    if parent == root && prefix.starts_with(FUNCTION_LIBRARY_NODE_PREFIX) {
                        let function = prefix[FUNCTION_LIBRARY_NODE_PREFIX.len()..].to_string();
                        if let NodeKind::Meta(meta) = &mut h.get_mut(id).kind {
                            meta.associated_function = Some(function.clone());
                        }
                        function_metanodes.push((function, prefix.clone()));
                    }
                    id
                }
            };
            parent = child;
        }

        let leaf_id = h.alloc(new_op_leaf(node, parent, false))?;
        h.group_mut(parent)?.metagraph.add_node(&node.name);

        for embed in node.in_embeddings.iter().chain(node.out_embeddings.iter()) {
            // The same constant can be embedded into several hosts; the first one owns it
            if h.contains(&embed.name) {
                debug!(embedding = %embed.name, host = %node.name, "Embedding already indexed");
                continue;
            }
            h.alloc(new_op_leaf(embed, leaf_id, true))?;
        }
    }

    let mut usages: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for node in raw.nodes() {
        usages.entry(node.op.as_str()).or_default().push(node.name.clone());
    }
    for (function, metanode) in function_metanodes {
        let calls = usages.get(function.as_str()).cloned().unwrap_or_default();
        h.library_functions.insert(
            function,
            LibraryFunction {
                node: metanode,
                usages: calls,
            },
        );
    }

    h.devices = raw
        .nodes()
        .iter()
        .filter_map(|n| n.device.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    h.xla_clusters = raw
        .nodes()
        .iter()
        .filter_map(|n| n.xla_cluster.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!(
        ops = raw.len(),
        indexed = h.len(),
        functions = h.library_functions.len(),
        "Added nodes"
    );
    Ok(())
}

/// Lowest common ancestor of two tree nodes and the children under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAncestor {
    pub ancestor: NodeId,
    pub source_child: NodeId,
    pub target_child: NodeId,
}

impl Hierarchy {
    /// Walk both root-to-node chains inward until they diverge
    ///
    /// Fails when the chains never diverge, i.e. the nodes are equal or one
    /// is an ancestor of the other.
    pub fn shared_ancestor(&self, source: NodeId, target: NodeId) -> Result<SharedAncestor> {
        let source_path = self.ancestor_ids(source);
        let target_path = self.ancestor_ids(target);

        let mut i = source_path.len() - 1;
        let mut j = target_path.len() - 1;
        while source_path[i] == target_path[j] {
            if i == 0 || j == 0 {
                return Err(HierarchyError::structural(format!(
                    "no difference found between ancestor paths of '{}' and '{}'",
                    self.get(source).name,
                    self.get(target).name
                )));
            }
            i -= 1;
            j -= 1;
        }

        Ok(SharedAncestor {
            ancestor: source_path[i + 1],
            source_child: source_path[i],
            target_child: target_path[j],
        })
    }

    fn tree_op(&self, name: &str) -> Option<NodeId> {
        let id = self.id_of(name)?;
        match self.get(id).op_leaf() {
            Some(leaf) if !leaf.embedded => Some(id),
            _ => None,
        }
    }
}

/// Phase 3: aggregate base edges into metaedges
pub fn add_edges(h: &mut Hierarchy, raw: &RawGraph) -> Result<()> {
    let mut placed = 0usize;
    for edge in &raw.edges {
        let (Some(source), Some(target)) = (h.tree_op(&edge.source), h.tree_op(&edge.target)) else {
            debug!(source = %edge.source, target = %edge.target, "Dropping edge outside the tree");
            continue;
        };
        let shared = h.shared_ancestor(source, target)?;
        add_base_edge_to(h, &shared, edge.clone())?;
        placed += 1;
    }
    info!(edges = placed, dropped = raw.edges.len() - placed, "Added edges");
    Ok(())
}

fn add_base_edge_to(h: &mut Hierarchy, shared: &SharedAncestor, edge: BaseEdge) -> Result<()> {
    let (size, has_shape) = h.edge_size(&edge);
    h.has_shape_info |= has_shape;

    let v = h.get(shared.source_child).name.clone();
    let w = h.get(shared.target_child).name.clone();
    let is_control = edge.is_control_dependency;

    let group = h.group_mut(shared.ancestor)?;
    if !is_control {
        group.has_non_control_edges = true;
    }
    let (metaedge, _) = group.metagraph.find_or_create_edge(&v, &w);
    metaedge.add_base_edge(edge, size);
    let total = metaedge.total_size;
    h.note_metaedge_size(total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ROOT_NAME;
    use pretty_assertions::assert_eq;

    fn raw(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> RawGraph {
        let mut g = RawGraph::new();
        for (name, op) in nodes {
            g.add_node(OpNode::new(*name, *op));
        }
        for (v, w) in edges {
            g.add_edge(BaseEdge::new(*v, *w));
        }
        g
    }

    fn no_series() -> HierarchyParams {
        HierarchyParams::default().with_min_size(0)
    }

    #[test]
    fn test_path_materialization_is_idempotent() {
        let g = raw(&[("a/b/c", "Add"), ("a/b/d", "Mul"), ("a/e", "Add")], &[]);
        let h = build_hierarchy(&g, &no_series()).unwrap();
        assert_eq!(h.children(ROOT_NAME).unwrap(), vec!["a"]);
        assert_eq!(h.children("a").unwrap(), vec!["a/b", "a/e"]);
        assert_eq!(h.children("a/b").unwrap(), vec!["a/b/c", "a/b/d"]);
        assert_eq!(h.len(), 1 + 2 + 3);

        let a = h.node("a").unwrap().histograms();
        assert_eq!(a.cardinality, 3);
        assert_eq!(a.op_histogram.get("Add"), Some(&2));
        assert_eq!(h.root().group().unwrap().depth, 3);
        assert_eq!(h.node("a/b").unwrap().group().unwrap().depth, 1);
    }

    #[test]
    fn test_edges_land_in_lowest_common_ancestor() {
        let g = raw(
            &[("a/x", "Add"), ("a/y", "Add"), ("b/z", "Mul")],
            &[("a/x", "a/y"), ("a/y", "b/z"), ("a/x", "b/z")],
        );
        let h = build_hierarchy(&g, &no_series()).unwrap();

        let a = h.node("a").unwrap().group().unwrap();
        assert!(a.metagraph.edge("a/x", "a/y").is_some());
        assert!(a.has_non_control_edges);

        let root = h.root().group().unwrap();
        let ab = root.metagraph.edge("a", "b").unwrap();
        assert_eq!(ab.base_edges.len(), 2);
        assert_eq!(ab.num_regular_edges, 2);
        assert_eq!(h.max_metaedge_size(), 2);
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_dropped() {
        let mut g = raw(&[("a", "Add"), ("b", "Add")], &[("ghost", "a")]);
        let mut host = OpNode::new("c", "MatMul");
        host.in_embeddings.push(OpNode::new("k", "Const"));
        g.add_node(host);
        g.add_edge(BaseEdge::new("k", "c"));
        let h = build_hierarchy(&g, &no_series()).unwrap();
        assert_eq!(h.root().group().unwrap().metagraph.edge_count(), 0);
        // The embedding is indexed under its host
        assert_eq!(h.parent("k").unwrap().unwrap().name, "c");
    }

    #[test]
    fn test_self_loop_is_structural_violation() {
        let g = raw(&[("a/x", "Add")], &[("a/x", "a/x")]);
        let err = build_hierarchy(&g, &no_series()).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::StructuralInvariantViolation);
    }

    #[test]
    fn test_op_named_like_namespace_is_rejected() {
        let g = raw(&[("a", "Add"), ("a/b", "Add")], &[]);
        assert!(build_hierarchy(&g, &no_series()).is_err());
    }

    #[test]
    fn test_empty_raw_graph() {
        let err = build_hierarchy(&RawGraph::new(), &no_series()).unwrap_err();
        assert!(matches!(err, HierarchyError::EmptyGraph));
    }

    #[test]
    fn test_library_functions_and_usages() {
        let g = raw(
            &[
                ("__function_library__f/x", "input_arg"),
                ("__function_library__f/y", "Identity"),
                ("call_1", "f"),
                ("outer/call_2", "f"),
            ],
            &[],
        );
        let h = build_hierarchy(&g, &no_series()).unwrap();
        let f = h.library_functions.get("f").unwrap();
        assert_eq!(f.node, "__function_library__f");
        assert_eq!(f.usages, vec!["call_1".to_string(), "outer/call_2".to_string()]);
        let meta = h.node("__function_library__f").unwrap().metanode().unwrap();
        assert_eq!(meta.associated_function.as_deref(), Some("f"));
    }

    #[test]
    fn test_shape_info_sets_sizes() {
        let mut g = RawGraph::new();
        g.add_node(OpNode::new("a", "Add").with_output_shapes(vec![Some(vec![2, 3])]));
        g.add_node(OpNode::new("b", "Add"));
        g.add_edge(BaseEdge::new("a", "b"));
        let h = build_hierarchy(&g, &no_series()).unwrap();
        assert!(h.has_shape_info);
        assert_eq!(h.root().group().unwrap().metagraph.edge("a", "b").unwrap().total_size, 6);
    }

    #[test]
    fn test_huge_shapes_saturate_edge_size() {
        let mut g = RawGraph::new();
        g.add_node(OpNode::new("a", "Add").with_output_shapes(vec![Some(vec![1 << 33, 1 << 33])]));
        g.add_node(OpNode::new("b", "Add"));
        g.add_node(OpNode::new("c", "Add"));
        g.add_edge(BaseEdge::new("a", "b"));
        g.add_edge(BaseEdge::new("a", "c"));
        g.add_edge(BaseEdge::new("b", "c"));
        let h = build_hierarchy(&g, &no_series()).unwrap();
        let metagraph = &h.root().group().unwrap().metagraph;
        assert_eq!(metagraph.edge("a", "b").unwrap().total_size, u64::MAX);
        assert_eq!(h.max_metaedge_size(), u64::MAX);
    }

    #[tokio::test]
    async fn test_cancelled_build_returns_no_hierarchy() {
        let g = raw(&[("a", "Add")], &[]);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let result = HierarchyBuilder::new(no_series())
            .with_cancellation(cancel)
            .build(&g)
            .await;
        assert!(matches!(result, Err(HierarchyError::Cancelled { .. })));
    }
}
