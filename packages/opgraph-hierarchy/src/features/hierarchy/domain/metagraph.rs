//! Metagraph and metaedge
//!
//! A metagraph holds the direct children of one group (by name) and the
//! aggregated edges between them. Bridgegraphs reuse the same structure with
//! endpoints outside the group.

use ahash::AHashMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::features::raw_graph::BaseEdge;

/// Aggregate of base edges between two siblings
///
/// Invariant: `num_regular_edges` counts the base edges without a control
/// dependency; the metaedge is control-only iff that count is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metaedge {
    pub v: String,
    pub w: String,
    pub base_edges: Vec<BaseEdge>,
    /// Direction relative to the owning group; set for bridgegraph edges only
    pub inbound: Option<bool>,
    pub num_regular_edges: usize,
    pub num_control_edges: usize,
    pub num_ref_edges: usize,
    /// Sum of the tensor sizes of the base edges
    pub total_size: u64,
}

impl Metaedge {
    pub fn new(v: impl Into<String>, w: impl Into<String>) -> Self {
        Self {
            v: v.into(),
            w: w.into(),
            base_edges: Vec::new(),
            inbound: None,
            num_regular_edges: 0,
            num_control_edges: 0,
            num_ref_edges: 0,
            total_size: 0,
        }
    }

    pub fn add_base_edge(&mut self, edge: BaseEdge, size: u64) {
        if edge.is_control_dependency {
            self.num_control_edges += 1;
        } else {
            self.num_regular_edges += 1;
        }
        if edge.is_reference_edge {
            self.num_ref_edges += 1;
        }
        self.total_size = self.total_size.saturating_add(size);
        self.base_edges.push(edge);
    }

    pub fn is_control_only(&self) -> bool {
        self.num_regular_edges == 0
    }
}

/// Which structure a [`Metagraph`] backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GraphKind {
    Meta,
    Series,
    Bridge,
}

/// Named nodes plus metaedges, at most one metaedge per ordered pair
#[derive(Debug, Clone)]
pub struct Metagraph {
    name: String,
    kind: GraphKind,
    graph: StableDiGraph<String, Metaedge>,
    node_ix: AHashMap<String, NodeIndex>,
    /// Insertion order of live nodes
    order: Vec<NodeIndex>,
}

impl Metagraph {
    pub fn new(name: impl Into<String>, kind: GraphKind) -> Self {
        Self {
            name: name.into(),
            kind,
            graph: StableDiGraph::new(),
            node_ix: AHashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Add `name` if absent
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&ix) = self.node_ix.get(name) {
            return ix;
        }
        let ix = self.graph.add_node(name.to_string());
        self.node_ix.insert(name.to_string(), ix);
        self.order.push(ix);
        ix
    }

    /// Remove `name` and its metaedges
    pub fn remove_node(&mut self, name: &str) -> bool {
        match self.node_ix.remove(name) {
            Some(ix) => {
                self.graph.remove_node(ix);
                self.order.retain(|&i| i != ix);
                true
            }
            None => false,
        }
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.node_ix.contains_key(name)
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(move |&ix| self.graph[ix].as_str())
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn find(&self, v: &str, w: &str) -> Option<EdgeIndex> {
        let a = *self.node_ix.get(v)?;
        let b = *self.node_ix.get(w)?;
        self.graph.find_edge(a, b)
    }

    pub fn edge(&self, v: &str, w: &str) -> Option<&Metaedge> {
        self.find(v, w).map(|e| &self.graph[e])
    }

    /// Existing metaedge `v → w`, or a new empty one. Endpoints are added
    /// if missing. The flag is true when the edge was created.
    pub fn find_or_create_edge(&mut self, v: &str, w: &str) -> (&mut Metaedge, bool) {
        let a = self.add_node(v);
        let b = self.add_node(w);
        let (ix, created) = match self.graph.find_edge(a, b) {
            Some(ix) => (ix, false),
            None => (self.graph.add_edge(a, b, Metaedge::new(v, w)), true),
        };
        (&mut self.graph[ix], created)
    }

    /// All metaedges in index order
    pub fn edges(&self) -> impl Iterator<Item = &Metaedge> {
        self.graph.edge_indices().map(move |e| &self.graph[e])
    }

    fn directed(&self, name: &str, dir: Direction) -> Vec<&Metaedge> {
        let Some(&ix) = self.node_ix.get(name) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges_directed(ix, dir).collect();
        edges.sort_by_key(|e| e.id());
        edges.into_iter().map(|e| e.weight()).collect()
    }

    pub fn in_edges(&self, name: &str) -> Vec<&Metaedge> {
        self.directed(name, Direction::Incoming)
    }

    pub fn out_edges(&self, name: &str) -> Vec<&Metaedge> {
        self.directed(name, Direction::Outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_edge_aggregates() {
        let mut g = Metagraph::new("root", GraphKind::Meta);
        let (e, created) = g.find_or_create_edge("a", "b");
        assert!(created);
        e.add_base_edge(BaseEdge::new("a/x", "b/y"), 4);
        let (e, created) = g.find_or_create_edge("a", "b");
        assert!(!created);
        e.add_base_edge(BaseEdge::new("a/x", "b/z").control(), 1);

        let edge = g.edge("a", "b").unwrap();
        assert_eq!(edge.base_edges.len(), 2);
        assert_eq!(edge.num_regular_edges, 1);
        assert_eq!(edge.num_control_edges, 1);
        assert_eq!(edge.total_size, 5);
        assert!(!edge.is_control_only());
        assert!(g.edge("b", "a").is_none());
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_total_size_saturates() {
        let mut e = Metaedge::new("a", "b");
        e.add_base_edge(BaseEdge::new("a", "b"), u64::MAX - 1);
        e.add_base_edge(BaseEdge::new("a", "b").control(), 5);
        assert_eq!(e.total_size, u64::MAX);
    }

    #[test]
    fn test_remove_node_keeps_order() {
        let mut g = Metagraph::new("root", GraphKind::Meta);
        for n in ["a", "b", "c"] {
            g.add_node(n);
        }
        g.find_or_create_edge("a", "b");
        assert!(g.remove_node("b"));
        assert!(!g.remove_node("b"));
        g.add_node("d");
        assert_eq!(g.node_names().collect::<Vec<_>>(), vec!["a", "c", "d"]);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_in_and_out_edges() {
        let mut g = Metagraph::new("root", GraphKind::Meta);
        g.find_or_create_edge("a", "c");
        g.find_or_create_edge("b", "c");
        g.find_or_create_edge("c", "d");
        let ins: Vec<_> = g.in_edges("c").iter().map(|e| e.v.as_str()).collect();
        assert_eq!(ins, vec!["a", "b"]);
        let outs: Vec<_> = g.out_edges("c").iter().map(|e| e.w.as_str()).collect();
        assert_eq!(outs, vec!["d"]);
        assert!(g.in_edges("zzz").is_empty());
    }
}
