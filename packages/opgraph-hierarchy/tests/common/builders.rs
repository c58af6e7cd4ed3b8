//! Test data builders

use opgraph_hierarchy::{BaseEdge, OpNode, RawGraph};

/// Builder for RawGraph
#[derive(Debug, Default)]
pub struct RawGraphFixture {
    nodes: Vec<OpNode>,
    edges: Vec<BaseEdge>,
}

impl RawGraphFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compatible op
    pub fn op(mut self, name: &str, op: &str) -> Self {
        self.nodes.push(OpNode::new(name, op).with_compatible(true));
        self
    }

    pub fn node(mut self, node: OpNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add several ops sharing one op type
    pub fn ops(mut self, names: &[&str], op: &str) -> Self {
        for name in names {
            self.nodes.push(OpNode::new(*name, op).with_compatible(true));
        }
        self
    }

    pub fn edge(mut self, v: &str, w: &str) -> Self {
        self.edges.push(BaseEdge::new(v, w));
        self
    }

    pub fn control_edge(mut self, v: &str, w: &str) -> Self {
        self.edges.push(BaseEdge::new(v, w).control());
        self
    }

    pub fn build(self) -> RawGraph {
        let mut graph = RawGraph::new();
        for node in self.nodes {
            graph.add_node(node);
        }
        for edge in self.edges {
            graph.add_edge(edge);
        }
        graph
    }
}

/// `prefix_1 .. prefix_n` under `parent`
pub fn numbered(parent: &str, prefix: &str, ids: &[i64]) -> Vec<String> {
    ids.iter()
        .map(|i| {
            if parent.is_empty() {
                format!("{prefix}_{i}")
            } else {
                format!("{parent}/{prefix}_{i}")
            }
        })
        .collect()
}
