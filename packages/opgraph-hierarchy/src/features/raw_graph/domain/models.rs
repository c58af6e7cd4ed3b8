//! Raw graph nodes and edges

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::graph_def::AttrEntry;
use super::stats::NodeStats;

/// Shape of one output tensor: `None` for unknown rank, `-1` for an unknown dim
pub type OutputShape = Option<Vec<i64>>;

/// Input reference after stripping the control marker and output slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub name: String,
    /// `"<n>"` or `"<word>:<n>"` for function outputs
    pub output_tensor_key: String,
    pub is_control_dependency: bool,
}

/// Leaf op of the flat graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpNode {
    pub name: String,
    pub op: String,
    pub device: Option<String>,
    pub attr: Vec<AttrEntry>,
    pub inputs: Vec<NormalizedInput>,
    /// Shapes of the outputs, if the graph recorded them
    pub output_shapes: Option<Vec<OutputShape>>,
    pub xla_cluster: Option<String>,
    /// Set by the compatibility pass
    pub compatible: bool,
    pub in_embeddings: Vec<OpNode>,
    pub out_embeddings: Vec<OpNode>,
    pub function_input_index: Option<usize>,
    pub function_output_index: Option<usize>,
    pub stats: Option<NodeStats>,
}

impl OpNode {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_compatible(mut self, compatible: bool) -> Self {
        self.compatible = compatible;
        self
    }

    pub fn with_output_shapes(mut self, shapes: Vec<OutputShape>) -> Self {
        self.output_shapes = Some(shapes);
        self
    }

    /// Itself followed by its in- and out-embeddings
    pub fn self_and_embeddings(&self) -> impl Iterator<Item = &OpNode> {
        std::iter::once(self)
            .chain(self.in_embeddings.iter())
            .chain(self.out_embeddings.iter())
    }

    /// Sum over outputs of the product of dims; unknowns count as 1.
    /// Saturates at `u64::MAX`.
    pub fn output_size(&self) -> Option<u64> {
        let shapes = self.output_shapes.as_ref()?;
        let total = shapes
            .iter()
            .map(|shape| match shape {
                None => 1u64,
                Some(dims) => dims
                    .iter()
                    .map(|&d| if d < 0 { 1 } else { d as u64 })
                    .fold(1u64, u64::saturating_mul),
            })
            .fold(0u64, u64::saturating_add);
        Some(total)
    }
}

/// One edge of the flat graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEdge {
    pub source: String,
    pub target: String,
    pub output_tensor_key: String,
    /// Numeric tail of the output tensor key
    pub output_slot: u32,
    pub is_control_dependency: bool,
    pub is_reference_edge: bool,
}

impl BaseEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            output_tensor_key: "0".to_string(),
            output_slot: 0,
            is_control_dependency: false,
            is_reference_edge: false,
        }
    }

    pub fn control(mut self) -> Self {
        self.is_control_dependency = true;
        self
    }

    pub fn reference(mut self) -> Self {
        self.is_reference_edge = true;
        self
    }

    pub fn with_output_tensor_key(mut self, key: impl Into<String>) -> Self {
        self.output_tensor_key = key.into();
        self.output_slot = slot_of(&self.output_tensor_key);
        self
    }
}

/// `"3"` → 3, `"out:2"` → 2, anything else → 0
pub(crate) fn slot_of(key: &str) -> u32 {
    key.rsplit(':').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Flat graph: nodes in definition order plus their edges
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    nodes: Vec<OpNode>,
    #[serde(skip)]
    index: AHashMap<String, usize>,
    pub edges: Vec<BaseEdge>,
}

impl RawGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the node with the same name
    pub fn add_node(&mut self, node: OpNode) -> Option<OpNode> {
        if let Some(&pos) = self.index.get(&node.name) {
            return Some(std::mem::replace(&mut self.nodes[pos], node));
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        None
    }

    pub fn add_edge(&mut self, edge: BaseEdge) {
        self.edges.push(edge);
    }

    pub fn node(&self, name: &str) -> Option<&OpNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut OpNode> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn nodes(&self) -> &[OpNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> std::slice::IterMut<'_, OpNode> {
        self.nodes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rebuild the name index, e.g. after deserialization
    pub fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
    }
}
