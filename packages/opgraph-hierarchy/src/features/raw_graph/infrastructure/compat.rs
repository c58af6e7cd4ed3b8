//! Op compatibility pass
//!
//! The whitelist itself belongs to the caller; this pass only asks it once
//! per node and per embedding and records the answer on the node.

use ahash::AHashSet;
use tracing::info;

use crate::features::raw_graph::domain::{OpNode, RawGraph};
use crate::shared::FUNCTION_LIBRARY_NODE_PREFIX;

/// External compatibility predicate
pub trait OpCompatibilityProvider: Send + Sync {
    fn is_op_compatible(&self, op: &str, device: Option<&str>) -> bool;
}

impl<F> OpCompatibilityProvider for F
where
    F: Fn(&str, Option<&str>) -> bool + Send + Sync,
{
    fn is_op_compatible(&self, op: &str, device: Option<&str>) -> bool {
        self(op, device)
    }
}

/// Static set of supported op names
#[derive(Debug, Clone, Default)]
pub struct OpWhitelist {
    ops: AHashSet<String>,
}

impl OpWhitelist {
    pub fn new<I, S>(ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ops: ops.into_iter().map(Into::into).collect(),
        }
    }
}

impl OpCompatibilityProvider for OpWhitelist {
    fn is_op_compatible(&self, op: &str, _device: Option<&str>) -> bool {
        self.ops.contains(op)
    }
}

fn op_valid(node: &OpNode, provider: &dyn OpCompatibilityProvider) -> bool {
    // Function definitions and opless nodes are structural, not executed
    if node.name.starts_with(FUNCTION_LIBRARY_NODE_PREFIX) || node.op.is_empty() {
        return true;
    }
    provider.is_op_compatible(&node.op, node.device.as_deref())
}

/// Set `compatible` on every node and embedding of `graph`
pub fn check_ops_for_compatibility(graph: &mut RawGraph, provider: &dyn OpCompatibilityProvider) -> usize {
    let mut incompatible = 0usize;
    for node in graph.nodes_mut() {
        node.compatible = op_valid(node, provider);
        incompatible += usize::from(!node.compatible);
        for embed in node.in_embeddings.iter_mut().chain(node.out_embeddings.iter_mut()) {
            embed.compatible = op_valid(embed, provider);
            incompatible += usize::from(!embed.compatible);
        }
    }
    info!(incompatible, "Checked ops for compatibility");
    incompatible
}
