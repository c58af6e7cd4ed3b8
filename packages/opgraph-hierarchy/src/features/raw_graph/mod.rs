//! Raw graph model
//!
//! Flat op graph interpreted from a parsed graph definition: one [`OpNode`]
//! per non-embedded op, embeddings attached to their host, and one
//! [`BaseEdge`] per input. This is the immutable input of hierarchy building.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    ArgDef, AttrEntry, BaseEdge, DeviceStepStats, FunctionDef, GraphDef, NodeDef, NodeExecStats,
    NodeStats, NormalizedInput, OpNode, OutputShape, RawGraph, StepStats,
};
pub use infrastructure::{
    check_ops_for_compatibility, join_stats_info_with_graph, normalize_inputs, OpCompatibilityProvider,
    OpWhitelist, RawGraphBuilder,
};
