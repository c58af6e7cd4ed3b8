//! Namespace hierarchy
//!
//! Built from a [`RawGraph`](crate::features::raw_graph::RawGraph) in three
//! phases (nodes, series, edges), then queried read-mostly. Nodes live in an
//! arena indexed by name; each group owns a metagraph over its direct
//! children and lazily derives a bridgegraph for edges crossing its boundary.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    CompatibilityHistogram, GraphKind, GroupData, GroupKind, HierNode, Hierarchy, LibraryFunction,
    Metaedge, Metagraph, Metanode, NodeHistograms, NodeId, NodeKind, OpLeaf, SeriesNode,
};
pub use infrastructure::builder::{add_edges, add_nodes, SharedAncestor};
pub use infrastructure::series::{
    detect_numeric_suffix_series, detect_series_anywhere, group_series,
};
pub use infrastructure::{build_hierarchy, series_node_name, Edges, HierarchyBuilder, SeriesCandidate};
