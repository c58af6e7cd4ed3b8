//! Hierarchy domain types

pub mod hierarchy;
pub mod metagraph;
pub mod node;

pub use hierarchy::{Hierarchy, LibraryFunction};
pub use metagraph::{GraphKind, Metaedge, Metagraph};
pub use node::{
    CompatibilityHistogram, GroupData, GroupKind, HierNode, Metanode, NodeHistograms, NodeId, NodeKind,
    OpLeaf, SeriesNode,
};
