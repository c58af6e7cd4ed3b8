//! Hierarchy construction and queries

pub mod bridgegraph;
pub mod builder;
pub mod query;
pub mod series;
pub mod stats;

pub use builder::{build_hierarchy, HierarchyBuilder};
pub use query::Edges;
pub use series::{series_node_name, SeriesCandidate};
