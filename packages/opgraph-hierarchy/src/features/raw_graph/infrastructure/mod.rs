//! Raw graph construction, compatibility pass and stats join

pub mod builder;
pub mod compat;
pub mod stats;

pub use builder::{normalize_inputs, RawGraphBuilder};
pub use compat::{check_ops_for_compatibility, OpCompatibilityProvider, OpWhitelist};
pub use stats::join_stats_info_with_graph;
