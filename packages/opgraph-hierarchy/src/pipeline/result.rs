//! Pipeline result types
//!
//! ```text
//! LoadedGraph
//! ├── raw: RawGraph            (Graph stage, compatibility flags set)
//! ├── hierarchy: Hierarchy     (Namespace hierarchy stage)
//! ├── incompatible_ops: usize  (nodes + embeddings the provider rejected)
//! └── timings: LoadTimings
//! ```

use std::time::Duration;

use crate::features::hierarchy::Hierarchy;
use crate::features::raw_graph::RawGraph;

/// Output of [`GraphLoader::load_graph`](super::GraphLoader::load_graph)
#[derive(Debug)]
pub struct LoadedGraph {
    /// Flat graph the hierarchy was built from; reuse it to join stats later
    pub raw: RawGraph,

    pub hierarchy: Hierarchy,

    pub incompatible_ops: usize,

    pub timings: LoadTimings,
}

/// Wall time per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTimings {
    pub parse: Duration,
    pub graph: Duration,
    pub hierarchy: Duration,
}

impl LoadTimings {
    pub fn total(&self) -> Duration {
        self.parse + self.graph + self.hierarchy
    }
}
