//! Configuration
//!
//! Three parameter groups, each usable on its own:
//! - [`ParserOptions`]: chunking of the text-format stream
//! - [`BuildParams`]: raw-graph construction (embeddings, reference edges)
//! - [`HierarchyParams`]: series grouping
//!
//! [`GraphLoadConfig`] bundles them for YAML loading.

pub mod error;
pub mod io;
pub mod params;

pub use error::{ConfigError, ConfigResult};
pub use io::GraphLoadConfig;
pub use params::{BuildParams, HierarchyParams, ParserOptions, SeriesGroupingType};
