//! Feature modules, leaves first
//!
//! - `text_format`: streaming key/value text parser
//! - `raw_graph`: flat op graph interpreted from the parsed object
//! - `hierarchy`: namespace tree, series, bridgegraphs and queries

pub mod hierarchy;
pub mod raw_graph;
pub mod text_format;
