//! End-to-end loading: text → parsed object → raw graph → hierarchy

pub mod loader;
pub mod result;

pub use loader::GraphLoader;
pub use result::{LoadTimings, LoadedGraph};
