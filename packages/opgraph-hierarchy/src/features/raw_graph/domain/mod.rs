//! Raw graph domain types

pub mod graph_def;
pub mod models;
pub mod stats;

pub use graph_def::{ArgDef, AttrEntry, FunctionDef, GraphDef, NodeDef};
pub use models::{BaseEdge, NormalizedInput, OpNode, OutputShape, RawGraph};
pub use stats::{DeviceStepStats, NodeExecStats, NodeStats, StepStats};
