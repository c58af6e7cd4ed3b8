//! Repeated-field schema
//!
//! The text format never says whether a field repeats, so a fixed table of
//! dotted paths does. Paths not listed here are promoted to lists only when a
//! second occurrence shows up; a repeated field missing from the table and
//! seen once therefore comes out as a scalar.

use ahash::AHashSet;

/// Repeated fields of a graph definition
pub const GRAPH_REPEATED_FIELDS: &[&str] = &[
    "library.function",
    "library.function.node_def",
    "library.function.node_def.input",
    "library.function.node_def.attr",
    "library.function.node_def.attr.value.list.b",
    "library.function.node_def.attr.value.list.f",
    "library.function.node_def.attr.value.list.func",
    "library.function.node_def.attr.value.list.i",
    "library.function.node_def.attr.value.list.s",
    "library.function.node_def.attr.value.list.shape",
    "library.function.node_def.attr.value.list.shape.dim",
    "library.function.node_def.attr.value.list.tensor",
    "library.function.node_def.attr.value.list.type",
    "library.function.node_def.attr.value.shape.dim",
    "library.function.node_def.attr.value.tensor.string_val",
    "library.function.node_def.attr.value.tensor.tensor_shape.dim",
    "library.function.signature.input_arg",
    "library.function.signature.output_arg",
    "library.versions",
    "node",
    "node.input",
    "node.attr",
    "node.attr.value.list.b",
    "node.attr.value.list.f",
    "node.attr.value.list.func",
    "node.attr.value.list.i",
    "node.attr.value.list.s",
    "node.attr.value.list.shape",
    "node.attr.value.list.shape.dim",
    "node.attr.value.list.tensor",
    "node.attr.value.list.type",
    "node.attr.value.shape.dim",
    "node.attr.value.tensor.string_val",
    "node.attr.value.tensor.tensor_shape.dim",
];

/// Repeated fields of run metadata (execution statistics)
pub const METADATA_REPEATED_FIELDS: &[&str] = &[
    "step_stats.dev_stats",
    "step_stats.dev_stats.node_stats",
    "step_stats.dev_stats.node_stats.output",
    "step_stats.dev_stats.node_stats.memory",
    "step_stats.dev_stats.node_stats.output.tensor_description.shape.dim",
];

/// Set of dotted field paths that always parse as lists
#[derive(Debug, Clone, Default)]
pub struct RepeatedFieldSchema {
    paths: AHashSet<String>,
}

impl RepeatedFieldSchema {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn graph() -> Self {
        Self::from_paths(GRAPH_REPEATED_FIELDS.iter().copied())
    }

    pub fn metadata() -> Self {
        Self::from_paths(METADATA_REPEATED_FIELDS.iter().copied())
    }

    pub fn is_repeated(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
