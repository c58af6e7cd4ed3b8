/*
 * opgraph-hierarchy
 *
 * Turns a flat, line-oriented text description of a computation graph into a
 * navigable namespace hierarchy.
 *
 * Pipeline:
 *   bytes --(text_format)--> ParsedObject --(raw_graph)--> RawGraph
 *         --(hierarchy)--> Hierarchy { root, index, metagraphs, series }
 *
 * The hierarchy is built once, bottom-up, then queried read-mostly:
 * bridgegraphs and topological orderings are memoized per group on first use.
 */

#![allow(clippy::new_without_default)]

/// Crate-wide error type
pub mod errors;

/// Typed parameters and YAML loading
pub mod config;

/// Constants and cross-cutting collaborators (progress, cancellation)
pub mod shared;

/// Feature modules (text format, raw graph, hierarchy)
pub mod features;

/// End-to-end loader
pub mod pipeline;

pub use errors::{ErrorKind, HierarchyError, Result};

pub use config::{
    BuildParams, ConfigError, GraphLoadConfig, HierarchyParams, ParserOptions, SeriesGroupingType,
};
pub use features::hierarchy::{
    build_hierarchy, CompatibilityHistogram, Edges, GroupKind, HierNode, Hierarchy,
    HierarchyBuilder, Metaedge, Metagraph, NodeHistograms, NodeId,
};
pub use features::raw_graph::{
    check_ops_for_compatibility, join_stats_info_with_graph, BaseEdge, GraphDef, NodeStats,
    OpCompatibilityProvider, OpNode, RawGraph, RawGraphBuilder, StepStats,
};
pub use features::text_format::{
    parse_graph_text, parse_stats_text, ParsedObject, ParsedValue, RepeatedFieldSchema,
    TextFormatParser,
};
pub use pipeline::{GraphLoader, LoadTimings, LoadedGraph};
pub use shared::{CancellationFlag, NoopTracker, ProgressTracker, SubtaskTracker};
