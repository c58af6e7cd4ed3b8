//! Parameter structs

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Text-format stream chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Bytes requested per read
    pub chunk_size: usize,
    /// Line delimiter
    pub delimiter: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000_000,
            delimiter: "\n".to_string(),
        }
    }
}

impl ParserOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.chunk_size == 0 {
            return Err(ConfigError::range_with_hint(
                "parser.chunk_size",
                self.chunk_size,
                1,
                usize::MAX,
                "A chunk must hold at least one byte",
            ));
        }
        if self.delimiter.is_empty() {
            return Err(ConfigError::Empty {
                field: "parser.delimiter".to_string(),
            });
        }
        Ok(())
    }
}

/// Raw-graph construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    /// Op patterns whose nodes embed into their consumers (e.g. constants)
    pub in_embedding_types: Vec<String>,
    /// Op patterns whose nodes embed into their producer (e.g. summaries)
    pub out_embedding_types: Vec<String>,
    /// `"<Op> <input index>"` pairs whose edge carries a reference
    pub ref_edges: BTreeSet<String>,
}

impl Default for BuildParams {
    fn default() -> Self {
        let ref_edges = [
            "Assign 0",
            "AssignAdd 0",
            "AssignSub 0",
            "assign 0",
            "assign_add 0",
            "assign_sub 0",
            "count_up_to 0",
            "ScatterAdd 0",
            "ScatterSub 0",
            "ScatterUpdate 0",
            "scatter_add 0",
            "scatter_sub 0",
            "scatter_update 0",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            in_embedding_types: vec!["Const".to_string()],
            out_embedding_types: vec!["^[a-zA-Z]+Summary$".to_string()],
            ref_edges,
        }
    }
}

impl BuildParams {
    /// No embeddings at all; every node lands in the tree
    pub fn without_embeddings() -> Self {
        Self {
            in_embedding_types: Vec::new(),
            out_embedding_types: Vec::new(),
            ..Self::default()
        }
    }

    pub fn compile_in_embedding_patterns(&self) -> ConfigResult<Vec<Regex>> {
        compile_patterns("build.in_embedding_types", &self.in_embedding_types)
    }

    pub fn compile_out_embedding_patterns(&self) -> ConfigResult<Vec<Regex>> {
        compile_patterns("build.out_embedding_types", &self.out_embedding_types)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.compile_in_embedding_patterns()?;
        self.compile_out_embedding_patterns()?;
        Ok(())
    }
}

fn compile_patterns(field: &str, patterns: &[String]) -> ConfigResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                field: field.to_string(),
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Whether a detected series is collapsed into one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesGroupingType {
    Group,
    Ungroup,
}

/// Hierarchy construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyParams {
    /// Runs shorter than this stay ungrouped unless pinned; 0 disables series detection
    pub series_node_min_size: usize,
    /// Per-series overrides keyed by series name
    pub series_map: BTreeMap<String, SeriesGroupingType>,
    /// Match digit runs anywhere in the leaf name instead of only a `_<n>` suffix
    pub use_generalized_series_patterns: bool,
}

impl Default for HierarchyParams {
    fn default() -> Self {
        Self {
            series_node_min_size: 5,
            series_map: BTreeMap::new(),
            use_generalized_series_patterns: false,
        }
    }
}

impl HierarchyParams {
    pub fn with_min_size(mut self, min: usize) -> Self {
        self.series_node_min_size = min;
        self
    }

    pub fn with_generalized_patterns(mut self, enabled: bool) -> Self {
        self.use_generalized_series_patterns = enabled;
        self
    }

    pub fn with_override(mut self, series: impl Into<String>, grouping: SeriesGroupingType) -> Self {
        self.series_map.insert(series.into(), grouping);
        self
    }

    /// Flip a series between grouped and ungrouped
    pub fn toggle_series_group(&mut self, series_name: &str) {
        let next = match self.series_map.get(series_name) {
            None | Some(SeriesGroupingType::Group) => SeriesGroupingType::Ungroup,
            Some(SeriesGroupingType::Ungroup) => SeriesGroupingType::Group,
        };
        self.series_map.insert(series_name.to_string(), next);
    }
}
