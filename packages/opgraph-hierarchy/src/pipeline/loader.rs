//! Graph loader
//!
//! Drives the whole ingestion for one graph:
//!
//! | Stage                | Weight | Work                                         |
//! |----------------------|--------|----------------------------------------------|
//! | Data                 | 30%    | stream-parse the text with the graph table   |
//! | Graph                | 20%    | GraphDef → RawGraph, compatibility pass      |
//! | Namespace hierarchy  | 50%    | node / series / edge phases                  |
//!
//! Each stage reports through a [`SubtaskTracker`] scaled to its weight, so a
//! host tracker sees progress climb to 100 over the whole load.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncRead;
use tracing::info;

use crate::config::GraphLoadConfig;
use crate::errors::Result;
use crate::features::hierarchy::HierarchyBuilder;
use crate::features::raw_graph::{
    check_ops_for_compatibility, GraphDef, OpCompatibilityProvider, RawGraphBuilder, StepStats,
};
use crate::features::text_format::{parse_graph_text, parse_stats_text};
use crate::shared::{run_task_async, CancellationFlag, NoopTracker, ProgressTracker, SubtaskTracker};

use super::result::{LoadTimings, LoadedGraph};

const DATA_WEIGHT: f64 = 30.0;
const GRAPH_WEIGHT: f64 = 20.0;
const HIERARCHY_WEIGHT: f64 = 50.0;

/// Loads graphs and run metadata with one configuration
pub struct GraphLoader {
    config: GraphLoadConfig,
    provider: Arc<dyn OpCompatibilityProvider>,
}

impl GraphLoader {
    /// Loader that treats every op as compatible
    pub fn new(config: GraphLoadConfig) -> Self {
        Self {
            config,
            provider: Arc::new(|_: &str, _: Option<&str>| true),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn OpCompatibilityProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &GraphLoadConfig {
        &self.config
    }

    /// Load without progress reporting or cancellation
    pub async fn load<R>(&self, reader: R) -> Result<LoadedGraph>
    where
        R: AsyncRead + Unpin,
    {
        self.load_graph(reader, &NoopTracker, &CancellationFlag::new()).await
    }

    /// Load a graph stored on disk
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadedGraph> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening graph file");
        let file = tokio::fs::File::open(path).await?;
        self.load(file).await
    }

    pub async fn load_graph<R>(
        &self,
        reader: R,
        tracker: &dyn ProgressTracker,
        cancel: &CancellationFlag,
    ) -> Result<LoadedGraph>
    where
        R: AsyncRead + Unpin,
    {
        self.config.validate()?;
        let mut timings = LoadTimings::default();

        // ═══════════════════════════════════════════════════════════════
        // Data
        // ═══════════════════════════════════════════════════════════════
        let data_tracker = SubtaskTracker::new(tracker, DATA_WEIGHT, "Data");
        data_tracker.set_message("Reading graph");
        cancel.check("Reading graph")?;
        let started = Instant::now();
        let parsed = match parse_graph_text(reader, &self.config.parser).await {
            Ok(parsed) => parsed,
            Err(err) => {
                data_tracker.report_error("Failed reading graph", &err);
                return Err(err);
            }
        };
        data_tracker.update_progress(100.0);
        timings.parse = started.elapsed();

        // ═══════════════════════════════════════════════════════════════
        // Graph
        // ═══════════════════════════════════════════════════════════════
        let graph_tracker = SubtaskTracker::new(tracker, GRAPH_WEIGHT, "Graph");
        let started = Instant::now();
        let graph_def = run_task_async("Interpreting graph definition", 20.0, &graph_tracker, cancel, || {
            GraphDef::from_parsed(&parsed)
        })
        .await?;
        drop(parsed);
        let mut raw = run_task_async("Normalizing names and edges", 50.0, &graph_tracker, cancel, || {
            RawGraphBuilder::new(self.config.build.clone())?.build(&graph_def)
        })
        .await?;
        let incompatible_ops = run_task_async("Checking op compatibility", 30.0, &graph_tracker, cancel, || {
            Ok(check_ops_for_compatibility(&mut raw, self.provider.as_ref()))
        })
        .await?;
        timings.graph = started.elapsed();

        // ═══════════════════════════════════════════════════════════════
        // Namespace hierarchy
        // ═══════════════════════════════════════════════════════════════
        let hierarchy_tracker = SubtaskTracker::new(tracker, HIERARCHY_WEIGHT, "Namespace hierarchy");
        let started = Instant::now();
        // Builder phases account for 70; the remainder closes the stage
        let hierarchy = HierarchyBuilder::new(self.config.hierarchy.clone())
            .with_tracker(&hierarchy_tracker)
            .with_cancellation(cancel.clone())
            .build(&raw)
            .await?;
        hierarchy_tracker.update_progress(30.0);
        timings.hierarchy = started.elapsed();

        info!(
            ops = raw.len(),
            edges = raw.edges.len(),
            incompatible_ops,
            total_ms = timings.total().as_millis() as u64,
            "Loaded graph"
        );
        Ok(LoadedGraph {
            raw,
            hierarchy,
            incompatible_ops,
            timings,
        })
    }

    /// Parse run metadata; `None` when it carries no step stats
    pub async fn load_stats<R>(&self, reader: R) -> Result<Option<StepStats>>
    where
        R: AsyncRead + Unpin,
    {
        let Some(step_stats) = parse_stats_text(reader, &self.config.parser).await? else {
            info!("Run metadata has no step stats");
            return Ok(None);
        };
        let stats = StepStats::from_parsed(&step_stats)?;
        info!(devices = stats.dev_stats.len(), "Loaded step stats");
        Ok(Some(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HierarchyParams;
    use crate::errors::HierarchyError;
    use crate::features::raw_graph::OpWhitelist;

    const GRAPH: &str = r#"node {
  name: "x"
  op: "Placeholder"
}
node {
  name: "dense/MatMul"
  op: "MatMul"
  input: "x"
}
node {
  name: "dense/BiasAdd"
  op: "BiasAdd"
  input: "dense/MatMul"
}
"#;

    #[tokio::test]
    async fn test_load_graph_end_to_end() {
        let loader = GraphLoader::new(GraphLoadConfig::default())
            .with_provider(Arc::new(OpWhitelist::new(["Placeholder", "MatMul"])));
        let loaded = loader.load(GRAPH.as_bytes()).await.unwrap();

        assert_eq!(loaded.raw.len(), 3);
        assert_eq!(loaded.incompatible_ops, 1);
        let h = &loaded.hierarchy;
        assert!(h.node("dense").unwrap().is_group());
        assert!(h.root().group().unwrap().metagraph.edge("x", "dense").is_some());
        assert_eq!(
            h.incompatible_ops(&HierarchyParams::default()).unwrap(),
            vec!["dense/BiasAdd".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_graph() {
        let loader = GraphLoader::new(GraphLoadConfig::default());
        let err = loader.load(&b""[..]).await.unwrap_err();
        assert!(matches!(err, HierarchyError::EmptyGraph));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let loader = GraphLoader::new(GraphLoadConfig::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = loader
            .load_graph(GRAPH.as_bytes(), &NoopTracker, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let loader = GraphLoader::new(GraphLoadConfig::default());
        let err = loader.load_file("/nonexistent/graph.pbtxt").await.unwrap_err();
        assert!(matches!(err, HierarchyError::Io(_)));
    }

    #[tokio::test]
    async fn test_load_stats_without_step_stats() {
        let loader = GraphLoader::new(GraphLoadConfig::default());
        assert!(loader.load_stats(&b"other {\n}\n"[..]).await.unwrap().is_none());
    }
}
