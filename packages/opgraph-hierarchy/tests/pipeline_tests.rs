//! End-to-end loader tests: text → raw graph → hierarchy → stats

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use opgraph_hierarchy::features::raw_graph::OpWhitelist;
use opgraph_hierarchy::shared::ROOT_NAME;
use opgraph_hierarchy::{
    join_stats_info_with_graph, CancellationFlag, GraphLoadConfig, GraphLoader, HierarchyError,
    ProgressTracker,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingTracker {
    messages: Mutex<Vec<String>>,
    progress: Mutex<f64>,
    errors: Mutex<Vec<String>>,
}

impl ProgressTracker for RecordingTracker {
    fn set_message(&self, msg: &str) {
        self.messages.lock().unwrap().push(msg.to_string());
    }

    fn update_progress(&self, increment: f64) {
        *self.progress.lock().unwrap() += increment;
    }

    fn report_error(&self, msg: &str, err: &HierarchyError) {
        self.errors.lock().unwrap().push(format!("{msg}: {err}"));
    }
}

fn loader() -> GraphLoader {
    GraphLoader::new(GraphLoadConfig::default()).with_provider(Arc::new(OpWhitelist::new([
        "Placeholder",
        "MatMul",
        "Const",
        "ScalarSummary",
    ])))
}

#[tokio::test]
async fn test_small_graph_hierarchy() {
    let loaded = loader().load(SMALL_GRAPH.as_bytes()).await.unwrap();
    let h = &loaded.hierarchy;

    assert_children(h, ROOT_NAME, &["input", "dense_1", "dense_2"]);
    assert_eq!(loaded.incompatible_ops, 0);

    // Embeddings hang off their hosts, not the namespace tree
    assert_eq!(h.parent("dense_1/kernel").unwrap().unwrap().name, "dense_1/MatMul");
    assert_eq!(h.parent("loss").unwrap().unwrap().name, "dense_2/MatMul");
    assert_children(h, "dense_1", &["dense_1/MatMul"]);

    let root = h.root().group().unwrap();
    let data = root.metagraph.edge("dense_1", "dense_2").unwrap();
    assert_eq!(data.total_size, 64);
    assert!(root.metagraph.edge("input", "dense_2").unwrap().is_control_only());
    assert!(h.has_shape_info);
    assert_eq!(h.max_metaedge_size(), 64);
    assert_eq!(h.devices, vec!["/device:CPU:0".to_string(), "/device:GPU:0".to_string()]);

    let preds = h.predecessors("dense_1/MatMul").unwrap();
    assert!(preds.regular.iter().any(|e| e.v == "dense_1/kernel"));
    let succ = h.successors("dense_2/MatMul").unwrap();
    assert!(succ.regular.iter().any(|e| e.w == "loss"));

    assert_histograms_consistent(h);
}

#[tokio::test]
async fn test_progress_reaches_hundred() {
    let tracker = RecordingTracker::default();
    loader()
        .load_graph(SMALL_GRAPH.as_bytes(), &tracker, &CancellationFlag::new())
        .await
        .unwrap();

    let progress = *tracker.progress.lock().unwrap();
    assert!((progress - 100.0).abs() < 1e-9, "progress was {progress}");
    let messages = tracker.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m == "Data: Reading graph"));
    assert!(messages.iter().any(|m| m == "Namespace hierarchy: Adding edges"));
    assert!(tracker.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_input_reports_error() {
    let tracker = RecordingTracker::default();
    let err = loader()
        .load_graph("node {\n  name \"x\"\n}\n".as_bytes(), &tracker, &CancellationFlag::new())
        .await
        .unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(tracker.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_join_and_aggregate() {
    let loader = loader();
    let mut loaded = loader.load(SMALL_GRAPH.as_bytes()).await.unwrap();
    let stats = loader.load_stats(SMALL_STATS.as_bytes()).await.unwrap().unwrap();

    let joined = join_stats_info_with_graph(&mut loaded.raw, &stats, None);
    assert_eq!(joined, 2);
    loaded.hierarchy.join_and_aggregate_stats(&loaded.raw).unwrap();

    let h = &loaded.hierarchy;
    let root = h.root().group().unwrap();
    let totals = root.stats.as_ref().unwrap();
    assert_eq!(totals.total_bytes, 1024);
    assert_eq!(totals.start_micros, Some(100));
    assert_eq!(totals.end_micros, Some(160));
    assert_eq!(root.histograms.device_histogram.get("/device:GPU:0"), Some(&1));
    assert_histograms_consistent(h);

    let dense_1 = h.node("dense_1").unwrap().group().unwrap();
    assert_eq!(dense_1.stats.as_ref().unwrap().total_micros(), Some(40));
}

#[tokio::test]
async fn test_config_from_yaml_drives_series() {
    let config = GraphLoadConfig::from_yaml_str(
        "hierarchy:\n  series_node_min_size: 2\nparser:\n  chunk_size: 16\n",
    )
    .unwrap();
    let mut text = String::new();
    for i in 1..=3 {
        text.push_str(&format!("node {{\n  name: \"step_{i}\"\n  op: \"Add\"\n}}\n"));
    }
    let loaded = GraphLoader::new(config).load(text.as_bytes()).await.unwrap();
    assert!(loaded.hierarchy.contains("step[1-3]"));
}
