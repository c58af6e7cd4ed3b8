//! Text-format parser integration tests
//!
//! - chunk boundaries never change the result
//! - repeated fields come out as lists even when seen once
//! - malformed input aborts the whole parse

mod common;

use common::*;
use opgraph_hierarchy::features::text_format::ParsedObjectExt;
use opgraph_hierarchy::{
    parse_graph_text, parse_stats_text, ParsedObject, ParsedValue, ParserOptions, RepeatedFieldSchema,
    TextFormatParser,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

async fn parse_with_chunk(text: &str, chunk_size: usize) -> ParsedObject {
    let options = ParserOptions::default().with_chunk_size(chunk_size);
    parse_graph_text(text.as_bytes(), &options).await.unwrap()
}

#[tokio::test]
async fn test_chunk_size_does_not_change_result() {
    let whole = parse_with_chunk(SMALL_GRAPH, SMALL_GRAPH.len()).await;
    assert_eq!(parse_with_chunk(SMALL_GRAPH, 1).await, whole);
    assert_eq!(parse_with_chunk(SMALL_GRAPH, 7).await, whole);
    assert_eq!(parse_with_chunk(SMALL_GRAPH, 1_000_000).await, whole);
}

#[tokio::test]
async fn test_graph_structure() {
    let parsed = parse_with_chunk(SMALL_GRAPH, 64).await;

    let nodes: Vec<_> = parsed.get_items("node").collect();
    assert_eq!(nodes.len(), 5);

    let matmul = nodes[2].as_object().unwrap();
    assert_eq!(matmul.get_str("name"), Some("dense_1/MatMul"));
    let inputs: Vec<_> = matmul.get_items("input").filter_map(ParsedValue::as_str).collect();
    assert_eq!(inputs, vec!["input", "dense_1/kernel"]);

    // Listed in the schema, so a list even with a single element
    let loss = nodes[4].as_object().unwrap();
    assert!(matches!(loss.get("input"), Some(ParsedValue::List(items)) if items.len() == 1));

    // Not listed and seen once: a plain object
    let versions = parsed.get_object("versions").unwrap();
    assert_eq!(versions.get_i64("producer"), Some(27));

    let dtype = nodes[0]
        .as_object()
        .and_then(|n| n.get_items("attr").next())
        .and_then(ParsedValue::as_object)
        .and_then(|a| a.get_object("value"))
        .and_then(|v| v.get_str("type"));
    assert_eq!(dtype, Some("DT_FLOAT"));
}

#[tokio::test]
async fn test_unlisted_field_promoted_on_second_occurrence() {
    let parser = TextFormatParser::new(RepeatedFieldSchema::from_paths(Vec::<String>::new()));
    let parsed = parser.parse_bytes(b"tag: \"a\"\ntag: \"b\"\nother: 1\n").await.unwrap();
    assert_eq!(
        parsed.get("tag"),
        Some(&ParsedValue::List(vec![
            ParsedValue::String("a".into()),
            ParsedValue::String("b".into()),
        ]))
    );
    assert_eq!(parsed.get("other"), Some(&ParsedValue::Int(1)));
}

#[tokio::test]
async fn test_custom_delimiter() {
    let options = ParserOptions::default().with_delimiter("\r\n").with_chunk_size(3);
    let parsed = parse_graph_text("node {\r\n  name: \"a\"\r\n  op: \"Add\"\r\n}\r\n".as_bytes(), &options)
        .await
        .unwrap();
    let node = parsed.get_items("node").next().and_then(ParsedValue::as_object).unwrap();
    assert_eq!(node.get_str("op"), Some("Add"));
}

#[tokio::test]
async fn test_malformed_inputs() {
    let options = ParserOptions::default();
    for text in [
        "node {\n  name: \"a\"\n",
        "}\n",
        "node {\n  garbage\n}\n",
        "node {\n  name: \"unterminated\n}\n",
    ] {
        let err = parse_graph_text(text.as_bytes(), &options).await.unwrap_err();
        assert!(err.is_malformed(), "expected malformed input for {text:?}, got {err}");
    }
}

#[tokio::test]
async fn test_stats_text_returns_step_stats() {
    let step_stats = parse_stats_text(SMALL_STATS.as_bytes(), &ParserOptions::default())
        .await
        .unwrap()
        .unwrap();
    let devices: Vec<_> = step_stats.get_items("dev_stats").collect();
    assert_eq!(devices.len(), 2);
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chunk_boundaries_are_invisible(chunk_size in 1usize..96) {
        let whole = block_on(parse_with_chunk(SMALL_GRAPH, SMALL_GRAPH.len()));
        let chunked = block_on(parse_with_chunk(SMALL_GRAPH, chunk_size));
        prop_assert_eq!(chunked, whole);
    }

    #[test]
    fn prop_generated_nodes_all_parsed(
        names in prop::collection::vec("[a-z]{1,6}(/[a-z]{1,6}){0,3}", 1..20),
        chunk_size in 1usize..48,
    ) {
        let mut text = String::new();
        for name in &names {
            text.push_str(&format!("node {{\n  name: \"{name}\"\n  op: \"Add\"\n}}\n"));
        }
        let parsed = block_on(parse_with_chunk(&text, chunk_size));
        let parsed_names: Vec<String> = parsed
            .get_items("node")
            .filter_map(ParsedValue::as_object)
            .filter_map(|n| n.get_str("name").map(str::to_string))
            .collect();
        prop_assert_eq!(parsed_names, names);
    }
}
