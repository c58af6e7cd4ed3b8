//! Raw graph builder
//!
//! # Algorithm
//! 1. Turn every node def (graph nodes, then each library function's
//!    synthetic nodes and prefixed body) into an [`OpNode`], classifying it as
//!    regular, in-embedding or out-embedding by op pattern.
//! 2. Compute strict names: an op whose name is also a namespace of a
//!    regular node becomes `name/(leaf)`.
//! 3. Attach embeddings to their hosts and emit one [`BaseEdge`] per input,
//!    rerouting inputs of embeddings onto the host. Self-loops are dropped.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::BuildParams;
use crate::errors::Result;
use crate::features::raw_graph::domain::models::slot_of;
use crate::features::raw_graph::domain::{
    AttrEntry, BaseEdge, FunctionDef, GraphDef, NodeDef, NormalizedInput, OpNode, OutputShape,
    RawGraph,
};
use crate::features::text_format::{ParsedObjectExt, ParsedValue};
use crate::shared::{
    hierarchy_path, strict_name, DEFAULT_OUTPUT_TENSOR_KEY, FUNCTION_LIBRARY_NODE_PREFIX,
    INPUT_ARG_OP, NAMESPACE_DELIM,
};

const OUTPUT_SHAPES_KEY: &str = "_output_shapes";
const XLA_CLUSTER_KEY: &str = "_XlaCluster";

static FUNCTION_OUTPUT_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*):(\w+:\d+)$").expect("static regex"));
static SLOT_INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*):(\d+)$").expect("static regex"));

/// Strip control markers and output slots from raw input names
///
/// `^x` is a control dependency on `x`; `x:2` and `x:out:2` name an output of
/// `x`. Consecutive inputs from the same node collapse into one.
pub fn normalize_inputs<S: AsRef<str>>(inputs: &[S]) -> Vec<NormalizedInput> {
    let mut normalized: Vec<NormalizedInput> = Vec::with_capacity(inputs.len());
    for raw in inputs {
        let raw = raw.as_ref();
        let (is_control_dependency, raw) = match raw.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let (name, key) = match FUNCTION_OUTPUT_INPUT
            .captures(raw)
            .or_else(|| SLOT_INPUT.captures(raw))
        {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => (raw.to_string(), DEFAULT_OUTPUT_TENSOR_KEY.to_string()),
        };

        if normalized.last().map(|last| last.name != name).unwrap_or(true) {
            normalized.push(NormalizedInput {
                name,
                output_tensor_key: key,
                is_control_dependency,
            });
        }
    }
    normalized
}

fn extract_output_shapes(attr: &mut Vec<AttrEntry>) -> Option<Vec<OutputShape>> {
    let pos = attr.iter().position(|a| a.key == OUTPUT_SHAPES_KEY)?;
    let shapes = attr[pos]
        .value
        .as_object()
        .and_then(|v| v.get_object("list"))
        .filter(|list| list.contains_key("shape"))?;

    let result = shapes
        .get_items("shape")
        .map(|shape| {
            let shape = shape.as_object()?;
            if shape.get("unknown_rank").and_then(ParsedValue::as_bool) == Some(true) {
                return None;
            }
            let dims: Vec<_> = shape.get_items("dim").filter_map(ParsedValue::as_object).collect();
            if dims.is_empty() || (dims.len() == 1 && !dims[0].contains_key("size")) {
                return Some(Vec::new());
            }
            Some(dims.iter().map(|d| d.get_i64("size").unwrap_or(-1)).collect())
        })
        .collect();

    attr.remove(pos);
    Some(result)
}

fn extract_xla_cluster(attr: &[AttrEntry]) -> Option<String> {
    attr.iter()
        .find(|a| a.key == XLA_CLUSTER_KEY)
        .and_then(|a| a.value.as_object())
        .and_then(|v| v.get_str("s"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn op_node_from(def: NodeDef) -> OpNode {
    let mut attr = def.attr;
    let output_shapes = extract_output_shapes(&mut attr);
    let xla_cluster = extract_xla_cluster(&attr);
    OpNode {
        inputs: normalize_inputs(&def.input),
        name: def.name,
        op: def.op,
        device: Some(def.device).filter(|d| !d.is_empty()),
        attr,
        output_shapes,
        xla_cluster,
        ..OpNode::default()
    }
}

/// Map of renames for op names that collide with namespaces
///
/// `node_names` are the regular nodes; an embedding is renamed when its name
/// is a namespace of some regular node.
pub fn map_strict_hierarchy(node_names: &[String], embedding_names: &[String]) -> AHashMap<String, String> {
    let mut renames = AHashMap::new();
    let mut namespaces: AHashSet<String> = AHashSet::new();

    let mut sorted: Vec<&str> = node_names.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    for (i, a) in sorted.iter().enumerate() {
        namespaces.extend(hierarchy_path(a));
        for b in &sorted[i + 1..] {
            if !b.starts_with(a) {
                break;
            }
            if b[a.len()..].starts_with(NAMESPACE_DELIM) {
                renames.insert(a.to_string(), strict_name(a));
                break;
            }
        }
    }

    for name in embedding_names {
        if namespaces.contains(name) {
            renames.insert(name.clone(), strict_name(name));
        }
    }
    renames
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Regular,
    InEmbedding,
    OutEmbedding,
}

/// Builds a [`RawGraph`] from a [`GraphDef`]
pub struct RawGraphBuilder {
    params: BuildParams,
    in_patterns: Vec<Regex>,
    out_patterns: Vec<Regex>,
}

impl RawGraphBuilder {
    pub fn new(params: BuildParams) -> Result<Self> {
        let in_patterns = params.compile_in_embedding_patterns()?;
        let out_patterns = params.compile_out_embedding_patterns()?;
        Ok(Self {
            params,
            in_patterns,
            out_patterns,
        })
    }

    fn role_of(&self, node: &OpNode) -> Role {
        if self.in_patterns.iter().any(|p| p.is_match(&node.op)) {
            Role::InEmbedding
        } else if self.out_patterns.iter().any(|p| p.is_match(&node.op)) {
            Role::OutEmbedding
        } else {
            Role::Regular
        }
    }

    fn is_reference_edge(&self, consumer_op: &str, input_index: usize) -> bool {
        self.params
            .ref_edges
            .contains(&format!("{consumer_op} {input_index}"))
    }

    /// Synthetic nodes for one library function, in definition order
    fn expand_function(func: &FunctionDef) -> Vec<OpNode> {
        let fn_node_name = format!("{FUNCTION_LIBRARY_NODE_PREFIX}{}", func.name);
        let mut nodes = vec![OpNode::new(fn_node_name.clone(), "")];

        for (i, arg) in func.input_args.iter().enumerate() {
            let mut node = OpNode::new(format!("{fn_node_name}{NAMESPACE_DELIM}{}", arg.name), INPUT_ARG_OP);
            if let Some(ty) = &arg.type_name {
                let mut value = crate::features::text_format::ParsedObject::new();
                value.insert("type".to_string(), ParsedValue::String(ty.clone()));
                node.attr.push(AttrEntry {
                    key: "T".to_string(),
                    value: ParsedValue::Object(value),
                });
            }
            node.function_input_index = Some(i);
            nodes.push(node);
        }

        let output_index: BTreeMap<String, usize> = func
            .output_args
            .iter()
            .enumerate()
            .map(|(i, arg)| (format!("{fn_node_name}{NAMESPACE_DELIM}{}", arg.name), i))
            .collect();

        for def in &func.node_defs {
            let mut def = def.clone();
            def.name = format!("{fn_node_name}{NAMESPACE_DELIM}{}", def.name);
            let mut node = op_node_from(def);
            node.function_output_index = output_index.get(&node.name).copied();
            for input in &mut node.inputs {
                input.name = format!("{fn_node_name}{NAMESPACE_DELIM}{}", input.name);
            }
            nodes.push(node);
        }
        nodes
    }

    pub fn build(&self, graph_def: &GraphDef) -> Result<RawGraph> {
        let mut all: Vec<OpNode> = graph_def.nodes.iter().cloned().map(op_node_from).collect();
        for func in &graph_def.library {
            all.extend(Self::expand_function(func));
        }

        // Step 1: classify
        let mut regular: Vec<OpNode> = Vec::new();
        let mut in_embedding: AHashMap<String, OpNode> = AHashMap::new();
        let mut out_embedding: AHashMap<String, OpNode> = AHashMap::new();
        let mut embedding_names: Vec<String> = Vec::new();
        for node in all {
            match self.role_of(&node) {
                Role::Regular => regular.push(node),
                Role::InEmbedding => {
                    embedding_names.push(node.name.clone());
                    in_embedding.insert(node.name.clone(), node);
                }
                Role::OutEmbedding => {
                    embedding_names.push(node.name.clone());
                    out_embedding.insert(node.name.clone(), node);
                }
            }
        }

        // Step 2: strict names
        let regular_names: Vec<String> = regular.iter().map(|n| n.name.clone()).collect();
        let renames = map_strict_hierarchy(&regular_names, &embedding_names);
        let resolve = |name: &str| renames.get(name).cloned().unwrap_or_else(|| name.to_string());
        for (from, to) in &renames {
            debug!(from = %from, to = %to, "Renamed op to strict name");
        }

        // Out-embeddings hang off the node they consume, keyed by original name
        let mut out_embeddings_of: BTreeMap<String, Vec<OpNode>> = BTreeMap::new();
        let mut out_sorted: Vec<&OpNode> = out_embedding.values().collect();
        out_sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for embed in out_sorted {
            let mut renamed = embed.clone();
            renamed.name = resolve(&embed.name);
            for input in &mut renamed.inputs {
                input.name = resolve(&input.name);
            }
            for input in &embed.inputs {
                out_embeddings_of
                    .entry(input.name.clone())
                    .or_default()
                    .push(renamed.clone());
            }
        }

        // Step 3: nodes, embeddings and edges
        let mut graph = RawGraph::new();
        let mut edges: Vec<BaseEdge> = Vec::new();
        for mut node in regular {
            if let Some(embeds) = out_embeddings_of.remove(&node.name) {
                node.out_embeddings = embeds;
            }
            node.name = resolve(&node.name);

            let mut attached: Vec<OpNode> = Vec::new();
            for (i, input) in node.inputs.iter().enumerate() {
                if let Some(embed) = in_embedding.get(&input.name) {
                    for embed_input in &embed.inputs {
                        self.push_edge(&mut edges, resolve(&embed_input.name), &node, embed_input, i);
                    }
                    let mut embed = embed.clone();
                    embed.name = resolve(&embed.name);
                    for embed_input in &mut embed.inputs {
                        embed_input.name = resolve(&embed_input.name);
                    }
                    attached.push(embed);
                } else if let Some(embed) = out_embedding.get(&input.name) {
                    for embed_input in &embed.inputs {
                        self.push_edge(&mut edges, resolve(&embed_input.name), &node, input, i);
                    }
                } else {
                    self.push_edge(&mut edges, resolve(&input.name), &node, input, i);
                }
            }
            for input in &mut node.inputs {
                input.name = resolve(&input.name);
            }
            node.in_embeddings = attached;

            if let Some(previous) = graph.add_node(node) {
                warn!(name = %previous.name, "Duplicate node name, keeping the later definition");
            }
        }
        for edge in edges {
            graph.add_edge(edge);
        }

        info!(
            nodes = graph.len(),
            edges = graph.edges.len(),
            embeddings = embedding_names.len(),
            functions = graph_def.library.len(),
            "Built raw graph"
        );
        Ok(graph)
    }

    fn push_edge(
        &self,
        edges: &mut Vec<BaseEdge>,
        source: String,
        consumer: &OpNode,
        input: &NormalizedInput,
        index: usize,
    ) {
        if source == consumer.name {
            return;
        }
        edges.push(BaseEdge {
            source,
            target: consumer.name.clone(),
            output_slot: slot_of(&input.output_tensor_key),
            output_tensor_key: input.output_tensor_key.clone(),
            is_control_dependency: input.is_control_dependency,
            is_reference_edge: self.is_reference_edge(&consumer.op, index),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn def(name: &str, op: &str, inputs: &[&str]) -> NodeDef {
        NodeDef {
            name: name.to_string(),
            op: op.to_string(),
            input: inputs.iter().map(|s| s.to_string()).collect(),
            ..NodeDef::default()
        }
    }

    fn build(nodes: Vec<NodeDef>) -> RawGraph {
        let graph_def = GraphDef {
            nodes,
            library: Vec::new(),
        };
        RawGraphBuilder::new(BuildParams::default())
            .unwrap()
            .build(&graph_def)
            .unwrap()
    }

    #[test]
    fn test_normalize_inputs() {
        let inputs = normalize_inputs(&["^a", "b:1", "f:out:2", "c", "c:1"]);
        assert_eq!(inputs.len(), 4);
        assert_eq!(inputs[0].name, "a");
        assert!(inputs[0].is_control_dependency);
        assert_eq!(inputs[1].name, "b");
        assert_eq!(inputs[1].output_tensor_key, "1");
        assert_eq!(inputs[2].name, "f");
        assert_eq!(inputs[2].output_tensor_key, "out:2");
        assert_eq!(inputs[3].name, "c");
        assert_eq!(inputs[3].output_tensor_key, "0");
    }

    #[test]
    fn test_strict_hierarchy() {
        let names = vec!["a".to_string(), "a/b".to_string(), "ab".to_string()];
        let renames = map_strict_hierarchy(&names, &["a/b/c".to_string(), "ab".to_string()]);
        assert_eq!(renames.get("a").map(String::as_str), Some("a/(a)"));
        assert!(!renames.contains_key("ab"));
        assert!(!renames.contains_key("a/b/c"));

        let renames = map_strict_hierarchy(&["x/y".to_string()], &["x".to_string()]);
        assert_eq!(renames.get("x").map(String::as_str), Some("x/(x)"));
    }

    #[test]
    fn test_edges_and_renaming() {
        let graph = build(vec![
            def("a", "Add", &[]),
            def("a/b", "Mul", &["a", "^c"]),
            def("c", "NoOp", &["c"]),
        ]);
        assert!(graph.contains("a/(a)"));
        assert!(!graph.contains("a"));
        let edges: Vec<_> = graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.is_control_dependency))
            .collect();
        assert_eq!(edges, vec![("a/(a)", "a/b", false), ("c", "a/b", true)]);
        assert_eq!(graph.node("a/b").unwrap().inputs[0].name, "a/(a)");
    }

    #[test]
    fn test_in_embedding_moves_inputs_to_host() {
        let graph = build(vec![
            def("init", "NoOp", &[]),
            def("w", "Const", &["^init"]),
            def("m", "MatMul", &["w"]),
        ]);
        assert!(!graph.contains("w"));
        let host = graph.node("m").unwrap();
        assert_eq!(host.in_embeddings.len(), 1);
        assert_eq!(host.in_embeddings[0].name, "w");
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source, "init");
        assert_eq!(graph.edges[0].target, "m");
        assert!(graph.edges[0].is_control_dependency);
    }

    #[test]
    fn test_out_embedding_attached_to_producer() {
        let graph = build(vec![
            def("loss", "Mean", &[]),
            def("loss_summary", "ScalarSummary", &["loss"]),
        ]);
        let host = graph.node("loss").unwrap();
        assert_eq!(host.out_embeddings.len(), 1);
        assert_eq!(host.out_embeddings[0].op, "ScalarSummary");
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_reference_edges() {
        let graph = build(vec![
            def("v", "VariableV2", &[]),
            def("x", "Add", &[]),
            def("assign", "Assign", &["v", "x"]),
        ]);
        let refs: Vec<bool> = graph.edges.iter().map(|e| e.is_reference_edge).collect();
        assert_eq!(refs, vec![true, false]);
    }

    #[test]
    fn test_function_library_expansion() {
        let func = FunctionDef {
            name: "f".to_string(),
            input_args: vec![crate::features::raw_graph::domain::ArgDef {
                name: "x".to_string(),
                type_name: Some("DT_FLOAT".to_string()),
            }],
            output_args: vec![crate::features::raw_graph::domain::ArgDef {
                name: "y".to_string(),
                type_name: None,
            }],
            node_defs: vec![def("y", "Identity", &["x"])],
        };
        let graph_def = GraphDef {
            nodes: vec![def("call", "f", &[])],
            library: vec![func],
        };
        let graph = RawGraphBuilder::new(BuildParams::default())
            .unwrap()
            .build(&graph_def)
            .unwrap();

        // The function node is also the namespace of its body
        assert!(!graph.contains("__function_library__f"));
        let fn_node = graph
            .node("__function_library__f/(__function_library__f)")
            .unwrap();
        assert_eq!(fn_node.op, "");
        let arg = graph.node("__function_library__f/x").unwrap();
        assert_eq!(arg.op, INPUT_ARG_OP);
        assert_eq!(arg.function_input_index, Some(0));
        let out = graph.node("__function_library__f/y").unwrap();
        assert_eq!(out.function_output_index, Some(0));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.source == "__function_library__f/x" && e.target == "__function_library__f/y"));
    }

    #[test]
    fn test_output_shapes_extracted() {
        let text = r#"
node {
  name: "a"
  op: "Add"
  attr {
    key: "_output_shapes"
    value {
      list {
        shape {
          dim {
            size: 4
          }
          dim {
            size: -1
          }
        }
        shape {
          unknown_rank: true
        }
        shape {
        }
      }
    }
  }
  attr {
    key: "_XlaCluster"
    value {
      s: "cluster_0"
    }
  }
}
"#;
        let schema = crate::features::text_format::RepeatedFieldSchema::graph();
        let mut state = crate::features::text_format::ParseState::new(&schema);
        for (i, line) in text.lines().enumerate() {
            state.feed_line(i + 1, line).unwrap();
        }
        let parsed = state.finish().unwrap();
        let graph_def = GraphDef::from_parsed(&parsed).unwrap();
        let graph = RawGraphBuilder::new(BuildParams::default())
            .unwrap()
            .build(&graph_def)
            .unwrap();
        let node = graph.node("a").unwrap();
        assert_eq!(
            node.output_shapes,
            Some(vec![Some(vec![4, -1]), None, Some(vec![])])
        );
        assert_eq!(node.xla_cluster.as_deref(), Some("cluster_0"));
        assert_eq!(node.attr.len(), 1);
    }
}
