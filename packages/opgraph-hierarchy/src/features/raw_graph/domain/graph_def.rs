//! Typed view of a parsed graph definition

use serde::{Deserialize, Serialize};

use crate::errors::{HierarchyError, Result};
use crate::features::text_format::{ParsedObject, ParsedObjectExt, ParsedValue};

/// One `attr { key value }` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrEntry {
    pub key: String,
    pub value: ParsedValue,
}

/// Node definition as written in the graph text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    pub device: String,
    pub input: Vec<String>,
    pub attr: Vec<AttrEntry>,
}

/// Function signature argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDef {
    pub name: String,
    pub type_name: Option<String>,
}

/// Library function: signature plus body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub input_args: Vec<ArgDef>,
    pub output_args: Vec<ArgDef>,
    pub node_defs: Vec<NodeDef>,
}

/// Graph definition: top-level nodes and the function library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    pub nodes: Vec<NodeDef>,
    pub library: Vec<FunctionDef>,
}

impl GraphDef {
    /// Interpret a parsed graph text
    ///
    /// A definition without any `node` field is an [`HierarchyError::EmptyGraph`].
    /// Single objects in list positions are accepted as one-element lists.
    pub fn from_parsed(parsed: &ParsedObject) -> Result<Self> {
        if !parsed.contains_key("node") {
            return Err(HierarchyError::EmptyGraph);
        }

        let nodes = parsed
            .get_items("node")
            .map(|v| node_def_from(v, "node"))
            .collect::<Result<Vec<_>>>()?;

        let library = match parsed.get_object("library") {
            Some(lib) => lib
                .get_items("function")
                .map(function_def_from)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self { nodes, library })
    }
}

fn expect_object<'a>(value: &'a ParsedValue, what: &str) -> Result<&'a ParsedObject> {
    value
        .as_object()
        .ok_or_else(|| HierarchyError::malformed(0, format!("'{what}' must be an object")))
}

fn node_def_from(value: &ParsedValue, what: &str) -> Result<NodeDef> {
    let obj = expect_object(value, what)?;
    let name = obj
        .get_str("name")
        .ok_or_else(|| HierarchyError::malformed(0, format!("'{what}' without a name")))?;

    let input = obj
        .get_items("input")
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let attr = obj
        .get_items("attr")
        .filter_map(ParsedValue::as_object)
        .filter_map(|a| {
            let key = a.get_str("key")?.to_string();
            let value = a.get("value").cloned().unwrap_or(ParsedValue::Object(ParsedObject::new()));
            Some(AttrEntry { key, value })
        })
        .collect();

    Ok(NodeDef {
        name: name.to_string(),
        op: obj.get_str("op").unwrap_or_default().to_string(),
        device: obj.get_str("device").unwrap_or_default().to_string(),
        input,
        attr,
    })
}

fn arg_defs(signature: &ParsedObject, key: &str) -> Vec<ArgDef> {
    signature
        .get_items(key)
        .filter_map(ParsedValue::as_object)
        .filter_map(|arg| {
            Some(ArgDef {
                name: arg.get_str("name")?.to_string(),
                type_name: arg.get_str("type").map(str::to_string),
            })
        })
        .collect()
}

fn function_def_from(value: &ParsedValue) -> Result<FunctionDef> {
    let obj = expect_object(value, "library.function")?;
    let signature = obj
        .get_object("signature")
        .ok_or_else(|| HierarchyError::malformed(0, "library function without a signature"))?;
    let name = signature
        .get_str("name")
        .ok_or_else(|| HierarchyError::malformed(0, "library function without a name"))?;

    let node_defs = obj
        .get_items("node_def")
        .map(|v| node_def_from(v, "library.function.node_def"))
        .collect::<Result<Vec<_>>>()?;

    Ok(FunctionDef {
        name: name.to_string(),
        input_args: arg_defs(signature, "input_arg"),
        output_args: arg_defs(signature, "output_arg"),
        node_defs,
    })
}
