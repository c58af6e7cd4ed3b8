//! Naming constants shared by the raw-graph and hierarchy stages

/// Separator between namespace segments of a node name
pub const NAMESPACE_DELIM: char = '/';

/// Name of the synthetic root group
pub const ROOT_NAME: &str = "__root__";

/// Namespace under which function-library definitions are placed
pub const FUNCTION_LIBRARY_NODE_PREFIX: &str = "__function_library__";

/// Op name of the synthetic nodes standing in for function input arguments
pub const INPUT_ARG_OP: &str = "input_arg";

/// Output tensor key assumed when an input carries no `:<slot>` suffix
pub const DEFAULT_OUTPUT_TENSOR_KEY: &str = "0";

/// Name given to op `X` when `X` is also a namespace: `X/(X)`
pub fn strict_name(name: &str) -> String {
    format!("{name}{NAMESPACE_DELIM}({})", leaf_name(name))
}

/// Every proper prefix of `name` ("a/b/c" → ["a", "a/b"])
pub fn hierarchy_path(name: &str) -> Vec<String> {
    let mut path = Vec::new();
    for (i, ch) in name.char_indices() {
        if ch == NAMESPACE_DELIM {
            path.push(name[..i].to_string());
        }
    }
    path
}

/// Last path segment of `name`
pub fn leaf_name(name: &str) -> &str {
    name.rsplit(NAMESPACE_DELIM).next().unwrap_or(name)
}
