//! Text-format parsing
//!
//! Decodes the brace-delimited, line-oriented key/value format into a nested
//! [`ParsedObject`]. The format does not mark repeated fields, so a
//! [`RepeatedFieldSchema`] decides which keys are always lists.
//!
//! ```text
//! node {
//!   name: "a/b"
//!   input: "c"
//! }
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{
    ParsedObject, ParsedObjectExt, ParsedValue, RepeatedFieldSchema, GRAPH_REPEATED_FIELDS,
    METADATA_REPEATED_FIELDS,
};
pub use infrastructure::{for_each_line, parse_graph_text, parse_stats_text, ParseState, TextFormatParser};
