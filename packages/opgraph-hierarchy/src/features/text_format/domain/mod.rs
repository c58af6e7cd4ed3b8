//! Parsed values and the repeated-field schema

pub mod schema;
pub mod value;

pub use schema::{RepeatedFieldSchema, GRAPH_REPEATED_FIELDS, METADATA_REPEATED_FIELDS};
pub use value::{ParsedObject, ParsedObjectExt, ParsedValue};
