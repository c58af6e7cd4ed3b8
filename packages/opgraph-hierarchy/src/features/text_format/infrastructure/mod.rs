//! Chunked line reader and the parser built on it

pub mod line_stream;
pub mod parser;

pub use line_stream::for_each_line;
pub use parser::{parse_graph_text, parse_stats_text, ParseState, TextFormatParser};
