//! Text-format parser
//!
//! Per trimmed line:
//! - ends in `{`: open a nested object named by the text before it
//! - exactly `}`: close the innermost object
//! - otherwise: `name: value`, split on the first `:`
//!
//! Values are attached with the repeated-field rule: a path in the schema is
//! always a list, any other key is a scalar until it occurs again.

use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::config::ParserOptions;
use crate::errors::{HierarchyError, Result};
use crate::features::text_format::domain::{ParsedObject, ParsedValue, RepeatedFieldSchema};

use super::line_stream::for_each_line;

/// An object still being filled
#[derive(Debug)]
struct Frame {
    name: String,
    /// Dotted schema path of this object
    path: String,
    fields: ParsedObject,
    opened_at: usize,
}

/// Line-by-line parse state
///
/// Usable on its own for already-split input; [`TextFormatParser`] drives it
/// from an async byte stream.
#[derive(Debug)]
pub struct ParseState<'s> {
    schema: &'s RepeatedFieldSchema,
    root: ParsedObject,
    stack: Vec<Frame>,
}

impl<'s> ParseState<'s> {
    pub fn new(schema: &'s RepeatedFieldSchema) -> Self {
        Self {
            schema,
            root: ParsedObject::new(),
            stack: Vec::new(),
        }
    }

    pub fn feed_line(&mut self, line_no: usize, raw_line: &str) -> Result<()> {
        let line = raw_line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if line == "}" {
            return self.close_object(line_no);
        }

        if let Some(head) = line.strip_suffix('{') {
            let head = head.trim();
            let name = head.strip_suffix(':').unwrap_or(head).trim();
            if name.is_empty() {
                return Err(HierarchyError::malformed(line_no, "object without a field name"));
            }
            let path = self.child_path(name);
            self.stack.push(Frame {
                name: name.to_string(),
                path,
                fields: ParsedObject::new(),
                opened_at: line_no,
            });
            return Ok(());
        }

        let (name, raw_value) = line
            .split_once(':')
            .ok_or_else(|| HierarchyError::malformed(line_no, format!("expected 'name: value', got '{line}'")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(HierarchyError::malformed(line_no, "attribute without a field name"));
        }
        let value = ParsedValue::parse_scalar(raw_value.trim())
            .ok_or_else(|| HierarchyError::malformed(line_no, format!("unterminated string in '{name}'")))?;

        let path = self.child_path(name);
        let repeated = self.schema.is_repeated(&path);
        add_attribute(self.current_mut(), name, value, repeated);
        Ok(())
    }

    /// Finish parsing; fails if any object is still open
    pub fn finish(self) -> Result<ParsedObject> {
        if let Some(open) = self.stack.last() {
            return Err(HierarchyError::malformed(
                open.opened_at,
                format!("object '{}' is never closed", open.path),
            ));
        }
        Ok(self.root)
    }

    fn close_object(&mut self, line_no: usize) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| HierarchyError::malformed(line_no, "'}' without an open object"))?;
        let repeated = self.schema.is_repeated(&frame.path);
        add_attribute(
            self.current_mut(),
            &frame.name,
            ParsedValue::Object(frame.fields),
            repeated,
        );
        Ok(())
    }

    fn current_mut(&mut self) -> &mut ParsedObject {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.fields,
            None => &mut self.root,
        }
    }

    fn child_path(&self, name: &str) -> String {
        match self.stack.last() {
            Some(frame) => format!("{}.{}", frame.path, name),
            None => name.to_string(),
        }
    }
}

/// Attach `value` under `name`, promoting to a list on repetition
fn add_attribute(container: &mut ParsedObject, name: &str, value: ParsedValue, repeated: bool) {
    match container.get_mut(name) {
        None => {
            let stored = if repeated {
                ParsedValue::List(vec![value])
            } else {
                value
            };
            container.insert(name.to_string(), stored);
        }
        Some(ParsedValue::List(items)) => items.push(value),
        Some(existing) => {
            let first = std::mem::replace(existing, ParsedValue::List(Vec::with_capacity(2)));
            if let ParsedValue::List(items) = existing {
                items.push(first);
                items.push(value);
            }
        }
    }
}

/// Streaming text-format parser bound to one schema
#[derive(Debug, Clone)]
pub struct TextFormatParser {
    schema: RepeatedFieldSchema,
    options: ParserOptions,
}

impl TextFormatParser {
    pub fn new(schema: RepeatedFieldSchema) -> Self {
        Self {
            schema,
            options: ParserOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &RepeatedFieldSchema {
        &self.schema
    }

    /// Parse a whole stream. No partial result is returned on error.
    pub async fn parse<R>(&self, reader: R) -> Result<ParsedObject>
    where
        R: AsyncRead + Unpin,
    {
        let mut state = ParseState::new(&self.schema);
        let mut lines = 0usize;
        for_each_line(reader, &self.options, |line_no, line| {
            lines = line_no;
            state.feed_line(line_no, line)
        })
        .await?;
        let parsed = state.finish()?;
        debug!(lines, top_level_fields = parsed.len(), "Parsed text-format input");
        Ok(parsed)
    }

    pub async fn parse_bytes(&self, input: &[u8]) -> Result<ParsedObject> {
        self.parse(input).await
    }
}

/// Parse a graph definition
pub async fn parse_graph_text<R>(reader: R, options: &ParserOptions) -> Result<ParsedObject>
where
    R: AsyncRead + Unpin,
{
    let parsed = TextFormatParser::new(RepeatedFieldSchema::graph())
        .with_options(options.clone())
        .parse(reader)
        .await?;
    info!(
        nodes = parsed.get("node").map(|n| n.items().count()).unwrap_or(0),
        "Parsed graph text"
    );
    Ok(parsed)
}

/// Parse run metadata and return its `step_stats` object, if any
pub async fn parse_stats_text<R>(reader: R, options: &ParserOptions) -> Result<Option<ParsedObject>>
where
    R: AsyncRead + Unpin,
{
    let mut parsed = TextFormatParser::new(RepeatedFieldSchema::metadata())
        .with_options(options.clone())
        .parse(reader)
        .await?;
    Ok(match parsed.remove("step_stats") {
        Some(ParsedValue::Object(stats)) => Some(stats),
        _ => None,
    })
}
