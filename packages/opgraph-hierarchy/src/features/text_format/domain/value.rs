//! Parsed value tree

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Nested object keyed by field name
pub type ParsedObject = BTreeMap<String, ParsedValue>;

/// One field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParsedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ParsedValue>),
    Object(ParsedObject),
}

impl ParsedValue {
    /// Decode a scalar field value
    ///
    /// `true`/`false` are booleans, a leading `"` is a quoted string with the
    /// wrapping quotes stripped, numerics become `Int` or `Float`, anything
    /// else (enum identifiers such as `DT_FLOAT`) stays a raw string.
    /// Returns `None` for a quoted string without its closing quote.
    pub fn parse_scalar(raw: &str) -> Option<ParsedValue> {
        match raw {
            "true" => return Some(ParsedValue::Bool(true)),
            "false" => return Some(ParsedValue::Bool(false)),
            _ => {}
        }

        if let Some(rest) = raw.strip_prefix('"') {
            let inner = rest.strip_suffix('"')?;
            return Some(ParsedValue::String(inner.to_string()));
        }

        if looks_numeric(raw) {
            if let Ok(i) = raw.parse::<i64>() {
                return Some(ParsedValue::Int(i));
            }
            if let Ok(f) = raw.parse::<f64>() {
                return Some(ParsedValue::Float(f));
            }
        }

        Some(ParsedValue::String(raw.to_string()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParsedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParsedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; integral floats and numeric strings count
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParsedValue::Int(i) => Some(*i),
            ParsedValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParsedValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParsedValue::Int(i) => Some(*i as f64),
            ParsedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ParsedObject> {
        match self {
            ParsedValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParsedValue]> {
        match self {
            ParsedValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Elements of a list, or the value itself when it is a single occurrence
    pub fn items(&self) -> std::slice::Iter<'_, ParsedValue> {
        match self {
            ParsedValue::List(l) => l.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }
}

fn looks_numeric(raw: &str) -> bool {
    let first_ok = raw
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    first_ok && raw.chars().any(|c| c.is_ascii_digit())
}

/// Typed accessors over a [`ParsedObject`]
pub trait ParsedObjectExt {
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn get_object(&self, key: &str) -> Option<&ParsedObject>;
    /// Every occurrence of `key`, whether stored as a list or a single value
    fn get_items(&self, key: &str) -> std::slice::Iter<'_, ParsedValue>;
}

impl ParsedObjectExt for ParsedObject {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParsedValue::as_str)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ParsedValue::as_i64)
    }

    fn get_object(&self, key: &str) -> Option<&ParsedObject> {
        self.get(key).and_then(ParsedValue::as_object)
    }

    fn get_items(&self, key: &str) -> std::slice::Iter<'_, ParsedValue> {
        match self.get(key) {
            Some(value) => value.items(),
            None => [].iter(),
        }
    }
}
