//! # Generic Configuration Tree
//!
//! Schema-agnostic representation of decoded markup. The decoder produces it,
//! the normalizer rewrites it and the binder consumes it.

use serde::Serialize;
use std::collections::BTreeMap;

/// Mapping node of the generic tree.
pub type Map = BTreeMap<String, Value>;

/// A node of the generic configuration tree.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Tagged variant for everything the markup can express, so the normalizer
/// and binder can pattern-match exhaustively.
///
/// ## Variants
/// - `Map`: mapping of string keys to values (block bodies, objects)
/// - `Sequence`: ordered values (lists, repeated blocks)
/// - `String`, `Integer`, `Float`, `Bool`: scalars
/// - `Absent`: explicit "declared but empty" marker written by the
///   normalizer when a repeated block collapses to nothing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Map(Map),
    Sequence(Vec<Value>),
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Absent,
}

impl Value {
    /// Short human-readable name of the variant, used in bind errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Map(_) => "mapping",
            Value::Sequence(_) => "sequence",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Absent => "absent",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// True for a sequence whose every element is a mapping (the decoded
    /// shape of a block). An empty sequence counts.
    pub fn is_block_sequence(&self) -> bool {
        match self {
            Value::Sequence(items) => items.iter().all(|v| matches!(v, Value::Map(_))),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Map(m)
    }
}

impl From<serde_json::Value> for Value {
    /// Converts a JSON document node. Objects below the root are wrapped in a
    /// one-element sequence, matching how the markup decodes blocks.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json_element).collect())
            }
            serde_json::Value::Object(obj) => Value::Sequence(vec![Value::Map(json_object(obj))]),
        }
    }
}

impl Value {
    // Objects directly inside an array are already list elements.
    fn from_json_element(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(obj) => Value::Map(json_object(obj)),
            other => Value::from(other),
        }
    }
}

/// Converts a JSON object into a mapping, recursing into its members.
pub(crate) fn json_object(obj: serde_json::Map<String, serde_json::Value>) -> Map {
    obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}
