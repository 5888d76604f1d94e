//! The dynamic value that crosses the row boundary (Design Note "Dynamic
//! value types at the row boundary"). Defined once here and reused by
//! [`crate::codec`], [`crate::table`] and [`crate::database`] instead of
//! re-derived at each layer.
//!
//! `Value` derives `Serialize` only: an untagged `Deserialize` can't
//! distinguish `Id`/`Text` (both plain JSON strings) or `Number`/`Date` (both
//! plain JSON numbers) without knowing the target column's declared type.
//! Per the Design Note, that disambiguation belongs to whoever holds the
//! schema — the table runtime (already typed, never touches JSON) or the
//! out-of-scope HTTP layer, which should coerce each field's raw JSON value
//! against its column's `ColumnType` rather than deserializing into `Value`
//! directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A single column's value, or the absence of one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Id(String),
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(f64),
    Coordinates { lat: f64, lng: f64 },
    Buffer(Vec<u8>),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Id(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) | Value::Date(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Value::Buffer(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Value::Coordinates { lat, lng } => Some((*lat, *lng)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Id(s) | Value::Text(s) => write!(f, "{s}"),
            Value::Number(n) | Value::Date(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Coordinates { lat, lng } => write!(f, "({lat}, {lng})"),
            Value::Buffer(b) => write!(f, "<{} bytes>", b.len()),
            Value::Null => write!(f, "null"),
        }
    }
}

/// A row is an ordered-by-insertion mapping from column name to [`Value`].
/// `BTreeMap` gives deterministic iteration order for tests and JSON output
/// without pulling in an indexmap dependency the rest of the stack doesn't use.
pub type Row = BTreeMap<String, Value>;
