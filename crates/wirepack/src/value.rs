//! The closed value union shared by every format driver.

use time::OffsetDateTime;

use crate::ext::RawExt;

/// An owned decoded value tree.
///
/// Maps preserve insertion order and allow arbitrary keys; formats that
/// cannot represent a key kind (JSON) stringify it on encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Time(OffsetDateTime),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ext(RawExt),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Converts to a `serde_json::Value` when the tree is representable in
    /// plain JSON. Bytes, times, extensions and non-string map keys return
    /// `None`; the JSON driver itself handles those with its configured
    /// string renderings.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Uint(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for v in arr {
                    out.push(v.to_json()?);
                }
                serde_json::Value::Array(out)
            }
            Value::Map(pairs) => {
                let mut out = serde_json::Map::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let Value::Str(key) = k else { return None };
                    out.insert(key.clone(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Value::Bytes(_) | Value::Time(_) | Value::Ext(_) => return None,
        })
    }
}

/// Result of one naked-dispatch read.
///
/// Scalars are fully consumed. `Array` and `Map` are markers: the container
/// descriptor has been seen but not consumed, so the next
/// `read_array_start`/`read_map_start` call resumes on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Naked {
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Time(OffsetDateTime),
    Array,
    Map,
    Ext { tag: u64, data: Vec<u8> },
}

/// Announced length of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Len {
    Known(usize),
    /// Length unknown up front; elements run until the format's terminator.
    Indefinite,
    /// A nil stood where the container was expected.
    Nil,
}

/// Coarse classification of the next value, for callers that branch on
/// shape before committing to a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Nil,
    Bytes,
    Str,
    Array,
    Map,
    Other,
}
