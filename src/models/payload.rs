use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Loosely typed tree used to merge the generated report with hard numeric
/// data before it leaves the process.
///
/// Unlike `serde_json::Value`, a `Number` leaf may hold NaN or an infinity;
/// `sanitize` is what turns those into `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
}

impl Payload {
    pub fn map() -> Self {
        Payload::Map(BTreeMap::new())
    }

    /// Insert into a `Map`; no-op for any other variant.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Payload>) {
        if let Payload::Map(entries) = self {
            entries.insert(key.into(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Payload> {
        match self {
            Payload::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Lift any serializable value into a payload.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Payload::from)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Payload::Integer(i),
                None => Payload::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Payload::Text(s),
            Value::Array(items) => Payload::List(items.into_iter().map(Payload::from).collect()),
            Value::Object(entries) => Payload::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Payload::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Number(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(value: Vec<Payload>) -> Self {
        Payload::List(value)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Null => serializer.serialize_unit(),
            Payload::Bool(b) => serializer.serialize_bool(*b),
            Payload::Integer(i) => serializer.serialize_i64(*i),
            Payload::Number(n) => serializer.serialize_f64(*n),
            Payload::Text(s) => serializer.serialize_str(s),
            Payload::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Payload::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
