//! Configuration document value type.
//!
//! Fragments are a closed tagged variant: a scalar, a sequence, or a mapping
//! of string keys. Documents enter through [`Value::from_json`] (or serde) and
//! never carry untyped data past that point.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SchemaViolation, ViolationReason};
use crate::path::KeyPath;

/// Ordered mapping of keys to values.
pub type Mapping = BTreeMap<String, Value>;

/// A configuration document node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

/// Leaf values.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Kind of a value, used in violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Sequence,
    Mapping,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl Value {
    /// An empty mapping, the fragment of a node that was never configured.
    pub fn empty() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// Explicit null.
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(Scalar::Null) => ValueKind::Null,
            Value::Scalar(Scalar::Bool(_)) => ValueKind::Bool,
            Value::Scalar(Scalar::Integer(_)) => ValueKind::Integer,
            Value::Scalar(Scalar::Float(_)) => ValueKind::Float,
            Value::Scalar(Scalar::String(_)) => ValueKind::String,
            Value::Sequence(_) => ValueKind::Sequence,
            Value::Mapping(_) => ValueKind::Mapping,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    /// True for a mapping with no keys.
    pub fn is_empty_mapping(&self) -> bool {
        matches!(self, Value::Mapping(map) if map.is_empty())
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Follow a key path through nested mappings.
    pub fn get_path(&self, path: &KeyPath) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Convert from an untyped JSON document.
    ///
    /// Fails only for integers that do not fit in an `i64`; they are never
    /// silently widened to floats.
    pub fn from_json(json: serde_json::Value) -> Result<Self, SchemaViolation> {
        let mut path = KeyPath::root();
        Self::from_json_at(&mut path, json)
    }

    fn from_json_at(path: &mut KeyPath, json: serde_json::Value) -> Result<Self, SchemaViolation> {
        Ok(match json {
            serde_json::Value::Null => Value::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Scalar(Scalar::Integer(i))
                } else if n.is_f64() {
                    Value::Scalar(Scalar::Float(n.as_f64().unwrap_or_default()))
                } else {
                    return Err(SchemaViolation::new(
                        path.clone(),
                        ViolationReason::IntegerOutOfRange(n.to_string()),
                    ));
                }
            }
            serde_json::Value::String(s) => Value::Scalar(Scalar::String(s)),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    path.push(format!("[{}]", i));
                    out.push(Self::from_json_at(path, item)?);
                    path.pop();
                }
                Value::Sequence(out)
            }
            serde_json::Value::Object(map) => {
                let mut out = Mapping::new();
                for (key, item) in map {
                    path.push(key.clone());
                    let converted = Self::from_json_at(path, item)?;
                    path.pop();
                    out.insert(key, converted);
                }
                Value::Mapping(out)
            }
        })
    }

    /// Convert to an untyped JSON document.
    ///
    /// Non-finite floats have no JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Scalar(Scalar::Null) => serde_json::Value::Null,
            Value::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::Scalar(Scalar::Integer(i)) => serde_json::Value::Number((*i).into()),
            Value::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Scalar(Scalar::String(s)) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Integer(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = SchemaViolation;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Value::from_json(json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(scalar) => scalar.serialize(serializer),
            Value::Sequence(items) => items.serialize(serializer),
            Value::Mapping(map) => map.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_preserves_kinds() {
        let value = Value::from_json(json!({
            "name": "planner",
            "retries": 3,
            "ratio": 0.5,
            "enabled": true,
            "dest": ["slack"],
            "unset": null
        }))
        .unwrap();

        assert_eq!(value.get("name").unwrap().kind(), ValueKind::String);
        assert_eq!(value.get("retries").unwrap().as_i64(), Some(3));
        assert_eq!(value.get("ratio").unwrap().kind(), ValueKind::Float);
        assert_eq!(value.get("enabled").unwrap().as_bool(), Some(true));
        assert_eq!(value.get("dest").unwrap().kind(), ValueKind::Sequence);
        assert!(value.get("unset").unwrap().is_null());
    }

    #[test]
    fn test_large_unsigned_integer_rejected() {
        let err = Value::from_json(json!({"limits": {"max": u64::MAX}})).unwrap_err();
        assert_eq!(err.path.to_string(), "limits.max");
        assert!(matches!(err.reason, ViolationReason::IntegerOutOfRange(_)));
    }

    #[test]
    fn test_json_round_trip_through_serde() {
        let original = json!({"a": {"b": [1, "two", false]}, "c": 1.5});
        let value: Value = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), original);
        assert_eq!(value.to_json(), original);
    }

    #[test]
    fn test_get_path() {
        let value = Value::from_json(json!({"agents": {"planner": {"model": "m1"}}})).unwrap();
        let path = KeyPath::parse("agents.planner.model");
        assert_eq!(value.get_path(&path).and_then(Value::as_str), Some("m1"));
        assert!(value.get_path(&KeyPath::parse("agents.coder")).is_none());
    }

    #[test]
    fn test_empty_is_mapping() {
        assert!(Value::empty().is_empty_mapping());
        assert_eq!(Value::default(), Value::empty());
    }
}
