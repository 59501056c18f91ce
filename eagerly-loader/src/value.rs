//! Attribute and key values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// Floats in [-2^63, 2^63) convert to i64 without saturating.
const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;

/// A value stored on an entity attribute or used as a relation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Unsigned integer above the `i64` range.
    UInt(u64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<Value>),
    /// JSON value.
    Json(serde_json::Value),
}

impl Value {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is falsy.
    ///
    /// `Null`, `false`, `0`, `0.0`, `""`, `"0"`, an empty list and a JSON
    /// null are falsy; everything else is truthy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::UInt(u) => *u == 0,
            Self::Float(f) => *f == 0.0,
            Self::String(s) => s.is_empty() || s == "0",
            Self::List(items) => items.is_empty(),
            Self::Json(json) => json.is_null(),
        }
    }

    /// Get the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get the unsigned integer if this is a non-negative integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(*i).ok(),
            Self::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Canonical representation used to match relation keys.
    ///
    /// Integers and their decimal string form share a representation so that a
    /// `"7"` foreign key finds the entity whose primary key is `7`. Integral
    /// floats inside the `i64` range render as integers; every other float
    /// keeps its exact decimal form. Null and composite values never match.
    pub fn key_repr(&self) -> Option<String> {
        match self {
            Self::Null | Self::List(_) => None,
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::UInt(u) => Some(u.to_string()),
            Self::Float(f) if f.fract() == 0.0 && (I64_MIN..I64_MAX_EXCLUSIVE).contains(f) => {
                Some((*f as i64).to_string())
            }
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Json(json) => match json {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            },
        }
    }

    /// Compare two values of compatible types.
    ///
    /// Integers and floats compare numerically; values of unrelated types are
    /// not ordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Int(b)) => a.partial_cmp(b),
            (Self::UInt(a), Self::UInt(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::UInt(b)) => i128::from(*a).partial_cmp(&i128::from(*b)),
            (Self::UInt(a), Self::Int(b)) => i128::from(*a).partial_cmp(&i128::from(*b)),
            (Self::UInt(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::UInt(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::String(a), Self::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::UInt(u) => write!(f, "{}", u),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "'{}'", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Json(json) => write!(f, "{}", json),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::UInt(v),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => Self::UInt(u),
                (None, None) => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            other @ serde_json::Value::Object(_) => Self::Json(other),
        }
    }
}
