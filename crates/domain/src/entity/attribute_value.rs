//! Typed attribute values attached to entities.

use serde::{Deserialize, Serialize};

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Interpret the value as a non-negative integer (feature bitmasks).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value, or any element of it when it is a list, equals
    /// one of `allowed`.
    #[must_use]
    pub fn intersects(&self, allowed: &[serde_json::Value]) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item.intersects(allowed)),
            Self::Json(serde_json::Value::Array(items)) => items
                .iter()
                .any(|item| allowed.iter().any(|a| json_eq(item, a))),
            scalar => {
                let value = scalar.to_json();
                allowed.iter().any(|a| json_eq(&value, a))
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Json(v) => v.clone(),
        }
    }
}

/// JSON equality that treats `1` and `1.0` as the same number.
fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}
