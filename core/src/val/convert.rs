use std::sync::Arc;

use anyhow::Result;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::VmError;

use super::{OrderedHash, Value};

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(Arc::new(bytes))
    }
}

impl From<Vec<Value>> for Value {
    /// Vectors become arrays; use `Value::list` for pair lists.
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl Value {
    /// Objects become hashes keyed by string, arrays become arrays.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Int(BigInt::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                let items = items.into_iter().map(Value::from_json).collect::<Result<Vec<_>>>()?;
                Value::array(items)
            }
            serde_json::Value::Object(obj) => {
                let mut map = OrderedHash::with_capacity(obj.len());
                for (k, v) in obj {
                    map.insert(Value::from(k), Value::from_json(v)?)?;
                }
                Value::hash(map)
            }
        })
    }
}

impl Value {
    /// Int or float as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => i.to_f64(),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Int that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => i.to_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Non-negative int usable as an index.
    pub fn as_index(&self) -> Result<usize> {
        match self {
            Value::Int(i) => i
                .to_usize()
                .ok_or_else(|| VmError::user(format!("index {} out of range", i)).into()),
            other => Err(VmError::type_error("integer index", other.kind_name()).into()),
        }
    }
}
