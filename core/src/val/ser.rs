use anyhow::Result;
use num_traits::ToPrimitive;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::Value;

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Nil | Value::End | Value::Marker => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Char(c) => serializer.serialize_str(&c.to_string()),
            Value::Int(i) => match i.to_i64() {
                Some(n) => serializer.serialize_i64(n),
                // Out of i64 range: keep every digit by going through a string.
                None => serializer.serialize_str(&i.to_string()),
            },
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
                for b in bytes.iter() {
                    seq.serialize_element(b)?;
                }
                seq.end()
            }
            Value::Symbol(sym) => serializer.serialize_str(sym.name()),
            Value::Pair(_) => {
                let mut seq = serializer.serialize_seq(None)?;
                let mut cur = self;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            seq.serialize_element(&p.head)?;
                            cur = &p.tail;
                        }
                        Value::Nil => break,
                        tail => {
                            seq.serialize_element(tail)?;
                            break;
                        }
                    }
                }
                seq.end()
            }
            Value::Array(items) => {
                let items = items.read().unwrap();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Hash(map) => {
                let map = map.read().unwrap();
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(&k.to_plain_string(), v)?;
                }
                out.end()
            }
            Value::Function(_) | Value::Channel(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

/// Encode a value as JSON text.
pub fn to_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
