use std::cmp::Ordering;

use anyhow::Result;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::VmError;

use super::Value;

enum Num<'a> {
    Int(std::borrow::Cow<'a, BigInt>),
    Float(f64),
}

fn as_num(v: &Value) -> Option<Num<'_>> {
    match v {
        Value::Int(i) => Some(Num::Int(std::borrow::Cow::Borrowed(i))),
        Value::Float(f) => Some(Num::Float(*f)),
        Value::Char(c) => Some(Num::Int(std::borrow::Cow::Owned(BigInt::from(*c as u32)))),
        _ => None,
    }
}

fn big_to_f64(i: &BigInt) -> f64 {
    i.to_f64().unwrap_or(f64::NAN)
}

fn cmp_num(a: Num<'_>, b: Num<'_>) -> Ordering {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x.as_ref().cmp(y.as_ref()),
        (Num::Int(x), Num::Float(y)) => big_to_f64(&x).total_cmp(&y),
        (Num::Float(x), Num::Int(y)) => x.total_cmp(&big_to_f64(&y)),
        (Num::Float(x), Num::Float(y)) => x.total_cmp(&y),
    }
}

fn cmp_seq(a: &[Value], b: &[Value]) -> Result<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare(x, y)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

fn is_list_like(v: &Value) -> bool {
    matches!(v, Value::Nil | Value::Pair(_))
}

/// Three-way comparison.
///
/// Ints, floats and chars compare numerically (int against float goes through
/// float), bools order false before true, strings and byte buffers compare
/// bytewise, arrays and lists compare element-wise with the shorter prefix first.
/// Any other pairing is a `VmError::Uncomparable`.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return Ok(cmp_num(x, y));
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.as_bytes().cmp(y.as_bytes())),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.as_slice().cmp(y.as_slice())),
        (Value::Symbol(x), Value::Symbol(y)) => Ok(x.name().cmp(y.name())),
        (Value::Array(x), Value::Array(y)) => {
            let (xs, ys) = (x.read().unwrap().clone(), y.read().unwrap().clone());
            cmp_seq(&xs, &ys)
        }
        (x, y) if is_list_like(x) && is_list_like(y) && x.is_list() && y.is_list() => {
            cmp_seq(&x.list_to_vec()?, &y.list_to_vec()?)
        }
        (Value::End, Value::End) | (Value::Marker, Value::Marker) => Ok(Ordering::Equal),
        _ => Err(VmError::Uncomparable {
            left: a.kind_name(),
            right: b.kind_name(),
        }
        .into()),
    }
}

/// Equality used by `=`: comparable values must compare equal, anything else
/// falls back to structural equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match compare(a, b) {
        Ok(ord) => ord == Ordering::Equal,
        Err(_) => a == b,
    }
}
