use std::sync::{Arc, RwLock};

use anyhow::Result;
use num_bigint::BigInt;

use crate::error::VmError;

mod channel;
mod cmp;
mod convert;
mod display;
mod function;
mod hash;
mod ser;

pub use channel::Channel;
pub use cmp::{compare, values_equal};
pub use function::{Function, FunctionBody, NativeFunction, ScriptBody};
pub use hash::{HashKey, OrderedHash};
pub use ser::to_json;


/// Interned symbol: equality is id equality.
#[derive(Debug, Clone)]
pub struct Symbol {
    name: Arc<str>,
    id: u32,
}

impl Symbol {
    pub(crate) fn new(name: Arc<str>, id: u32) -> Self {
        Self { name, id }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

/// One cons cell. A chain of pairs whose last tail is `Value::Nil` is a list.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

/// The universal runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    /// End-of-stream sentinel.
    End,
    /// Delimits variable-length runs on the data stack during syntax-quote assembly.
    Marker,
    Bool(bool),
    Char(char),
    Int(BigInt),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<Vec<u8>>),
    Symbol(Symbol),
    Pair(Arc<Pair>),
    /// Growable, shared, mutable sequence.
    Array(Arc<RwLock<Vec<Value>>>),
    /// Insertion-ordered, shared, mutable map.
    Hash(Arc<RwLock<OrderedHash>>),
    Function(Arc<Function>),
    Channel(Arc<Channel>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::End => "end",
            Value::Marker => "marker",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "list",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Function(_) => "function",
            Value::Channel(_) => "channel",
        }
    }

    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }

    #[inline]
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Only `nil` and `false` are falsy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn cons(head: Value, tail: Value) -> Self {
        Value::Pair(Arc::new(Pair { head, tail }))
    }

    /// Build a proper list from the given items, in order.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn hash(map: OrderedHash) -> Self {
        Value::Hash(Arc::new(RwLock::new(map)))
    }

    /// Build a hash from alternating key/value items.
    pub fn hash_from_pairs(items: &[Value]) -> Result<Self> {
        if items.len() % 2 != 0 {
            return Err(VmError::user("hash requires an even number of key/value items").into());
        }
        let mut map = OrderedHash::with_capacity(items.len() / 2);
        for kv in items.chunks_exact(2) {
            map.insert(kv[0].clone(), kv[1].clone())?;
        }
        Ok(Value::hash(map))
    }

    /// True when following tails ends in `Nil`. `Nil` itself is the empty list.
    pub fn is_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return true,
                Value::Pair(p) => cur = &p.tail,
                _ => return false,
            }
        }
    }

    /// Collect the elements of a proper list.
    pub fn list_to_vec(&self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return Ok(out),
                Value::Pair(p) => {
                    out.push(p.head.clone());
                    cur = &p.tail;
                }
                other => return Err(VmError::type_error("proper list", other.kind_name()).into()),
            }
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Head of a pair, `None` for anything else.
    pub fn head(&self) -> Option<&Value> {
        match self {
            Value::Pair(p) => Some(&p.head),
            _ => None,
        }
    }

    /// Snapshot of an array's items.
    pub fn array_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.read().unwrap().clone()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality within a kind; shared containers compare by content,
    /// functions and channels by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::End, Value::End) | (Value::Marker, Value::Marker) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || *a.read().unwrap() == *b.read().unwrap()
            }
            (Value::Hash(a), Value::Hash(b)) => Arc::ptr_eq(a, b) || *a.read().unwrap() == *b.read().unwrap(),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Channel(a), Value::Channel(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
