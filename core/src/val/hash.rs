use std::sync::Arc;

use anyhow::Result;
use num_bigint::BigInt;

use crate::error::VmError;
use crate::util::{FastHashMap, fast_hash_map_with_capacity};

use super::Value;

/// Compaction kicks in once at least this many slots are dead and they make up
/// more than half of the slot vector.
const COMPACT_MIN_TOMBSTONES: usize = 16;

/// Hashable projection of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Bool(bool),
    Char(char),
    Int(BigInt),
    Str(Arc<str>),
    Symbol(u32),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(HashKey::Bool(*b)),
            Value::Char(c) => Ok(HashKey::Char(*c)),
            Value::Int(i) => Ok(HashKey::Int(i.clone())),
            Value::Str(s) => Ok(HashKey::Str(Arc::clone(s))),
            Value::Symbol(sym) => Ok(HashKey::Symbol(sym.id())),
            other => Err(VmError::Unhashable(other.kind_name()).into()),
        }
    }
}

/// Insertion-ordered map. Deletion leaves a tombstone in the slot vector; the
/// vector is compacted once tombstones dominate.
#[derive(Debug, Clone, Default)]
pub struct OrderedHash {
    slots: Vec<Option<(Value, Value)>>,
    index: FastHashMap<HashKey, usize>,
    tombstones: usize,
}

impl OrderedHash {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: FastHashMap::default(),
            tombstones: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            index: fast_hash_map_with_capacity(capacity),
            tombstones: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>> {
        let hk = HashKey::from_value(key)?;
        Ok(self.get_by_key(&hk))
    }

    fn get_by_key(&self, key: &HashKey) -> Option<&Value> {
        self.index
            .get(key)
            .and_then(|&slot| self.slots[slot].as_ref())
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool> {
        let hk = HashKey::from_value(key)?;
        Ok(self.index.contains_key(&hk))
    }

    /// Insert or overwrite. Overwriting keeps the original insertion position.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<Option<Value>> {
        let hk = HashKey::from_value(&key)?;
        if let Some(&slot) = self.index.get(&hk)
            && let Some((_, old)) = self.slots[slot].as_mut()
        {
            return Ok(Some(std::mem::replace(old, value)));
        }
        self.index.insert(hk, self.slots.len());
        self.slots.push(Some((key, value)));
        Ok(None)
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>> {
        let hk = HashKey::from_value(key)?;
        let Some(slot) = self.index.remove(&hk) else {
            return Ok(None);
        };
        let removed = self.slots[slot].take().map(|(_, v)| v);
        self.tombstones += 1;
        if self.tombstones >= COMPACT_MIN_TOMBSTONES && self.tombstones * 2 > self.slots.len() {
            self.compact();
        }
        Ok(removed)
    }

    /// Drop tombstones and rebuild the index.
    pub fn compact(&mut self) {
        let live: Vec<(Value, Value)> = self.slots.drain(..).flatten().collect();
        self.index.clear();
        self.tombstones = 0;
        for (slot, (key, _)) in live.iter().enumerate() {
            // Keys were validated on insert.
            if let Ok(hk) = HashKey::from_value(key) {
                self.index.insert(hk, slot);
            }
        }
        self.slots = live.into_iter().map(Some).collect();
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.slots.iter().flatten().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.iter().map(|(k, _)| k)
    }

    #[inline]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl PartialEq for OrderedHash {
    /// Same keys mapping to equal values; insertion order is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.index.iter().all(|(hk, &slot)| {
                let mine = self.slots[slot].as_ref().map(|(_, v)| v);
                mine.is_some() && mine == other.get_by_key(hk)
            })
    }
}
