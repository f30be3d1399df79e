//! Hash and array access. Both containers are shared and mutable: `hset!`,
//! `hdel!`, `aset!` and `aappend` change the value every holder sees.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use kelp_core::{
    Environment, Value, VmError,
    val::{NativeFunction, OrderedHash},
    vm::{expect_arity, expect_min_arity},
};

use crate::{Module, index_arg};

#[derive(Debug, Default)]
pub struct CollectionsModule;

fn hash_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Arc<RwLock<OrderedHash>>> {
    match &args[0] {
        Value::Hash(map) => Ok(map),
        other => Err(VmError::type_error(format!("hash for `{}`", name), other.kind_name()).into()),
    }
}

fn array_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Arc<RwLock<Vec<Value>>>> {
    match &args[0] {
        Value::Array(items) => Ok(items),
        other => Err(VmError::type_error(format!("array for `{}`", name), other.kind_name()).into()),
    }
}

fn out_of_range(name: &str, index: usize, len: usize) -> anyhow::Error {
    VmError::user(format!("{}: index {} out of range for length {}", name, index, len)).into()
}

impl CollectionsModule {
    pub fn new() -> Self {
        Self
    }

    /// `(hget h key [default])`
    fn hget(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("hget", args, 2)?;
        let map = hash_arg("hget", args)?.read().unwrap();
        let found = map.get(&args[1])?.cloned();
        Ok(found.unwrap_or_else(|| args.get(2).cloned().unwrap_or(Value::Nil)))
    }

    /// Returns the hash itself so calls can be chained.
    fn hset(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("hset!", args, 3)?;
        hash_arg("hset!", args)?
            .write()
            .unwrap()
            .insert(args[1].clone(), args[2].clone())?;
        Ok(args[0].clone())
    }

    /// Removed value, or nil.
    fn hdel(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("hdel!", args, 2)?;
        let removed = hash_arg("hdel!", args)?.write().unwrap().remove(&args[1])?;
        Ok(removed.unwrap_or(Value::Nil))
    }

    fn hkeys(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("hkeys", args, 1)?;
        let keys: Vec<Value> = hash_arg("hkeys", args)?.read().unwrap().keys().cloned().collect();
        Ok(Value::list(keys))
    }

    fn hlen(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("hlen", args, 1)?;
        Ok(Value::from(hash_arg("hlen", args)?.read().unwrap().len()))
    }

    fn aget(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("aget", args, 2)?;
        let index = index_arg("aget", args, 1)?;
        let items = array_arg("aget", args)?.read().unwrap();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_range("aget", index, items.len()))
    }

    fn aset(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("aset!", args, 3)?;
        let index = index_arg("aset!", args, 1)?;
        let mut items = array_arg("aset!", args)?.write().unwrap();
        let len = items.len();
        let slot = items.get_mut(index).ok_or_else(|| out_of_range("aset!", index, len))?;
        *slot = args[2].clone();
        Ok(args[2].clone())
    }

    fn alen(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("alen", args, 1)?;
        Ok(Value::from(array_arg("alen", args)?.read().unwrap().len()))
    }

    /// Push every remaining argument; returns the array.
    fn aappend(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("aappend", args, 1)?;
        array_arg("aappend", args)?
            .write()
            .unwrap()
            .extend(args[1..].iter().cloned());
        Ok(args[0].clone())
    }
}

impl Module for CollectionsModule {
    fn name(&self) -> &str {
        "collections"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![
            ("hget", Self::hget as NativeFunction),
            ("hset!", Self::hset as NativeFunction),
            ("hdel!", Self::hdel as NativeFunction),
            ("hkeys", Self::hkeys as NativeFunction),
            ("hlen", Self::hlen as NativeFunction),
            ("aget", Self::aget as NativeFunction),
            ("aset!", Self::aset as NativeFunction),
            ("alen", Self::alen as NativeFunction),
            ("aappend", Self::aappend as NativeFunction),
        ]
    }
}
