use anyhow::Result;

use crate::error::VmError;
use crate::val::Value;
use crate::vm::Instr;

use super::{FunctionBuilder, Generator};

/// `(name x)` for the given head symbol name.
fn tagged<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    let Value::Pair(p) = value else {
        return None;
    };
    let Value::Symbol(sym) = &p.head else {
        return None;
    };
    if sym.name() != name {
        return None;
    }
    match &p.tail {
        Value::Pair(rest) if rest.tail.is_nil() => Some(&rest.head),
        _ => None,
    }
}

/// True when `value` can be pushed as one constant: no containers to rebuild
/// and, outside plain quote, nothing to unquote.
fn is_static(value: &Value, literal: bool) -> bool {
    match value {
        Value::Array(_) | Value::Hash(_) => false,
        Value::Pair(_) => {
            if !literal && (tagged(value, "unquote").is_some() || tagged(value, "unquote-splicing").is_some()) {
                return false;
            }
            let mut cur = value;
            while let Value::Pair(p) = cur {
                if !is_static(&p.head, literal) {
                    return false;
                }
                cur = &p.tail;
            }
            is_static(cur, literal)
        }
        _ => true,
    }
}

impl Generator<'_> {
    /// Rebuild a quoted form at run time. With `literal` set this is plain
    /// `quote`: containers are rebuilt fresh but nothing is evaluated.
    /// Otherwise `unquote` evaluates and `unquote-splicing` explodes in place.
    pub(super) fn quasi(&mut self, b: &mut FunctionBuilder, form: &Value, literal: bool) -> Result<()> {
        if is_static(form, literal) {
            b.emit(Instr::Push(form.clone()));
            return Ok(());
        }
        if !literal {
            if let Some(inner) = tagged(form, "unquote") {
                return self.expr(b, inner, false);
            }
            if tagged(form, "unquote-splicing").is_some() {
                return Err(VmError::syntax("unquote-splicing outside a list").into());
            }
        }
        match form {
            Value::Pair(_) if form.is_list() => {
                let items = form.list_to_vec()?;
                b.emit(Instr::Push(Value::Marker));
                for item in &items {
                    self.quasi_item(b, item, literal)?;
                }
                b.emit(Instr::Squash);
            }
            Value::Array(items) => {
                let items = items.read().unwrap().clone();
                b.emit(Instr::Push(Value::Marker));
                for item in &items {
                    self.quasi_item(b, item, literal)?;
                }
                b.emit(Instr::Vectorize);
            }
            Value::Hash(map) => {
                let entries: Vec<(Value, Value)> = map
                    .read()
                    .unwrap()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                b.emit(Instr::Push(Value::Marker));
                for (k, v) in &entries {
                    self.quasi(b, k, literal)?;
                    self.quasi(b, v, literal)?;
                }
                b.emit(Instr::Hashize);
            }
            // Dotted pairs holding containers are pushed as they were read.
            other => {
                b.emit(Instr::Push(other.clone()));
            }
        }
        Ok(())
    }

    fn quasi_item(&mut self, b: &mut FunctionBuilder, item: &Value, literal: bool) -> Result<()> {
        if !literal {
            if let Some(spliced) = tagged(item, "unquote-splicing") {
                self.expr(b, spliced, false)?;
                b.emit(Instr::Explode);
                return Ok(());
            }
        }
        self.quasi(b, item, literal)
    }
}
