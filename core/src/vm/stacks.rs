use std::mem;
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::VmError;
use crate::scope::ScopeStack;
use crate::util::pool::{DEFAULT_POOL_LIMIT, Pool};
use crate::val::{Function, Value};

static VALUE_BUFFERS: Lazy<Pool<Vec<Value>>> = Lazy::new(|| Pool::new("data-stack", DEFAULT_POOL_LIMIT));
static ADDRESS_BUFFERS: Lazy<Pool<Vec<Address>>> = Lazy::new(|| Pool::new("address-stack", DEFAULT_POOL_LIMIT));
static SCOPE_STACK_BUFFERS: Lazy<Pool<Vec<ScopeStack>>> =
    Lazy::new(|| Pool::new("scope-stacks", DEFAULT_POOL_LIMIT));

/// Resize every stack-buffer pool, plus the scope-map pool.
pub(crate) fn set_pool_limits(limit: usize) {
    VALUE_BUFFERS.set_limit(limit);
    ADDRESS_BUFFERS.set_limit(limit);
    SCOPE_STACK_BUFFERS.set_limit(limit);
    crate::scope::SCOPE_POOL.set_limit(limit);
}

/// Where to resume after a script function returns.
#[derive(Debug, Clone)]
pub struct Address {
    pub func: Arc<Function>,
    pub pc: usize,
}

/// Bounded stack whose backing buffer goes back to a shared pool on drop.
pub struct Stack<T: 'static> {
    name: &'static str,
    items: Vec<T>,
    limit: usize,
    pool: &'static Pool<Vec<T>>,
}

pub type DataStack = Stack<Value>;
pub type AddressStack = Stack<Address>;
pub type ScopeStackStack = Stack<ScopeStack>;

impl<T: 'static> Stack<T> {
    fn from_pool(name: &'static str, pool: &'static Pool<Vec<T>>, initial: usize, limit: usize) -> Self {
        let mut items = pool.take();
        items.reserve(initial);
        Self {
            name,
            items,
            limit,
            pool,
        }
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.limit {
            warn!(target: "kelp::vm", stack = self.name, limit = self.limit, "stack overflow");
            return Err(VmError::StackOverflow {
                stack: self.name,
                limit: self.limit,
            }
            .into());
        }
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T> {
        self.items.pop().ok_or_else(|| VmError::StackUnderflow(self.name).into())
    }

    pub fn peek(&self) -> Result<&T> {
        self.items.last().ok_or_else(|| VmError::StackUnderflow(self.name).into())
    }

    /// The top `n` items, oldest first.
    pub fn peek_n(&self, n: usize) -> Result<&[T]> {
        let len = self.items.len();
        if n > len {
            return Err(VmError::StackUnderflow(self.name).into());
        }
        Ok(&self.items[len - n..])
    }

    /// Remove the top `n` items, oldest first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<T>> {
        let len = self.items.len();
        if n > len {
            return Err(VmError::StackUnderflow(self.name).into());
        }
        Ok(self.items.split_off(len - n))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Innermost first.
    pub fn iter_top_down(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }
}

impl<T: 'static> Drop for Stack<T> {
    fn drop(&mut self) {
        self.pool.give(mem::take(&mut self.items));
    }
}

impl DataStack {
    pub fn new_data(initial: usize, limit: usize) -> Self {
        Self::from_pool("data", &VALUE_BUFFERS, initial, limit)
    }

    /// Pop everything above the nearest marker, oldest first; the marker is consumed.
    pub fn pop_to_marker(&mut self) -> Result<Vec<Value>> {
        let Some(pos) = self.items.iter().rposition(|v| matches!(v, Value::Marker)) else {
            return Err(VmError::StackUnderflow("data (no marker)").into());
        };
        let collected = self.items.split_off(pos + 1);
        self.items.pop();
        Ok(collected)
    }
}

impl AddressStack {
    pub fn new_address(initial: usize, limit: usize) -> Self {
        Self::from_pool("call", &ADDRESS_BUFFERS, initial, limit)
    }
}

impl ScopeStackStack {
    pub fn new_scopes(initial: usize, limit: usize) -> Self {
        Self::from_pool("scope-stack", &SCOPE_STACK_BUFFERS, initial, limit)
    }
}
