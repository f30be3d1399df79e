//! Copy-on-write lexical environment.
//!
//! A `ScopeStack` is a `top`/`bottom` pair of pointers into a singly linked
//! chain of `ScopeLayer`s. Layers are shared between stacks by `fork`, and each
//! layer counts how many stacks can currently reach it. A layer is written in
//! place only while that count is one; otherwise `bind` stacks an extension
//! layer on top and writes there. `set` deliberately ignores sharing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::error::VmError;
use crate::util::SymbolMap;
use crate::util::pool::{DEFAULT_POOL_LIMIT, Pool};
use crate::val::{Symbol, Value};


/// One lexical frame of bindings keyed by symbol id.
pub type Scope = SymbolMap<Value>;

pub(crate) static SCOPE_POOL: Lazy<Pool<Scope>> = Lazy::new(|| Pool::new("scope", DEFAULT_POOL_LIMIT));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerKind {
    /// Base or extra global scope. Never copy-on-write extended.
    Global,
    /// Function frame or `let` block.
    Local,
    /// Pushed by `bind` over a shared layer; popped together with that layer.
    Extension,
}

struct ScopeLayer {
    holders: AtomicUsize,
    kind: LayerKind,
    scope: RwLock<Scope>,
    next: Option<Arc<ScopeLayer>>,
}

impl ScopeLayer {
    fn new(kind: LayerKind, scope: Scope, next: Option<Arc<ScopeLayer>>) -> Arc<Self> {
        Arc::new(Self {
            holders: AtomicUsize::new(1),
            kind,
            scope: RwLock::new(scope),
            next,
        })
    }

    #[inline]
    fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }

    #[inline]
    fn retain(&self) {
        self.holders.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one holder; the last holder hands the map back to the pool.
    fn release(&self) {
        if self.holders.fetch_sub(1, Ordering::AcqRel) == 1 {
            let scope = mem::take(&mut *self.scope.write().unwrap());
            recycle(scope);
        }
    }
}

impl Drop for ScopeLayer {
    // Unlink the tail one layer at a time instead of recursing down the chain.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(layer) = next {
            next = match Arc::try_unwrap(layer) {
                Ok(mut owned) => owned.next.take(),
                Err(_) => None,
            };
        }
    }
}

thread_local! {
    static RECYCLING: Cell<bool> = const { Cell::new(false) };
    static PENDING: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Return a map to the pool. Clearing a map can drop closures whose layers
/// release more maps; those are queued and drained here iteratively, so long
/// closure chains never deepen the native stack.
fn recycle(scope: Scope) {
    PENDING.with(|pending| pending.borrow_mut().push(scope));
    if RECYCLING.with(|flag| flag.replace(true)) {
        return;
    }
    while let Some(scope) = PENDING.with(|pending| pending.borrow_mut().pop()) {
        SCOPE_POOL.give(scope);
    }
    RECYCLING.with(|flag| flag.set(false));
}

pub struct ScopeStack {
    top: Arc<ScopeLayer>,
    bottom: Arc<ScopeLayer>,
}

impl ScopeStack {
    /// A stack holding a single, empty global layer.
    pub fn new() -> Self {
        let bottom = ScopeLayer::new(LayerKind::Global, SCOPE_POOL.take(), None);
        Self {
            top: Arc::clone(&bottom),
            bottom,
        }
    }

    fn layers(&self) -> impl Iterator<Item = &Arc<ScopeLayer>> {
        std::iter::successors(Some(&self.top), |layer| layer.next.as_ref())
    }

    fn push_layer(&mut self, kind: LayerKind) {
        let layer = ScopeLayer::new(kind, SCOPE_POOL.take(), Some(Arc::clone(&self.top)));
        self.top = layer;
    }

    /// Push a fresh, unshared local layer.
    pub fn push_scope(&mut self) {
        self.push_layer(LayerKind::Local);
    }

    /// Push an extra global layer; `bind` writes into it without copy-on-write.
    pub fn push_global_scope(&mut self) {
        self.push_layer(LayerKind::Global);
    }

    /// Pop the top layer together with any copy-on-write extensions stacked on
    /// it. The bottom layer can never be popped.
    pub fn pop(&mut self) -> Result<()> {
        loop {
            if Arc::ptr_eq(&self.top, &self.bottom) {
                return Err(VmError::StackUnderflow("scope").into());
            }
            let Some(next) = self.top.next.clone() else {
                return Err(VmError::StackUnderflow("scope").into());
            };
            let popped = mem::replace(&mut self.top, next);
            popped.release();
            if popped.kind != LayerKind::Extension {
                return Ok(());
            }
        }
    }

    /// Bind in the top layer, extending first when the top is shared.
    pub fn bind(&mut self, sym: &Symbol, value: Value) {
        if self.top.holders() > 1 && self.top.kind != LayerKind::Global {
            self.push_layer(LayerKind::Extension);
        }
        self.top.scope.write().unwrap().insert(sym.id(), value);
    }

    /// Bind in the base global layer, visible to every stack sharing it.
    pub fn bind_global(&self, sym: &Symbol, value: Value) {
        self.bottom.scope.write().unwrap().insert(sym.id(), value);
    }

    /// Overwrite the nearest existing binding in place, whoever shares it.
    /// Unbound symbols fall back to `bind`.
    pub fn set(&mut self, sym: &Symbol, value: Value) {
        for layer in self.layers() {
            let mut scope = layer.scope.write().unwrap();
            if let Some(slot) = scope.get_mut(&sym.id()) {
                *slot = value;
                return;
            }
        }
        self.bind(sym, value);
    }

    pub fn lookup(&self, sym: &Symbol) -> Result<Value> {
        self.try_lookup(sym.id())
            .ok_or_else(|| VmError::Unbound(sym.name().to_string()).into())
    }

    /// Nearest binding for the symbol id, if any.
    pub fn try_lookup(&self, id: u32) -> Option<Value> {
        self.layers()
            .find_map(|layer| layer.scope.read().unwrap().get(&id).cloned())
    }

    pub fn is_bound(&self, id: u32) -> bool {
        self.layers().any(|layer| layer.scope.read().unwrap().contains_key(&id))
    }

    /// Share the whole chain: every reachable layer gains a holder.
    pub fn fork(&self) -> ScopeStack {
        for layer in self.layers() {
            layer.retain();
        }
        ScopeStack {
            top: Arc::clone(&self.top),
            bottom: Arc::clone(&self.bottom),
        }
    }

    /// Share only the base global layer.
    pub fn fork_bottom(&self) -> ScopeStack {
        self.bottom.retain();
        ScopeStack {
            top: Arc::clone(&self.bottom),
            bottom: Arc::clone(&self.bottom),
        }
    }

    /// Share the global layers (base plus extra globals) but no locals.
    pub fn fork_globals(&self) -> ScopeStack {
        let Some(top) = self.layers().find(|layer| layer.kind == LayerKind::Global) else {
            return self.fork_bottom();
        };
        let top = Arc::clone(top);
        for layer in std::iter::successors(Some(&top), |layer| layer.next.as_ref()) {
            layer.retain();
        }
        ScopeStack {
            top,
            bottom: Arc::clone(&self.bottom),
        }
    }

    /// Copy every layer above the base into fresh, unshared layers. The base
    /// global layer stays shared so top-level definitions remain visible.
    pub fn deep_clone(&self) -> ScopeStack {
        let copies: Vec<(LayerKind, Scope)> = self
            .layers()
            .take_while(|layer| !Arc::ptr_eq(layer, &self.bottom))
            .map(|layer| {
                let mut scope = SCOPE_POOL.take();
                scope.extend(layer.scope.read().unwrap().iter().map(|(k, v)| (*k, v.clone())));
                (layer.kind, scope)
            })
            .collect();
        self.bottom.retain();
        let mut top = Arc::clone(&self.bottom);
        for (kind, scope) in copies.into_iter().rev() {
            top = ScopeLayer::new(kind, scope, Some(top));
        }
        ScopeStack {
            top,
            bottom: Arc::clone(&self.bottom),
        }
    }

    /// Number of layers above the base global layer.
    pub fn depth(&self) -> usize {
        self.layers().count() - 1
    }

    /// Holder counts from top to bottom.
    pub fn refcounts(&self) -> Vec<usize> {
        self.layers().map(|layer| layer.holders()).collect()
    }

    /// True when both stacks end in the same base layer.
    pub fn shares_bottom_with(&self, other: &ScopeStack) -> bool {
        Arc::ptr_eq(&self.bottom, &other.bottom)
    }

    /// Symbol ids bound in the top layer.
    pub fn top_bindings(&self) -> Vec<u32> {
        self.top.scope.read().unwrap().keys().copied().collect()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ScopeStack {
    /// Cloning a stack is a fork; use `deep_clone` for independent copies.
    fn clone(&self) -> Self {
        self.fork()
    }
}

impl Drop for ScopeStack {
    fn drop(&mut self) {
        for layer in self.layers() {
            layer.release();
        }
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("depth", &self.depth())
            .field("refcounts", &self.refcounts())
            .finish()
    }
}
