use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::val::Symbol;

/// Bidirectional name <-> id interning table, shared by every environment
/// duplicated from a common ancestor. New names may be interned from any of them.
#[derive(Debug, Default)]
pub struct SymbolTable {
    ids: DashMap<Arc<str>, u32>,
    names: RwLock<Vec<Arc<str>>>,
    counter: AtomicU32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable symbol for `name`; the id is allocated on first sight.
    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(id) = self.ids.get(name) {
            return Symbol::new(Arc::clone(id.key()), *id);
        }
        let key: Arc<str> = Arc::from(name);
        let entry = self.ids.entry(Arc::clone(&key)).or_insert_with(|| {
            let mut names = self.names.write().unwrap();
            let id = names.len() as u32;
            names.push(Arc::clone(&key));
            self.counter.fetch_add(1, Ordering::Relaxed);
            id
        });
        Symbol::new(Arc::clone(entry.key()), *entry)
    }

    /// Fresh symbol never handed out before, named `prefix` + counter.
    pub fn gensym(&self, prefix: &str) -> Symbol {
        loop {
            let n = self.counter.load(Ordering::Relaxed);
            let name = format!("{}{}", prefix, n);
            if self.ids.contains_key(name.as_str()) {
                self.counter.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            return self.intern(&name);
        }
    }

    pub fn name_of(&self, id: u32) -> Option<Arc<str>> {
        self.names.read().unwrap().get(id as usize).cloned()
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.ids.get(name).map(|id| Symbol::new(Arc::clone(id.key()), *id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
