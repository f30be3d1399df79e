use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use super::FastHashMap;

pub const DEFAULT_POOL_LIMIT: usize = 256;

/// Objects that can be wiped back to their empty state before reuse.
pub trait Reset {
    fn reset(&mut self);
}

impl<T> Reset for Vec<T> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K, V> Reset for FastHashMap<K, V> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

/// Process-wide free list. Everything handed out by `take` has been reset.
pub struct Pool<T> {
    name: &'static str,
    free: Mutex<Vec<T>>,
    limit: AtomicUsize,
}

impl<T: Default + Reset> Pool<T> {
    pub fn new(name: &'static str, limit: usize) -> Self {
        Self {
            name,
            free: Mutex::new(Vec::new()),
            limit: AtomicUsize::new(limit),
        }
    }

    pub fn take(&self) -> T {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    pub fn give(&self, mut item: T) {
        item.reset();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.limit.load(Ordering::Relaxed) {
            free.push(item);
            trace!(target: "kelp::pool", pool = self.name, size = free.len(), "recycled");
        }
    }

    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::Relaxed);
        let mut free = self.free.lock().unwrap();
        free.truncate(limit);
    }

    pub fn len(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
