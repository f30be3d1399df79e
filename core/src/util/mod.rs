pub mod pool;

/// Fx-hashed map used for scope layers and hash-value indexes.
pub type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// One scope layer: bindings keyed by interned symbol id.
pub type SymbolMap<V> = FastHashMap<u32, V>;

#[inline]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, Default::default())
}
