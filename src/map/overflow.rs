//! # Overflow Index
//!
//! In-memory side-table for elements that did not fit in their home bucket.
//! The index is a two-level mapping: bucket coordinate first, full key hash
//! second. The two-level shape is what makes the split protocol cheap — a
//! split drains exactly the sub-map bound to one coordinate in
//! O(|sub-map|), instead of scanning the whole overflow population.
//!
//! The index lives in memory only; [`crate::map::BucketMap::flush`]
//! serialises it to `overflow.bin` and the open protocol rehydrates it.
//!
//! ## Counting
//!
//! The index owns the `overflow_count` statistic: it grows only when a new
//! hash is inserted and shrinks by a sub-map's cardinality when the split
//! protocol takes it. Keeping the count here guarantees it always equals
//! the number of serialisable records, which the flush path relies on to
//! size `overflow.bin`.
//!
//! ## Collisions
//!
//! Two inserts with equal full hash under one coordinate resolve
//! last-write-wins; the inner mapping keeps hashes unique.

use hashbrown::HashMap;

#[derive(Debug)]
pub struct OverflowIndex<K, V> {
    buckets: HashMap<u64, HashMap<u64, (K, V)>>,
    len: u64,
}

impl<K, V> Default for OverflowIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OverflowIndex<K, V> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Number of elements held across all coordinates.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Binds `(key, value)` to `hash` under `coord`. Last write wins on an
    /// equal hash.
    pub fn insert(&mut self, coord: u64, hash: u64, key: K, value: V) {
        let replaced = self
            .buckets
            .entry(coord)
            .or_default()
            .insert(hash, (key, value));

        if replaced.is_none() {
            self.len += 1;
        }
    }

    pub fn find(&self, coord: u64, hash: u64) -> Option<&(K, V)> {
        self.buckets.get(&coord)?.get(&hash)
    }

    /// Removes and returns the whole sub-map bound to `coord`, so the split
    /// protocol can redistribute it.
    pub fn take(&mut self, coord: u64) -> Option<HashMap<u64, (K, V)>> {
        let sub = self.buckets.remove(&coord)?;
        self.len -= sub.len() as u64;
        Some(sub)
    }

    /// Iterates every `(coord, hash, element)` triple, in no particular
    /// order. Used to serialise the index.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &(K, V))> {
        self.buckets
            .iter()
            .flat_map(|(&coord, sub)| sub.iter().map(move |(&hash, elem)| (coord, hash, elem)))
    }
}
