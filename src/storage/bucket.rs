//! # Bucket Arrays
//!
//! This module views a [`MappedRegion`] as an array of page-sized buckets.
//! Buckets are the unit of on-disk placement: one bucket is exactly one
//! 512-byte page, so probing a bucket costs a single SSD sector read.
//!
//! ## Bucket Layout
//!
//! ```text
//! Offset          Size             Field
//! ------          ----             --------------------------------
//! 0               S                slot 0 (key bytes, value bytes)
//! S               S                slot 1
//! ...
//! (B-1)·S         S                slot B-1
//! B·S             pad              unused
//! PAGE_SIZE - 2   2                element count (u16, little-endian)
//! ```
//!
//! `S = size_of::<K>() + size_of::<V>()` and `B = (PAGE_SIZE - 2) / S`.
//! Slots `[0, count)` hold valid elements; slots `[count, B)` are
//! uninitialised bytes and must never be decoded.
//!
//! ## Slot Encoding
//!
//! A slot is the key's bytes followed by the value's bytes, packed with no
//! padding. Keys and values are constrained to fixed-size, bitwise-copyable
//! types via the [`SlotData`] bound; encoding and decoding go through
//! `zerocopy` so no unaligned or uninitialised memory is ever reinterpreted
//! in place.
//!
//! ## Geometry Validation
//!
//! Construction fails when a single element cannot fit in a page alongside
//! the counter, or when the capacity would exceed what the `u16` counter can
//! represent. Both are configuration errors: nothing on disk can fix them.
//!
//! ## Access
//!
//! `bucket(n)` / `bucket_mut(n)` return borrowed views with bounds-checked
//! indices, mirroring the page accessor pair of the underlying storage.
//! Appends go through `BucketMut` which maintains the trailing counter.

use std::marker::PhantomData;
use std::mem::size_of;

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::config::{COUNTER_SIZE, PAGE_SIZE};

use super::MappedRegion;

/// Marker for types that can live in a bucket slot: fixed-size and
/// bitwise-copyable, with a stable byte representation.
pub trait SlotData: Copy + FromBytes + IntoBytes + Immutable {}

impl<T: Copy + FromBytes + IntoBytes + Immutable> SlotData for T {}

fn decode<T: SlotData>(bytes: &[u8]) -> Result<T> {
    T::read_from_bytes(bytes)
        .map_err(|e| eyre::eyre!("failed to decode {}: {:?}", core::any::type_name::<T>(), e))
}

/// A [`MappedRegion`] interpreted as `N` page-sized buckets of packed
/// `(K, V)` slots.
#[derive(Debug)]
pub struct BucketArray<K, V> {
    region: MappedRegion,
    bucket_count: u64,
    capacity: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K: SlotData, V: SlotData> BucketArray<K, V> {
    /// On-disk size of one `(K, V)` slot.
    pub fn entry_size() -> usize {
        size_of::<K>() + size_of::<V>()
    }

    /// Number of elements a bucket can hold, after validating that the
    /// geometry is representable at all.
    pub fn entry_capacity() -> Result<usize> {
        let entry_size = Self::entry_size();
        ensure!(entry_size > 0, "bucket elements must not be zero-sized");

        let capacity = (PAGE_SIZE - COUNTER_SIZE) / entry_size;
        ensure!(
            capacity >= 1,
            "element of {} bytes does not fit in a {}-byte page",
            entry_size,
            PAGE_SIZE
        );
        ensure!(
            capacity * entry_size + COUNTER_SIZE <= PAGE_SIZE,
            "bucket of {} elements of {} bytes overflows a {}-byte page",
            capacity,
            entry_size,
            PAGE_SIZE
        );
        ensure!(
            capacity < (1 << (8 * COUNTER_SIZE)),
            "bucket capacity {} is not representable by the {}-byte counter",
            capacity,
            COUNTER_SIZE
        );

        Ok(capacity)
    }

    /// Wraps `region` as an array of `bucket_count` buckets.
    pub fn new(region: MappedRegion, bucket_count: u64) -> Result<Self> {
        let capacity = Self::entry_capacity()?;

        ensure!(
            region.len() as u64 == bucket_count * PAGE_SIZE as u64,
            "region '{}' is {} bytes, expected {} buckets of {} bytes",
            region.path().display(),
            region.len(),
            bucket_count,
            PAGE_SIZE
        );

        Ok(Self {
            region,
            bucket_count,
            capacity,
            _marker: PhantomData,
        })
    }

    pub fn bucket_count(&self) -> u64 {
        self.bucket_count
    }

    /// Maximum number of elements per bucket (`B`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn region(&self) -> &MappedRegion {
        &self.region
    }

    pub fn bucket(&self, n: u64) -> Result<BucketRef<'_, K, V>> {
        ensure!(
            n < self.bucket_count,
            "bucket {} out of bounds (bucket_count={})",
            n,
            self.bucket_count
        );

        let offset = n as usize * PAGE_SIZE;
        Ok(BucketRef {
            page: &self.region.as_slice()[offset..offset + PAGE_SIZE],
            capacity: self.capacity,
            _marker: PhantomData,
        })
    }

    pub fn bucket_mut(&mut self, n: u64) -> Result<BucketMut<'_, K, V>> {
        ensure!(
            n < self.bucket_count,
            "bucket {} out of bounds (bucket_count={})",
            n,
            self.bucket_count
        );

        let capacity = self.capacity;
        let offset = n as usize * PAGE_SIZE;
        Ok(BucketMut {
            page: &mut self.region.as_mut_slice()[offset..offset + PAGE_SIZE],
            capacity,
            _marker: PhantomData,
        })
    }

    /// Hints the OS to fault in bucket `n` ahead of a scan. Advisory only.
    pub fn prefetch(&self, n: u64) -> Result<()> {
        ensure!(
            n < self.bucket_count,
            "bucket {} out of bounds (bucket_count={})",
            n,
            self.bucket_count
        );

        self.region.prefetch(n as usize * PAGE_SIZE, PAGE_SIZE);
        Ok(())
    }
}

fn counter_of(page: &[u8]) -> usize {
    u16::from_le_bytes([page[PAGE_SIZE - 2], page[PAGE_SIZE - 1]]) as usize
}

fn slot_of<K: SlotData, V: SlotData>(page: &[u8], i: usize) -> Result<(K, V)> {
    let entry_size = size_of::<K>() + size_of::<V>();
    let offset = i * entry_size;
    let key = decode(&page[offset..offset + size_of::<K>()])?;
    let value = decode(&page[offset + size_of::<K>()..offset + entry_size])?;
    Ok((key, value))
}

/// Read-only view of one bucket.
#[derive(Debug)]
pub struct BucketRef<'a, K, V> {
    page: &'a [u8],
    capacity: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> Clone for BucketRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for BucketRef<'_, K, V> {}

impl<'a, K: SlotData, V: SlotData> BucketRef<'a, K, V> {
    /// Number of valid elements in the bucket.
    pub fn len(&self) -> usize {
        counter_of(self.page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decodes the `i`-th element of the valid prefix.
    pub fn entry(&self, i: usize) -> Result<(K, V)> {
        ensure!(
            i < self.len(),
            "slot {} out of bounds (bucket len={})",
            i,
            self.len()
        );
        slot_of(self.page, i)
    }

    /// Iterates over the valid prefix `[0, len())`.
    pub fn iter(self) -> impl Iterator<Item = Result<(K, V)>> + 'a {
        (0..self.len()).map(move |i| slot_of(self.page, i))
    }
}

/// Mutable view of one bucket.
#[derive(Debug)]
pub struct BucketMut<'a, K, V> {
    page: &'a mut [u8],
    capacity: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K: SlotData, V: SlotData> BucketMut<'_, K, V> {
    pub fn len(&self) -> usize {
        counter_of(self.page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overwrites the stored element count. Used by the split protocol after
    /// compacting a bucket in place.
    pub fn set_len(&mut self, n: usize) {
        debug_assert!(n <= self.capacity);
        self.page[PAGE_SIZE - 2..].copy_from_slice(&(n as u16).to_le_bytes());
    }

    pub fn entry(&self, i: usize) -> Result<(K, V)> {
        ensure!(
            i < self.len(),
            "slot {} out of bounds (bucket len={})",
            i,
            self.len()
        );
        slot_of(self.page, i)
    }

    /// Appends an element to the bucket. Returns `false` iff the bucket is
    /// full; the caller then falls back to the overflow index.
    pub fn append(&mut self, key: &K, value: &V) -> bool {
        let len = self.len();
        if len == self.capacity {
            return false;
        }

        self.write_slot(len, key, value);
        self.set_len(len + 1);
        true
    }

    /// Writes an element into slot `i` without touching the counter. Used by
    /// the split protocol's compacting cursor, which rewrites the kept
    /// prefix before shrinking the count.
    pub fn write_entry(&mut self, i: usize, key: &K, value: &V) -> Result<()> {
        ensure!(
            i < self.capacity,
            "slot {} out of bounds (bucket capacity={})",
            i,
            self.capacity
        );
        self.write_slot(i, key, value);
        Ok(())
    }

    fn write_slot(&mut self, i: usize, key: &K, value: &V) {
        let entry_size = size_of::<K>() + size_of::<V>();
        let offset = i * entry_size;
        self.page[offset..offset + size_of::<K>()].copy_from_slice(key.as_bytes());
        self.page[offset + size_of::<K>()..offset + entry_size].copy_from_slice(value.as_bytes());
    }
}
