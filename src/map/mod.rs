//! # Bucket Map
//!
//! This module implements `BucketMap`, the extendible-hash state machine
//! tying the storage layer together: a directory of on-disk bucket arrays,
//! the in-memory overflow index, the mask widths addressing them, and the
//! incremental doubling protocol that keeps inserts near-constant-time as
//! the map grows.
//!
//! ## Addressing
//!
//! A key hashes to a machine word `h`; the low `M` bits of `h` name one of
//! `2^M` bucket coordinates. Coordinates map to `(array, bucket)` pairs:
//! array 0 holds the `2^M₀` buckets whose coordinate fits in the original
//! mask, and array `k ≥ 1` holds the buckets whose highest set coordinate
//! bit is `M₀ + k - 1` (the bucket index is the coordinate with that bit
//! cleared). The directory therefore grows by appending arrays — one file
//! each — and existing files never move.
//!
//! ## Incremental Doubling
//!
//! When the load and overflow thresholds trip, the map allocates a fresh
//! array of `2^M` buckets and starts splitting buckets one at a time,
//! `RESIZE_STEP_ITERATIONS` of them after each insert. The split of bucket
//! `R` rewrites its elements in place (compacting cursor), moves the ones
//! whose hash has bit `M` set into bucket `R` of the new array, and drains
//! the overflow sub-map bound to `R` into whichever side now has room.
//! While a resize is in progress the coordinate functions consult the
//! split watermark `R` so both treated and untreated regions resolve
//! correctly.
//!
//! ## Durability
//!
//! `flush()` schedules an async write-back of every region (newest array
//! first), serialises the overflow index to `overflow.bin` via an atomic
//! rename, writes the `meta.bin` record, and then completes a synchronous
//! write-back pass. Dropping the map flushes. Persistence is only
//! guaranteed after a flush completes; there is no write-ahead logging.
//!
//! ## Hashing
//!
//! The map is generic over `S: BuildHasher`. Hashes must be a pure function
//! of the key and stable across process restarts: the open protocol and the
//! split protocol both re-derive coordinates by hashing stored keys. The
//! default build hasher is `BuildHasherDefault<DefaultHasher>`, which seeds
//! SipHash with fixed keys and therefore produces identical hashes in every
//! process. Randomly seeded hashers (e.g. hashbrown's default) would corrupt
//! a reopened store.

mod overflow;

pub use overflow::OverflowIndex;

use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use zerocopy::IntoBytes;

use crate::config::{
    EMERGENCY_OVERFLOW_COUNT, INITIAL_TARGET_LOAD, MAX_OVERFLOW_COUNT, MAX_OVERFLOW_RATIO,
    PAGE_SIZE, RESIZE_STEP_ITERATIONS, RESIZE_THRESHOLD_LOAD,
};
use crate::storage::{
    decode_overflow_record, encode_overflow_record, overflow_record_size, BucketArray,
    MappedRegion, MetaRecord, SlotData,
};

pub const DATA_FILE_PREFIX: &str = "data";
pub const OVERFLOW_FILE_NAME: &str = "overflow.bin";
pub const OVERFLOW_TEMP_FILE_NAME: &str = "overflow.tmp";
pub const META_FILE_NAME: &str = "meta.bin";

/// Deterministic default build hasher; see the module docs on hashing.
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

fn data_path(base: &Path, i: usize) -> PathBuf {
    base.join(format!("{}.{}", DATA_FILE_PREFIX, i))
}

/// A persistent, disk-resident associative map using extendible hashing.
///
/// Supports insertion and point lookup of fixed-size key/value bindings,
/// persisted under an application-chosen directory. Single-threaded;
/// wrap in an external exclusive lock for shared access.
#[derive(Debug)]
pub struct BucketMap<K, V, S = DefaultHashBuilder>
where
    K: SlotData + Hash + Eq,
    V: SlotData,
    S: BuildHasher,
{
    base_path: PathBuf,
    arrays: Vec<BucketArray<K, V>>,
    overflow: OverflowIndex<K, V>,
    hash_builder: S,
    mask_size: u8,
    original_mask_size: u8,
    is_resizing: bool,
    resize_counter: u64,
    e_count: u64,
    bucket_space: u64,
}

impl<K, V> BucketMap<K, V>
where
    K: SlotData + Hash + Eq,
    V: SlotData,
{
    /// Opens the store at `path`, creating it when the path does not exist.
    /// `setup_size` is the expected element count used to size a fresh
    /// store; it is ignored when re-opening.
    pub fn open<P: AsRef<Path>>(path: P, setup_size: u64) -> Result<Self> {
        Self::with_hasher(path, setup_size, DefaultHashBuilder::default())
    }
}

impl<K, V, S> BucketMap<K, V, S>
where
    K: SlotData + Hash + Eq,
    V: SlotData,
    S: BuildHasher,
{
    /// Like [`BucketMap::open`], with an explicit build hasher. The hasher
    /// must produce identical hashes across process restarts.
    pub fn with_hasher<P: AsRef<Path>>(path: P, setup_size: u64, hash_builder: S) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        match fs::metadata(&base_path) {
            Ok(meta) => {
                ensure!(
                    meta.is_dir(),
                    "'{}' exists and is not a directory",
                    base_path.display()
                );
                Self::open_existing(base_path, hash_builder)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Self::create(base_path, setup_size, hash_builder)
            }
            Err(e) => Err(e)
                .wrap_err_with(|| format!("failed to stat store path '{}'", base_path.display())),
        }
    }

    fn create(base_path: PathBuf, setup_size: u64, hash_builder: S) -> Result<Self> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&base_path).wrap_err_with(|| {
            format!("failed to create store directory '{}'", base_path.display())
        })?;

        let capacity = BucketArray::<K, V>::entry_capacity()? as u64;
        let original_mask_size = initial_mask_size(setup_size, capacity);
        ensure!(
            original_mask_size < 48,
            "setup size {} exceeds the addressable bucket space",
            setup_size
        );

        let bucket_count = 1u64 << original_mask_size;
        let region = MappedRegion::open(
            data_path(&base_path, 0),
            bucket_count as usize * PAGE_SIZE,
        )?;

        Ok(Self {
            base_path,
            arrays: vec![BucketArray::new(region, bucket_count)?],
            overflow: OverflowIndex::new(),
            hash_builder,
            mask_size: original_mask_size,
            original_mask_size,
            is_resizing: false,
            resize_counter: 0,
            e_count: 0,
            bucket_space: capacity * bucket_count,
        })
    }

    fn open_existing(base_path: PathBuf, hash_builder: S) -> Result<Self> {
        let meta_path = base_path.join(META_FILE_NAME);
        let meta_bytes = fs::read(&meta_path).wrap_err_with(|| {
            format!(
                "corrupt store: cannot read metadata record '{}'",
                meta_path.display()
            )
        })?;
        let meta = MetaRecord::from_bytes(&meta_bytes)
            .wrap_err_with(|| format!("corrupt store: '{}'", meta_path.display()))?;

        let original_mask_size = meta.original_mask_size();
        let arrays_count = meta.bucket_arrays_count() as usize;
        ensure!(
            arrays_count >= 1,
            "corrupt store: '{}' records no bucket arrays",
            meta_path.display()
        );
        ensure!(
            !meta.is_resizing() || arrays_count >= 2,
            "corrupt store: '{}' records a resize without a target array",
            meta_path.display()
        );

        // A mid-resize store already carries its target array, but the mask
        // only widens at finalisation.
        let mask_size =
            original_mask_size + (arrays_count as u8 - 1) - u8::from(meta.is_resizing());

        let capacity = BucketArray::<K, V>::entry_capacity()? as u64;
        let mut arrays = Vec::with_capacity(arrays_count);
        let mut bucket_space = 0u64;

        for i in 0..arrays_count {
            let width = original_mask_size as u32 + i.saturating_sub(1) as u32;
            let bucket_count = 1u64 << width;
            let path = data_path(&base_path, i);
            let expected_len = bucket_count * PAGE_SIZE as u64;

            let file_meta = fs::metadata(&path).wrap_err_with(|| {
                format!("corrupt store: missing data file '{}'", path.display())
            })?;
            ensure!(
                file_meta.len() == expected_len,
                "corrupt store: '{}' is {} bytes, expected {}",
                path.display(),
                file_meta.len(),
                expected_len
            );

            let region = MappedRegion::open(&path, expected_len as usize)?;
            arrays.push(BucketArray::new(region, bucket_count)?);

            let in_progress_target = meta.is_resizing() && i == arrays_count - 1;
            if in_progress_target {
                bucket_space += meta.resize_counter() * capacity;
            } else {
                bucket_space += bucket_count * capacity;
            }
        }

        let mut overflow = OverflowIndex::new();
        if meta.overflow_count() > 0 {
            let overflow_path = base_path.join(OVERFLOW_FILE_NAME);
            let bytes = fs::read(&overflow_path).wrap_err_with(|| {
                format!(
                    "corrupt store: missing overflow file '{}'",
                    overflow_path.display()
                )
            })?;

            let record_size = overflow_record_size::<K, V>();
            let expected_len = meta.overflow_count() as usize * record_size;
            ensure!(
                bytes.len() == expected_len,
                "corrupt store: '{}' is {} bytes, expected {} records of {}",
                overflow_path.display(),
                bytes.len(),
                meta.overflow_count(),
                record_size
            );

            for chunk in bytes.chunks_exact(record_size) {
                let (coord, hash, key, value) = decode_overflow_record::<K, V>(chunk)?;
                overflow.insert(coord, hash, key, value);
            }
        }

        Ok(Self {
            base_path,
            arrays,
            overflow,
            hash_builder,
            mask_size,
            original_mask_size,
            is_resizing: meta.is_resizing(),
            resize_counter: meta.resize_counter(),
            e_count: meta.e_count(),
            bucket_space,
        })
    }

    /// Number of elements inserted, overflow included.
    pub fn size(&self) -> u64 {
        self.e_count
    }

    pub fn is_empty(&self) -> bool {
        self.e_count == 0
    }

    /// Number of elements currently held by the overflow index.
    pub fn overflow_size(&self) -> u64 {
        self.overflow.len()
    }

    /// Fraction of the live bucket space in use.
    pub fn load(&self) -> f64 {
        self.e_count as f64 / self.bucket_space as f64
    }

    /// Fraction of elements living in the overflow index.
    pub fn overflow_ratio(&self) -> f64 {
        if self.e_count == 0 {
            return 0.0;
        }
        self.overflow.len() as f64 / self.e_count as f64
    }

    /// Current mask width `M`; `2^M` bucket coordinates are addressable.
    pub fn mask_size(&self) -> u8 {
        self.mask_size
    }

    /// Mask width the store was created with.
    pub fn original_mask_size(&self) -> u8 {
        self.original_mask_size
    }

    /// Number of bucket arrays in the directory.
    pub fn bucket_array_count(&self) -> usize {
        self.arrays.len()
    }

    /// Total element capacity of the live buckets.
    pub fn bucket_space(&self) -> u64 {
        self.bucket_space
    }

    pub fn is_resizing(&self) -> bool {
        self.is_resizing
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Looks up the value bound to `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let h = self.hash_builder.hash_one(key);

        // The split protocol can leave a key in overflow while its home
        // bucket is still on the untreated side, so overflow wins.
        if let Some((k, v)) = self.overflow.find(self.overflow_coordinate(h), h) {
            if k == key {
                return Ok(Some(*v));
            }
        }

        let (array_idx, bucket_idx) = self.bucket_coordinates(h);
        let bucket = self.array(array_idx)?.bucket(bucket_idx)?;
        for entry in bucket.iter() {
            let (k, v) = entry?;
            if k == *key {
                return Ok(Some(v));
            }
        }

        Ok(None)
    }

    /// Inserts a `key → value` binding. Duplicate keys are not detected;
    /// a later [`BucketMap::get`] returns whichever copy it meets first.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        let h = self.hash_builder.hash_one(&key);
        let (array_idx, bucket_idx) = self.bucket_coordinates(h);

        let appended = self
            .array_mut(array_idx)?
            .bucket_mut(bucket_idx)?
            .append(&key, &value);

        if !appended {
            self.overflow
                .insert(self.overflow_coordinate(h), h, key, value);
        }

        self.e_count += 1;

        if self.is_resizing {
            for _ in 0..RESIZE_STEP_ITERATIONS {
                if !self.is_resizing {
                    break;
                }
                self.resize_step()?;
            }
        } else if self.should_resize() {
            self.start_resize()?;
        }

        Ok(())
    }

    /// Drives an in-progress resize to completion, starting one first when
    /// none is in progress. Logical contents are unchanged.
    pub fn full_resize(&mut self) -> Result<()> {
        if !self.is_resizing {
            self.start_resize()?;
        }
        while self.is_resizing {
            self.resize_step()?;
        }
        Ok(())
    }

    /// Asks the OS to persist every region, serialises the overflow index
    /// and the metadata record, and waits for the write-back to complete.
    /// The map stays usable afterwards.
    pub fn flush(&mut self) -> Result<()> {
        for array in self.arrays.iter().rev() {
            array.region().sync_async()?;
        }

        self.write_overflow_file()?;
        self.write_meta_file()?;

        for array in self.arrays.iter().rev() {
            array.region().sync()?;
        }

        Ok(())
    }

    fn array(&self, i: usize) -> Result<&BucketArray<K, V>> {
        ensure!(
            i < self.arrays.len(),
            "bucket array {} out of bounds (count={})",
            i,
            self.arrays.len()
        );
        Ok(&self.arrays[i])
    }

    fn array_mut(&mut self, i: usize) -> Result<&mut BucketArray<K, V>> {
        ensure!(
            i < self.arrays.len(),
            "bucket array {} out of bounds (count={})",
            i,
            self.arrays.len()
        );
        Ok(&mut self.arrays[i])
    }

    fn mask(&self) -> u64 {
        (1u64 << self.mask_size) - 1
    }

    /// Resolves a full hash to `(array index, bucket index)` under the
    /// current mask and split watermark.
    fn bucket_coordinates(&self, h: u64) -> (usize, u64) {
        if self.is_resizing {
            // Coordinates below the watermark have already been split; their
            // high-bit half lives in the resize target array.
            let masked = h & self.mask();
            if masked < self.resize_counter && h & (1u64 << self.mask_size) != 0 {
                return (
                    (self.mask_size - self.original_mask_size + 1) as usize,
                    masked,
                );
            }
        }

        let h = h & self.mask();
        if h >> self.original_mask_size != 0 {
            let c = h.ilog2() as u8;
            (
                (c - self.original_mask_size + 1) as usize,
                h ^ (1u64 << c),
            )
        } else {
            (0, h)
        }
    }

    /// Resolves a full hash to its overflow-index coordinate: the masked
    /// hash, widened by one bit for the already-split region.
    fn overflow_coordinate(&self, h: u64) -> u64 {
        let index = h & self.mask();

        if self.is_resizing
            && index < self.resize_counter
            && h & (1u64 << self.mask_size) != 0
        {
            return h & ((1u64 << (self.mask_size + 1)) - 1);
        }

        index
    }

    fn should_resize(&self) -> bool {
        let overflow_count = self.overflow.len();

        if self.e_count as f64 > RESIZE_THRESHOLD_LOAD * self.bucket_space as f64 {
            if overflow_count >= MAX_OVERFLOW_COUNT {
                return true;
            }
            if overflow_count as f64 >= MAX_OVERFLOW_RATIO * self.e_count as f64 {
                return true;
            }
        }

        overflow_count >= EMERGENCY_OVERFLOW_COUNT
    }

    fn start_resize(&mut self) -> Result<()> {
        ensure!(!self.is_resizing, "a resize is already in progress");

        let bucket_count = 1u64 << self.mask_size;
        let region = MappedRegion::open(
            data_path(&self.base_path, self.arrays.len()),
            bucket_count as usize * PAGE_SIZE,
        )?;
        self.arrays.push(BucketArray::new(region, bucket_count)?);

        self.resize_counter = 0;
        self.is_resizing = true;

        Ok(())
    }

    /// Splits the bucket named by the resize counter into the target array,
    /// then drains that coordinate's overflow sub-map into whichever side
    /// now has room.
    fn resize_step(&mut self) -> Result<()> {
        let r = self.resize_counter;
        let mask = 1u64 << self.mask_size;
        let wide_mask = (1u64 << (self.mask_size + 1)) - 1;
        let (array_idx, bucket_idx) = self.bucket_coordinates(r);
        let capacity = self.arrays[0].capacity() as u64;

        let last = self.arrays.len() - 1;
        ensure!(
            array_idx < last,
            "split source bucket resolved into the resize target array"
        );
        let (head, tail) = self.arrays.split_at_mut(last);
        let mut old_bucket = head[array_idx].bucket_mut(bucket_idx)?;
        let mut new_bucket = tail[0].bucket_mut(r)?;

        // The target page may hold stale bytes from a previous life of the
        // file; its counter only becomes meaningful here.
        new_bucket.set_len(0);

        // Compacting walk: the write cursor never overtakes the read index,
        // so reading slot i is always ahead of any write.
        let len = old_bucket.len();
        let mut kept = 0usize;
        for i in 0..len {
            let (key, value) = old_bucket.entry(i)?;
            let h = self.hash_builder.hash_one(&key);
            if h & mask == 0 {
                old_bucket.write_entry(kept, &key, &value)?;
                kept += 1;
            } else if !new_bucket.append(&key, &value) {
                self.overflow.insert(h & wide_mask, h, key, value);
            }
        }
        old_bucket.set_len(kept);

        if let Some(sub) = self.overflow.take(r) {
            for (h, (key, value)) in sub {
                if h & mask == 0 {
                    if !old_bucket.append(&key, &value) {
                        self.overflow.insert(r, h, key, value);
                    }
                } else if !new_bucket.append(&key, &value) {
                    self.overflow.insert(r ^ mask, h, key, value);
                }
            }
        }

        self.bucket_space += capacity;

        if r == mask - 1 {
            self.mask_size += 1;
            self.resize_counter = 0;
            self.is_resizing = false;
        } else {
            self.resize_counter += 1;
        }

        Ok(())
    }

    fn write_overflow_file(&self) -> Result<()> {
        let overflow_path = self.base_path.join(OVERFLOW_FILE_NAME);

        if self.overflow.is_empty() {
            match fs::remove_file(&overflow_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).wrap_err_with(|| {
                        format!(
                            "failed to remove stale overflow file '{}'",
                            overflow_path.display()
                        )
                    });
                }
            }
            return Ok(());
        }

        let record_size = overflow_record_size::<K, V>();
        let mut buf = Vec::with_capacity(self.overflow.len() as usize * record_size);
        let mut record = vec![0u8; record_size];
        for (coord, hash, (key, value)) in self.overflow.iter() {
            encode_overflow_record(&mut record, coord, hash, key, value)?;
            buf.extend_from_slice(&record);
        }

        let tmp_path = self.base_path.join(OVERFLOW_TEMP_FILE_NAME);
        let mut file = File::create(&tmp_path)
            .wrap_err_with(|| format!("failed to create '{}'", tmp_path.display()))?;
        file.write_all(&buf)
            .wrap_err_with(|| format!("failed to write '{}'", tmp_path.display()))?;
        file.sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", tmp_path.display()))?;
        drop(file);

        fs::rename(&tmp_path, &overflow_path).wrap_err_with(|| {
            format!(
                "failed to rename '{}' over '{}'",
                tmp_path.display(),
                overflow_path.display()
            )
        })
    }

    fn write_meta_file(&self) -> Result<()> {
        let record = MetaRecord::new(
            self.original_mask_size,
            self.arrays.len() as u8,
            self.is_resizing,
            self.resize_counter,
            self.e_count,
            self.overflow.len(),
        );

        let meta_path = self.base_path.join(META_FILE_NAME);
        let mut file = File::create(&meta_path)
            .wrap_err_with(|| format!("failed to create '{}'", meta_path.display()))?;
        file.write_all(record.as_bytes())
            .wrap_err_with(|| format!("failed to write '{}'", meta_path.display()))?;
        file.sync_all()
            .wrap_err_with(|| format!("failed to sync '{}'", meta_path.display()))
    }
}

impl<K, V, S> Drop for BucketMap<K, V, S>
where
    K: SlotData + Hash + Eq,
    V: SlotData,
    S: BuildHasher,
{
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn initial_mask_size(setup_size: u64, capacity: u64) -> u8 {
    let target = INITIAL_TARGET_LOAD * capacity as f64;
    if target >= setup_size as f64 {
        1
    } else {
        (setup_size as f64 / target).log2().ceil() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    type Map = BucketMap<u64, u64>;

    #[test]
    fn initial_mask_size_matches_setup() {
        // B = 31 at 512-byte pages with 16-byte elements.
        assert_eq!(initial_mask_size(700, 31), 5);
        assert_eq!(initial_mask_size(1, 31), 1);
        assert_eq!(initial_mask_size(23, 31), 1);
        assert_eq!(initial_mask_size(1 << 15, 31), 11);
    }

    #[test]
    fn create_sizes_the_first_array() {
        let dir = tempdir().unwrap();
        let map = Map::open(dir.path().join("store"), 700).unwrap();

        assert_eq!(map.original_mask_size(), 5);
        assert_eq!(map.mask_size(), 5);
        assert_eq!(map.bucket_array_count(), 1);
        assert_eq!(map.bucket_space(), 31 * 32);
        assert_eq!(map.size(), 0);
        assert!(!map.is_resizing());
    }

    #[test]
    fn open_rejects_non_directory_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        fs::write(&path, b"not a directory").unwrap();

        assert!(Map::open(&path, 700).is_err());
    }

    #[test]
    fn open_of_empty_directory_is_a_corrupt_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");
        fs::create_dir(&path).unwrap();

        assert!(Map::open(&path, 700).is_err());
    }

    #[test]
    fn add_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();

        for i in 0..100u64 {
            map.add(i, i * 2).unwrap();
        }

        assert_eq!(map.size(), 100);
        for i in 0..100u64 {
            assert_eq!(map.get(&i).unwrap(), Some(i * 2));
        }
        assert_eq!(map.get(&500).unwrap(), None);
    }

    #[test]
    fn duplicate_keys_are_both_stored() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();

        map.add(7, 1).unwrap();
        map.add(7, 2).unwrap();

        assert_eq!(map.size(), 2);
        assert!(map.get(&7).unwrap().is_some());
    }

    #[test]
    fn bucket_coordinates_cover_every_array() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();
        map.full_resize().unwrap();
        map.full_resize().unwrap();

        // M₀ = 5, M = 7, directory = [32, 32, 64] buckets.
        assert_eq!(map.mask_size(), 7);
        assert_eq!(map.bucket_array_count(), 3);
        assert_eq!(map.bucket_coordinates(0b0001_0110), (0, 0b1_0110));
        assert_eq!(map.bucket_coordinates(0b0011_0110), (1, 0b1_0110));
        assert_eq!(map.bucket_coordinates(0b0111_0110), (2, 0b11_0110));
        // Bits at or above M are ignored outside a resize.
        assert_eq!(map.bucket_coordinates(1 << 63), (0, 0));
    }

    #[test]
    fn coordinates_respect_the_split_watermark() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();
        map.start_resize().unwrap();
        map.resize_step().unwrap();
        map.resize_step().unwrap();

        // M = 5 still, R = 2, target array index 1.
        assert!(map.is_resizing());
        assert_eq!(map.resize_counter, 2);

        // Coordinate 1 is split: hashes with bit 5 set resolve to the
        // target array and to the widened overflow coordinate.
        assert_eq!(map.bucket_coordinates(0b10_0001), (1, 1));
        assert_eq!(map.overflow_coordinate(0b10_0001), 0b10_0001);
        // Its low half stays put under the old mask.
        assert_eq!(map.bucket_coordinates(0b00_0001), (0, 1));
        assert_eq!(map.overflow_coordinate(0b00_0001), 1);
        // Coordinate 2 is not split yet.
        assert_eq!(map.bucket_coordinates(0b10_0010), (0, 2));
        assert_eq!(map.overflow_coordinate(0b10_0010), 2);
    }

    #[test]
    fn full_resize_preserves_contents_and_widens_mask() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();

        for i in 0..200u64 {
            map.add(i, i).unwrap();
        }

        let mask_before = map.mask_size();
        map.full_resize().unwrap();

        assert_eq!(map.mask_size(), mask_before + 1);
        assert!(!map.is_resizing());
        assert_eq!(map.size(), 200);
        for i in 0..200u64 {
            assert_eq!(map.get(&i).unwrap(), Some(i));
        }
    }

    #[test]
    fn should_resize_requires_load_and_overflow_pressure() {
        let dir = tempdir().unwrap();
        let mut map = Map::open(dir.path().join("store"), 700).unwrap();

        // Load high, overflow empty: not eligible.
        map.e_count = map.bucket_space;
        assert!(!map.should_resize());

        // Load high, overflow past the ratio threshold: eligible.
        for i in 0..((map.e_count / 10) + 1) {
            map.overflow.insert(0, i, i, i);
        }
        assert!(map.should_resize());

        // Growing e_count pushes the overflow ratio back under threshold.
        map.e_count = 10 * map.bucket_space;
        assert!(!map.should_resize());
    }
}
