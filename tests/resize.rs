//! # Resize and Overflow Rehoming Tests
//!
//! Exercises the incremental doubling protocol under an adversarial hash
//! function that funnels every key into one bucket, plus the idempotence of
//! `full_resize` on quiescent and mid-resize maps.
//!
//! ## Requirements Tested
//!
//! - R1: elements that overflowed a full bucket are rehomed into buckets by
//!   a completed resize (overflow index drains to zero)
//! - R2: the serialised overflow index survives a flush/reopen cycle
//! - R3: `full_resize` leaves logical contents unchanged, whether started
//!   on a quiescent or a mid-resize map
//! - R4: equal full hashes in the overflow index resolve last-write-wins

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

use diskmap::BucketMap;
use tempfile::tempdir;

/// Funnels every key into bucket coordinate 3 at the initial mask width of
/// 5: the low six hash bits are `3` or `3 | 32` keyed on the low bit of the
/// input, and the remaining bits carry the key so full hashes stay
/// distinct. A resize to mask width 6 separates the two classes.
#[derive(Default)]
struct FunnelHasher {
    last: u64,
}

impl Hasher for FunnelHasher {
    fn finish(&self) -> u64 {
        (self.last << 6) | ((self.last & 1) << 5) | 3
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; 8];
        for (i, b) in bytes.iter().take(8).enumerate() {
            buf[i] = *b;
        }
        self.last = u64::from_le_bytes(buf);
    }

    fn write_u64(&mut self, n: u64) {
        self.last = n;
    }
}

type FunnelBuilder = BuildHasherDefault<FunnelHasher>;

/// Collapses every key onto one full hash value.
#[derive(Default)]
struct ConstantHasher;

impl Hasher for ConstantHasher {
    fn finish(&self) -> u64 {
        7
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

type ConstantBuilder = BuildHasherDefault<ConstantHasher>;

struct XorShift128 {
    x: u64,
    y: u64,
    z: u64,
    w: u64,
}

impl XorShift128 {
    fn new() -> Self {
        Self {
            x: 4821604254758231733,
            y: 2889736185279303868,
            z: 8945159673490801361,
            w: 4491977415880625016,
        }
    }

    fn next(&mut self) -> u64 {
        let mut t = self.x;
        t ^= t << 11;
        t ^= t >> 8;
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w ^= self.w >> 19;
        self.w ^= t;
        self.w
    }
}

mod overflow_rehoming {
    use super::*;

    // B = 31 at 512-byte pages with 16-byte elements; B + 10 inserts into
    // one bucket leave 10 elements in the overflow index.
    const OVERFLOWING_COUNT: u64 = 41;

    #[test]
    fn full_resize_drains_the_overflow_index() {
        let dir = tempdir().unwrap();
        let mut map: BucketMap<u64, u64, FunnelBuilder> =
            BucketMap::with_hasher(dir.path().join("map"), 700, FunnelBuilder::default())
                .unwrap();

        assert_eq!(map.original_mask_size(), 5);

        for k in 0..OVERFLOWING_COUNT {
            map.add(k, k * 10).unwrap();
        }

        assert_eq!(map.size(), OVERFLOWING_COUNT);
        assert_eq!(map.overflow_size(), 10);

        map.full_resize().unwrap();

        assert_eq!(map.overflow_size(), 0);
        assert_eq!(map.mask_size(), 6);
        assert_eq!(map.bucket_array_count(), 2);
        for k in 0..OVERFLOWING_COUNT {
            assert_eq!(map.get(&k).unwrap(), Some(k * 10), "lost key {}", k);
        }
    }

    #[test]
    fn overflow_index_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map");

        {
            let mut map: BucketMap<u64, u64, FunnelBuilder> =
                BucketMap::with_hasher(&path, 700, FunnelBuilder::default()).unwrap();
            for k in 0..OVERFLOWING_COUNT {
                map.add(k, k * 10).unwrap();
            }
            assert_eq!(map.overflow_size(), 10);
        }

        // 10 records of (coord u64 | hash u64 | key u64 | value u64).
        let overflow_len = std::fs::metadata(path.join("overflow.bin")).unwrap().len();
        assert_eq!(overflow_len, 10 * 32);

        let mut map: BucketMap<u64, u64, FunnelBuilder> =
            BucketMap::with_hasher(&path, 700, FunnelBuilder::default()).unwrap();

        assert_eq!(map.size(), OVERFLOWING_COUNT);
        assert_eq!(map.overflow_size(), 10);
        for k in 0..OVERFLOWING_COUNT {
            assert_eq!(map.get(&k).unwrap(), Some(k * 10), "lost key {}", k);
        }

        map.full_resize().unwrap();
        assert_eq!(map.overflow_size(), 0);
        for k in 0..OVERFLOWING_COUNT {
            assert_eq!(map.get(&k).unwrap(), Some(k * 10));
        }
    }

    #[test]
    fn equal_full_hashes_in_overflow_resolve_last_write_wins() {
        let dir = tempdir().unwrap();
        let mut map: BucketMap<u64, u64, ConstantBuilder> =
            BucketMap::with_hasher(dir.path().join("map"), 700, ConstantBuilder::default())
                .unwrap();

        // Fill bucket 7, then overflow twice under the one shared hash.
        for k in 0..33u64 {
            map.add(k, k).unwrap();
        }

        assert_eq!(map.size(), 33);
        assert_eq!(map.overflow_size(), 1);

        // The bucket-resident elements scan by key.
        for k in 0..31u64 {
            assert_eq!(map.get(&k).unwrap(), Some(k));
        }
        // Of the two overflowed elements, the later write won.
        assert_eq!(map.get(&32).unwrap(), Some(32));
        assert_eq!(map.get(&31).unwrap(), None);
    }
}

mod idempotence {
    use super::*;

    #[test]
    fn full_resize_on_quiescent_map_preserves_contents() {
        let dir = tempdir().unwrap();
        let mut map: BucketMap<u64, u64> = BucketMap::open(dir.path().join("map"), 700).unwrap();

        let mut rng = XorShift128::new();
        let mut reference = HashMap::new();
        for _ in 0..500 {
            let k = rng.next();
            map.add(k, k).unwrap();
            reference.insert(k, k);
        }

        for round in 0..2 {
            assert!(!map.is_resizing());
            map.full_resize().unwrap();

            assert_eq!(map.size(), 500);
            for (k, v) in &reference {
                assert_eq!(
                    map.get(k).unwrap(),
                    Some(*v),
                    "lost key {} in round {}",
                    k,
                    round
                );
            }
        }
    }

    #[test]
    fn full_resize_completes_a_resize_in_progress() {
        let dir = tempdir().unwrap();
        let mut map: BucketMap<u64, u64> = BucketMap::open(dir.path().join("map"), 700).unwrap();

        let mut rng = XorShift128::new();
        let mut reference = HashMap::new();
        loop {
            let k = rng.next();
            map.add(k, k).unwrap();
            reference.insert(k, k);
            if map.is_resizing() {
                break;
            }
        }

        map.full_resize().unwrap();
        assert!(!map.is_resizing());

        assert_eq!(map.size(), reference.len() as u64);
        for (k, v) in &reference {
            assert_eq!(map.get(k).unwrap(), Some(*v), "lost key {}", k);
        }
    }
}
