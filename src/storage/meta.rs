//! # Durable Record Layouts
//!
//! This module defines the zerocopy-based records that round-trip through
//! the store directory: the `meta.bin` metadata record and the packed
//! `overflow.bin` record.
//!
//! ## meta.bin (27 bytes)
//!
//! ```text
//! Offset  Size  Field                Description
//! ------  ----  -------------------  --------------------------------
//! 0       1     original_mask_size   Mask width at creation (M₀)
//! 1       1     bucket_arrays_count  Number of data.i files
//! 2       1     is_resizing          1 iff a doubling is in progress
//! 3       8     resize_counter       Next bucket to split (u64 LE)
//! 11      8     e_count              Total inserted elements (u64 LE)
//! 19      8     overflow_count       Overflow index population (u64 LE)
//! ```
//!
//! The record is written once per flush and read once per open; the current
//! mask width is derived on open as
//! `original_mask_size + bucket_arrays_count - 1`.
//!
//! ## overflow.bin records (16 + S bytes each)
//!
//! ```text
//! Offset  Size           Field
//! ------  ----           --------------------------------
//! 0       8              bucket coordinate (u64 LE)
//! 8       8              full key hash (u64 LE)
//! 16      size_of::<K>() key bytes
//! 16+K    size_of::<V>() value bytes
//! ```
//!
//! One explicit record shape is used both to size the file
//! (`overflow_count · record size`) and to read it back, so the two can
//! never disagree.
//!
//! ## Zerocopy Safety
//!
//! `MetaRecord` derives the usual zerocopy trait set (`FromBytes`,
//! `IntoBytes`, `Immutable`, `KnownLayout`, `Unaligned`); all multi-byte
//! fields are `little_endian::U64`, so the struct is padding-free and can be
//! parsed from any byte offset.

use std::mem::size_of;

use eyre::{ensure, Result};
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::bucket::SlotData;

/// Size of the `meta.bin` record in bytes.
pub const META_RECORD_SIZE: usize = 27;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaRecord {
    original_mask_size: u8,
    bucket_arrays_count: u8,
    is_resizing: u8,
    resize_counter: U64,
    e_count: U64,
    overflow_count: U64,
}

const _: () = assert!(size_of::<MetaRecord>() == META_RECORD_SIZE);

impl MetaRecord {
    pub fn new(
        original_mask_size: u8,
        bucket_arrays_count: u8,
        is_resizing: bool,
        resize_counter: u64,
        e_count: u64,
        overflow_count: u64,
    ) -> Self {
        Self {
            original_mask_size,
            bucket_arrays_count,
            is_resizing: is_resizing.into(),
            resize_counter: U64::new(resize_counter),
            e_count: U64::new(e_count),
            overflow_count: U64::new(overflow_count),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() == META_RECORD_SIZE,
            "metadata record is {} bytes, expected {}",
            bytes.len(),
            META_RECORD_SIZE
        );

        Self::read_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to parse MetaRecord: {:?}", e))
    }

    pub fn original_mask_size(&self) -> u8 {
        self.original_mask_size
    }

    pub fn bucket_arrays_count(&self) -> u8 {
        self.bucket_arrays_count
    }

    pub fn is_resizing(&self) -> bool {
        self.is_resizing != 0
    }

    pub fn resize_counter(&self) -> u64 {
        self.resize_counter.get()
    }

    pub fn e_count(&self) -> u64 {
        self.e_count.get()
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.get()
    }
}

/// On-disk size of one `overflow.bin` record for the given element type.
pub fn overflow_record_size<K: SlotData, V: SlotData>() -> usize {
    2 * size_of::<u64>() + size_of::<K>() + size_of::<V>()
}

/// Encodes one overflow record into `buf`, which must be exactly
/// [`overflow_record_size`] bytes.
pub fn encode_overflow_record<K: SlotData, V: SlotData>(
    buf: &mut [u8],
    coord: u64,
    hash: u64,
    key: &K,
    value: &V,
) -> Result<()> {
    ensure!(
        buf.len() == overflow_record_size::<K, V>(),
        "overflow record buffer is {} bytes, expected {}",
        buf.len(),
        overflow_record_size::<K, V>()
    );

    let key_end = 16 + size_of::<K>();
    buf[..8].copy_from_slice(U64::new(coord).as_bytes());
    buf[8..16].copy_from_slice(U64::new(hash).as_bytes());
    buf[16..key_end].copy_from_slice(key.as_bytes());
    buf[key_end..].copy_from_slice(value.as_bytes());
    Ok(())
}

/// Decodes one overflow record from `buf`, which must be exactly
/// [`overflow_record_size`] bytes.
pub fn decode_overflow_record<K: SlotData, V: SlotData>(buf: &[u8]) -> Result<(u64, u64, K, V)> {
    ensure!(
        buf.len() == overflow_record_size::<K, V>(),
        "overflow record is {} bytes, expected {}",
        buf.len(),
        overflow_record_size::<K, V>()
    );

    let key_end = 16 + size_of::<K>();
    let coord = U64::read_from_bytes(&buf[..8])
        .map_err(|e| eyre::eyre!("failed to parse overflow coordinate: {:?}", e))?;
    let hash = U64::read_from_bytes(&buf[8..16])
        .map_err(|e| eyre::eyre!("failed to parse overflow hash: {:?}", e))?;
    let key = K::read_from_bytes(&buf[16..key_end])
        .map_err(|e| eyre::eyre!("failed to parse overflow key: {:?}", e))?;
    let value = V::read_from_bytes(&buf[key_end..])
        .map_err(|e| eyre::eyre!("failed to parse overflow value: {:?}", e))?;

    Ok((coord.get(), hash.get(), key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_record_size_is_27() {
        assert_eq!(size_of::<MetaRecord>(), 27);
    }

    #[test]
    fn meta_record_roundtrip() {
        let record = MetaRecord::new(5, 3, true, 17, 100_000, 42);

        let parsed = MetaRecord::from_bytes(record.as_bytes()).unwrap();

        assert_eq!(parsed.original_mask_size(), 5);
        assert_eq!(parsed.bucket_arrays_count(), 3);
        assert!(parsed.is_resizing());
        assert_eq!(parsed.resize_counter(), 17);
        assert_eq!(parsed.e_count(), 100_000);
        assert_eq!(parsed.overflow_count(), 42);
    }

    #[test]
    fn meta_record_rejects_wrong_length() {
        assert!(MetaRecord::from_bytes(&[0u8; 26]).is_err());
        assert!(MetaRecord::from_bytes(&[0u8; 28]).is_err());
    }

    #[test]
    fn overflow_record_roundtrip() {
        let mut buf = vec![0u8; overflow_record_size::<u64, u64>()];
        encode_overflow_record(&mut buf, 9, 0xDEAD_BEEF, &7u64, &11u64).unwrap();

        let (coord, hash, key, value) = decode_overflow_record::<u64, u64>(&buf).unwrap();

        assert_eq!(coord, 9);
        assert_eq!(hash, 0xDEAD_BEEF);
        assert_eq!(key, 7);
        assert_eq!(value, 11);
    }

    #[test]
    fn overflow_record_rejects_wrong_length() {
        let buf = vec![0u8; overflow_record_size::<u64, u64>() - 1];
        assert!(decode_overflow_record::<u64, u64>(&buf).is_err());
    }
}
