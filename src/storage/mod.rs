//! # Storage Module
//!
//! This module provides the on-disk layer of the map: memory-mapped regions,
//! the page-sized bucket geometry laid over them, and the durable record
//! formats that survive a restart.
//!
//! ## Architecture Overview
//!
//! The storage layer is built around memory-mapped I/O. Instead of copying
//! bucket pages between kernel and user space, data files are mapped
//! directly into the process address space:
//!
//! - **Zero-copy probes**: a bucket scan reads straight out of the mapping
//! - **Minimal syscall overhead**: page faults handled transparently by the
//!   OS
//! - **Efficient caching**: the OS page cache is the bucket cache
//!
//! ## Store Directory
//!
//! A map owns one directory:
//!
//! ```text
//! store_dir/
//! ├── data.0          # bucket array 0 (2^M₀ pages)
//! ├── data.1          # bucket array 1 (2^M₀ pages)
//! ├── data.2          # bucket array 2 (2^(M₀+1) pages)
//! ├── overflow.bin    # serialised overflow index (absent when empty)
//! └── meta.bin        # 27-byte metadata record
//! ```
//!
//! Each `data.i` file is one [`MappedRegion`] wrapped by one
//! [`BucketArray`]; arrays are append-only and never shrink.
//!
//! ## Page Size
//!
//! All bucket storage uses 512-byte pages, matching an SSD sector: one
//! bucket probe is one device read, and a bucket never straddles sectors.
//!
//! ## Module Organization
//!
//! - `region`: fixed-length memory-mapped file regions ([`MappedRegion`])
//! - `bucket`: page-sized bucket views with packed slots ([`BucketArray`])
//! - `meta`: durable metadata and overflow record layouts
//!
//! ## Thread Safety
//!
//! The storage layer is single-writer by contract; none of these types are
//! `Sync`. Callers needing shared access must wrap the owning map in an
//! external exclusive lock.

mod bucket;
mod meta;
mod region;

pub use bucket::{BucketArray, BucketMut, BucketRef, SlotData};
pub use meta::{
    decode_overflow_record, encode_overflow_record, overflow_record_size, MetaRecord,
    META_RECORD_SIZE,
};
pub use region::MappedRegion;
