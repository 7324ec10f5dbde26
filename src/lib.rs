//! # diskmap - Persistent Extendible-Hash Map for SSDs
//!
//! diskmap is a disk-resident associative map built for SSD storage. Given a
//! fixed key/value element type it supports insertion (`add`) and point
//! lookup (`get`), persists bindings across process restarts under an
//! application-chosen directory, and keeps both operations near
//! constant-time while the map grows orders of magnitude past its initial
//! sizing. This implementation prioritizes:
//!
//! - **Zero-copy probes**: lookups scan bucket pages directly in the mmap
//! - **One sector per probe**: buckets are 512-byte pages, so a cold lookup
//!   costs a single SSD read
//! - **Bounded insert latency**: directory doubling is amortised, four
//!   bucket splits per insert
//!
//! ## Quick Start
//!
//! ```ignore
//! use diskmap::BucketMap;
//!
//! let mut map: BucketMap<u64, u64> = BucketMap::open("./mymap", 10_000)?;
//!
//! map.add(42, 1)?;
//! assert_eq!(map.get(&42)?, Some(1));
//!
//! map.flush()?;
//! ```
//!
//! ## Architecture
//!
//! diskmap uses a layered architecture:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       Public API (BucketMap)        │
//! ├──────────────────┬──────────────────┤
//! │  Extendible-Hash │  Overflow Index  │
//! │  State Machine   │  (in-memory)     │
//! ├──────────────────┴──────────────────┤
//! │     Bucket Arrays (512B pages)      │
//! ├─────────────────────────────────────┤
//! │     Memory-Mapped File Regions      │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! A map owns one directory:
//!
//! ```text
//! map_dir/
//! ├── data.0           # bucket array 0 (2^M₀ pages)
//! ├── data.1           # appended on the first doubling
//! ├── data.i           # 2^(M₀+i-1) pages for i ≥ 1
//! ├── overflow.bin     # serialised overflow index (absent when empty)
//! └── meta.bin         # mask widths, resize state, counters
//! ```
//!
//! ## Scope
//!
//! The map is insert-and-lookup only (no deletion), single-threaded by
//! contract, and durable only through a clean [`BucketMap::flush`] (which
//! also runs on drop). A corrupted directory is detected only as far as
//! missing or mis-sized files; contents are not checksummed.
//!
//! ## Module Overview
//!
//! - [`map`]: the extendible-hash state machine and overflow index
//! - [`storage`]: mapped regions, bucket geometry, durable record layouts
//! - [`config`]: page geometry and resize-policy constants

pub mod config;
pub mod map;
pub mod storage;

pub use map::{BucketMap, DefaultHashBuilder, OverflowIndex};
pub use storage::SlotData;
