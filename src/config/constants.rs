//! # diskmap Configuration Constants
//!
//! This module centralizes the tuning constants of the storage engine,
//! grouping interdependent values together and documenting their
//! relationships. Constants that depend on each other are co-located to
//! prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (512 bytes, one SSD sector)
//!       │
//!       ├─> COUNTER_SIZE (2 bytes, trailing u16 per bucket)
//!       │
//!       └─> bucket capacity B = (PAGE_SIZE - COUNTER_SIZE) / entry size
//!             Derived per key/value instantiation, validated at
//!             BucketArray construction. B must stay below 2^16 so the
//!             trailing counter can represent it.
//!
//! RESIZE_THRESHOLD_LOAD (0.85)
//!       │
//!       └─> must be > INITIAL_TARGET_LOAD (0.75), otherwise a freshly
//!           sized map would be eligible for resizing before the first
//!           insert settles.
//!
//! MAX_OVERFLOW_COUNT (100 000)
//!       │
//!       └─> EMERGENCY_OVERFLOW_COUNT (1 000 000) must be larger; it
//!           triggers a resize regardless of load.
//! ```
//!
//! ## Modifying Constants
//!
//! Before changing any constant:
//! 1. Check the dependency graph above
//! 2. Run `cargo build` to verify the compile-time assertions
//! 3. Run the full test suite (the end-to-end tests assume PAGE_SIZE = 512)

// ============================================================================
// PAGE LAYOUT
// These define the on-disk bucket geometry used throughout the engine
// ============================================================================

/// Size of each bucket page in bytes. Matches an SSD sector so a bucket
/// probe costs a single device read.
pub const PAGE_SIZE: usize = 512;

/// Size of the per-bucket element counter, stored little-endian in the
/// final bytes of the page. A `u16` counter caps bucket capacity at 65 535.
pub const COUNTER_SIZE: usize = 2;

const _: () = assert!(
    COUNTER_SIZE < PAGE_SIZE,
    "a bucket page must have room for at least the counter"
);

// ============================================================================
// RESIZE POLICY
// Thresholds deciding when the directory doubles, and how fast
// ============================================================================

/// Load factor above which the map becomes eligible for a resize
/// (combined with one of the overflow conditions below).
pub const RESIZE_THRESHOLD_LOAD: f64 = 0.85;

/// Target load used when sizing a fresh map: the original mask width is the
/// smallest `M₀` with `2^M₀ · B · INITIAL_TARGET_LOAD ≥ setup_size`.
pub const INITIAL_TARGET_LOAD: f64 = 0.75;

/// Absolute overflow-index population that, under high load, triggers a
/// resize.
pub const MAX_OVERFLOW_COUNT: u64 = 100_000;

/// Overflow-index population as a fraction of the element count that, under
/// high load, triggers a resize.
pub const MAX_OVERFLOW_RATIO: f64 = 0.10;

/// Overflow-index population that triggers a resize regardless of load.
pub const EMERGENCY_OVERFLOW_COUNT: u64 = 10 * MAX_OVERFLOW_COUNT;

/// Number of incremental split steps run after each insert while a resize
/// is in progress. Amortises the rehash cost and bounds insert tail latency.
pub const RESIZE_STEP_ITERATIONS: usize = 4;

const _: () = assert!(
    RESIZE_THRESHOLD_LOAD > INITIAL_TARGET_LOAD,
    "a freshly sized map must not be immediately eligible for resizing"
);

const _: () = assert!(
    EMERGENCY_OVERFLOW_COUNT > MAX_OVERFLOW_COUNT,
    "the emergency overflow threshold must dominate the load-gated one"
);
