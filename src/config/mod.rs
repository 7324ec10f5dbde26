//! # diskmap Configuration Module
//!
//! This module centralizes the tuning constants of the engine. Constants are
//! grouped by their functional area and interdependencies are documented and
//! enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The resize policy reads four thresholds that only make sense relative to
//! each other (and to the bucket geometry). Co-locating them with
//! compile-time checks keeps a change to one from silently invalidating
//! another.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
