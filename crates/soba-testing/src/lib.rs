//! Test utilities for Soba services.
//!
//! Provides the contract fixture loader.
//! Import in `#[cfg(test)]` blocks and `tests/` only, never in production code.

pub mod fixture;
