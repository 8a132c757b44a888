//! # Common Test Utilities
//!
//! Shared fixtures used across the unit tests.

/// Simulation test context and the small reference configuration.
pub mod harness;
