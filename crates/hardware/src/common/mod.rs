//! Common types used throughout the memory controller model.
//!
//! This module provides the building blocks shared by every other component:
//! 1. **Address Types:** Address-space aware unit addresses.
//! 2. **Constants:** Address masks, word sizes, bus limits and snapshot names.
//! 3. **Error Handling:** Configuration errors and fatal simulation errors.

/// Address type definitions (GPU and system address spaces).
pub mod addr;

/// Common constants used throughout the controller.
pub mod constants;

/// Configuration and simulation error types.
pub mod error;

pub use addr::{AddressSpace, GpuAddr};
pub use error::{ConfigError, SimError};
