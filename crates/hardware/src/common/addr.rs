//! GPU and system address types.
//!
//! Every unit-facing address is 32 bits wide. The top bit selects the address
//! space; the remaining 31 bits are a byte offset into that space. This module
//! provides:
//! 1. **Address Spaces:** Distinguishes GPU-local memory from system-mapped memory.
//! 2. **Address Manipulation:** Splits a raw address into space and offset and back.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{ADDRESS_OFFSET_MASK, ADDRESS_SPACE_MASK};

/// Address space selected by the top address bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressSpace {
    /// GPU-local DRAM behind the channel schedulers.
    Gpu,
    /// Flat system memory reached through the two system buses.
    System,
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => f.write_str("gpu"),
            Self::System => f.write_str("system"),
        }
    }
}

/// A raw unit-facing address: address space bit plus byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GpuAddr(pub u32);

impl GpuAddr {
    /// Creates an address from a raw 32-bit value.
    #[inline(always)]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Builds an address in the given space from a byte offset.
    ///
    /// # Arguments
    ///
    /// * `space` - Target address space.
    /// * `offset` - Byte offset; the top bit is discarded.
    ///
    /// # Returns
    ///
    /// The combined raw address.
    pub const fn in_space(space: AddressSpace, offset: u32) -> Self {
        let offset = offset & ADDRESS_OFFSET_MASK;
        match space {
            AddressSpace::Gpu => Self(offset),
            AddressSpace::System => Self(offset | ADDRESS_SPACE_MASK),
        }
    }

    /// Returns the raw 32-bit value.
    #[inline(always)]
    pub const fn val(self) -> u32 {
        self.0
    }

    /// Returns the address space selected by the top bit.
    #[inline(always)]
    pub const fn space(self) -> AddressSpace {
        if self.0 & ADDRESS_SPACE_MASK == 0 {
            AddressSpace::Gpu
        } else {
            AddressSpace::System
        }
    }

    /// Returns the byte offset inside the selected address space.
    #[inline(always)]
    pub const fn offset(self) -> u32 {
        self.0 & ADDRESS_OFFSET_MASK
    }
}

impl fmt::Display for GpuAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
