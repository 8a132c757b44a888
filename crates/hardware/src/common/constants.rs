//! Global controller constants.
//!
//! This module defines the fixed constants of the memory controller model. It includes:
//! 1. **Address Constants:** Address-space selection and offset masks.
//! 2. **Word Constants:** Column granularity and write-mask word size.
//! 3. **Bus Constants:** Legal bus width range and system bus timing defaults.
//! 4. **Snapshot Constants:** File names used by the save/load memory commands.

/// Top address bit: set for system memory, clear for GPU memory.
pub const ADDRESS_SPACE_MASK: u32 = 0x8000_0000;

/// Mask extracting the byte offset within an address space.
pub const ADDRESS_OFFSET_MASK: u32 = !ADDRESS_SPACE_MASK;

/// Bytes per DRAM column and per write-mask word.
pub const WORD_BYTES: u32 = 4;

/// Bytes per burst beat; a burst carries `BURST_BEAT_BYTES * burst_length` bytes.
pub const BURST_BEAT_BYTES: u32 = 4;

/// Narrowest legal unit bus width in bytes per cycle.
pub const MIN_BUS_WIDTH: u32 = 8;

/// Widest legal unit bus width in bytes per cycle.
pub const MAX_BUS_WIDTH: u32 = 1024;

/// Pattern written to every 32-bit word of system memory at construction.
pub const SYSTEM_MEMORY_PATTERN: u32 = 0xDEAD_CAFE;

/// Number of system buses (bus 0 carries reads, bus 1 carries writes).
pub const SYSTEM_BUSES: usize = 2;

/// System bus carrying reads.
pub const SYSTEM_READ_BUS: usize = 0;

/// System bus carrying writes.
pub const SYSTEM_WRITE_BUS: usize = 1;

/// File name of the GPU memory snapshot.
pub const GPU_SNAPSHOT_FILE: &str = "gpumc.gpumem.snapshot";

/// File name of the system memory snapshot.
pub const SYSTEM_SNAPSHOT_FILE: &str = "gpumc.sysmem.snapshot";
