//! Address splitting.
//!
//! This module maps linear GPU offsets to DRAM coordinates and cuts requests into
//! channel transactions. It provides:
//! 1. **Coordinates:** [`AddressInfo`] and the validated DRAM [`Geometry`].
//! 2. **Mappings:** The [`AddressMapping`] trait with a fixed-stride and an explicit
//!    bit-mask implementation; both are exact bijections over the configured memory.
//! 3. **Request Splitting:** [`RequestSplitter`] walks a request burst by burst and
//!    merges consecutive bursts that land in the same channel, bank and row.
//! 4. **Splitter Selection:** [`SplitterPair`] picks the first or second interleaving
//!    by comparing the request against a run-time start address.

use std::fmt;

use crate::common::constants::WORD_BYTES;
use crate::common::error::ConfigError;
use crate::config::{Config, InterleavingConfig};

/// Explicit bit-mask interleaving.
pub mod bitmask;

/// Burst-by-burst request splitting.
pub mod request;

/// First/second interleaving selection.
pub mod select;

/// Fixed-stride interleaving.
pub mod stride;

pub use bitmask::BitmaskMapping;
pub use request::{ChunkPlan, RequestSplitter};
pub use select::SplitterPair;
pub use stride::StrideMapping;

/// DRAM coordinate of a burst.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressInfo {
    /// Channel index.
    pub channel: u32,
    /// Bank index inside the channel.
    pub bank: u32,
    /// Row index inside the bank.
    pub row: u32,
    /// First 32-bit column inside the row.
    pub start_col: u32,
}

impl AddressInfo {
    /// Creates a coordinate.
    pub const fn new(channel: u32, bank: u32, row: u32, start_col: u32) -> Self {
        Self {
            channel,
            bank,
            row,
            start_col,
        }
    }

    /// Whether two coordinates address the same channel, bank and row.
    pub const fn same_page(&self, other: &Self) -> bool {
        self.channel == other.channel && self.bank == other.bank && self.row == other.row
    }
}

impl fmt::Display for AddressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(ch={}, bank={}, row={}, col={})",
            self.channel, self.bank, self.row, self.start_col
        )
    }
}

/// Validated DRAM geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Channels.
    pub channels: u32,
    /// Banks per channel.
    pub banks: u32,
    /// Rows per bank.
    pub bank_rows: u32,
    /// 32-bit columns per row.
    pub bank_cols: u32,
    /// Row size in bytes.
    pub row_size: u32,
    /// Burst size in bytes.
    pub burst_bytes: u32,
    /// Total GPU memory in bytes.
    pub memory_size: u64,
}

impl Geometry {
    /// Derives the geometry from a configuration.
    ///
    /// Only the checks needed to make the derived values meaningful are done
    /// here; `Config::validate` covers the rest.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let m = &config.memory;
        if m.channels == 0 {
            return Err(ConfigError::ChannelCount(m.channels));
        }
        if m.banks_per_channel == 0 {
            return Err(ConfigError::BankCount(m.banks_per_channel));
        }
        if m.burst_length == 0 {
            return Err(ConfigError::BurstLength);
        }
        let burst_bytes = config.burst_bytes();
        if m.row_size == 0 || m.row_size % burst_bytes != 0 {
            return Err(ConfigError::RowSize {
                row_size: m.row_size,
                burst_bytes,
            });
        }
        let granule = u64::from(m.channels) * u64::from(m.banks_per_channel) * u64::from(m.row_size);
        if m.gpu_memory_size == 0 || m.gpu_memory_size % granule != 0 {
            return Err(ConfigError::MemorySize {
                size: m.gpu_memory_size,
                granule,
            });
        }
        Ok(Self {
            channels: m.channels,
            banks: m.banks_per_channel,
            bank_rows: (m.gpu_memory_size / granule) as u32,
            bank_cols: m.row_size / WORD_BYTES,
            row_size: m.row_size,
            burst_bytes,
            memory_size: m.gpu_memory_size,
        })
    }

    /// Whether every field of `info` is inside the geometry.
    pub const fn contains(&self, info: &AddressInfo) -> bool {
        info.channel < self.channels
            && info.bank < self.banks
            && info.row < self.bank_rows
            && info.start_col < self.bank_cols
    }

    /// Splits an offset with channel and bank bits already removed into row and column.
    pub(crate) const fn row_col(&self, compact: u64) -> (u32, u32) {
        let row = compact / self.row_size as u64;
        let col = (compact % self.row_size as u64) / WORD_BYTES as u64;
        (row as u32, col as u32)
    }

    /// Inverse of [`Self::row_col`].
    pub(crate) const fn compact_offset(&self, row: u32, col: u32) -> u64 {
        row as u64 * self.row_size as u64 + col as u64 * WORD_BYTES as u64
    }
}

/// Bijective mapping between GPU offsets and DRAM coordinates.
pub trait AddressMapping: Send + Sync + fmt::Debug {
    /// Maps a GPU offset to its coordinate.
    fn extract_address_info(&self, address: u32) -> AddressInfo;

    /// Maps a coordinate back to its GPU offset.
    fn create_address(&self, info: &AddressInfo) -> u32;
}

/// Builds the mapping described by `desc`.
///
/// # Arguments
///
/// * `desc` - Interleaving description from the configuration.
/// * `geometry` - Validated geometry.
///
/// # Returns
///
/// The boxed mapping, or the configuration error that prevents building it.
pub fn build_mapping(desc: &InterleavingConfig, geometry: &Geometry) -> Result<Box<dyn AddressMapping>, ConfigError> {
    Ok(match desc {
        InterleavingConfig::Stride {
            channel_interleaving,
            bank_interleaving,
        } => Box::new(StrideMapping::new(geometry, *channel_interleaving, *bank_interleaving)?),
        InterleavingConfig::Bitmask {
            channel_bits,
            bank_bits,
        } => Box::new(BitmaskMapping::new(geometry, channel_bits, bank_bits)?),
    })
}

/// Number of selector bits needed for `selections` values (`ceil(log2(n))`).
pub(crate) const fn selector_bits(selections: u32) -> u32 {
    if selections <= 1 {
        0
    } else {
        u32::BITS - (selections - 1).leading_zeros()
    }
}
