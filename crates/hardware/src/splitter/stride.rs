//! Fixed-stride interleaving.
//!
//! Consecutive `channel_interleaving`-byte blocks rotate across channels and,
//! inside a channel, consecutive `bank_interleaving`-byte blocks rotate across
//! banks. Both granularities are powers of two, so the selectors are plain bit
//! fields. Row and column come from the address once the channel field and then
//! the bank field have been squeezed out.

use crate::common::error::ConfigError;

use super::{AddressInfo, AddressMapping, Geometry, selector_bits};

/// Shift/mask address mapping.
#[derive(Debug, Clone)]
pub struct StrideMapping {
    geometry: Geometry,
    channel_shift: u32,
    channel_bits: u32,
    bank_shift: u32,
    bank_bits: u32,
}

impl StrideMapping {
    /// Creates a stride mapping.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Validated geometry.
    /// * `channel_interleaving` - Bytes per channel block.
    /// * `bank_interleaving` - Bytes per bank block.
    ///
    /// # Returns
    ///
    /// The mapping, or `ConfigError::Interleaving` when a granularity is not a
    /// power of two multiple of the burst size.
    pub fn new(geometry: &Geometry, channel_interleaving: u32, bank_interleaving: u32) -> Result<Self, ConfigError> {
        let check = |which, value: u32| {
            if value.is_power_of_two() && value % geometry.burst_bytes == 0 {
                Ok(value.trailing_zeros())
            } else {
                Err(ConfigError::Interleaving {
                    which,
                    value,
                    burst_bytes: geometry.burst_bytes,
                })
            }
        };
        Ok(Self {
            geometry: *geometry,
            channel_shift: check("channel", channel_interleaving)?,
            channel_bits: selector_bits(geometry.channels),
            bank_shift: check("bank", bank_interleaving)?,
            bank_bits: selector_bits(geometry.banks),
        })
    }
}

/// Removes `bits` bits at `shift`, moving the higher bits down.
const fn squeeze(addr: u64, shift: u32, bits: u32) -> u64 {
    let low = addr & ((1 << shift) - 1);
    ((addr >> (shift + bits)) << shift) | low
}

/// Inserts `value` as a `bits`-wide field at `shift`, moving the higher bits up.
const fn expand(addr: u64, shift: u32, bits: u32, value: u64) -> u64 {
    let low = addr & ((1 << shift) - 1);
    ((addr >> shift) << (shift + bits)) | (value << shift) | low
}

impl AddressMapping for StrideMapping {
    fn extract_address_info(&self, address: u32) -> AddressInfo {
        let addr = u64::from(address);
        let channel = (addr >> self.channel_shift) & ((1 << self.channel_bits) - 1);
        let in_channel = squeeze(addr, self.channel_shift, self.channel_bits);
        let bank = (in_channel >> self.bank_shift) & ((1 << self.bank_bits) - 1);
        let in_bank = squeeze(in_channel, self.bank_shift, self.bank_bits);
        let (row, start_col) = self.geometry.row_col(in_bank);
        AddressInfo {
            channel: channel as u32,
            bank: bank as u32,
            row,
            start_col,
        }
    }

    fn create_address(&self, info: &AddressInfo) -> u32 {
        let in_bank = self.geometry.compact_offset(info.row, info.start_col);
        let in_channel = expand(in_bank, self.bank_shift, self.bank_bits, u64::from(info.bank));
        expand(in_channel, self.channel_shift, self.channel_bits, u64::from(info.channel)) as u32
    }
}
