//! Explicit bit-mask interleaving.
//!
//! The channel and bank selectors are gathered from arbitrary, disjoint address
//! bits (least significant selector bit first). The remaining bits are packed
//! downwards to form the in-bank offset from which row and column are taken.

use crate::common::error::ConfigError;

use super::{AddressInfo, AddressMapping, Geometry, selector_bits};

/// Width of a GPU offset in bits.
const OFFSET_BITS: u32 = 31;

/// Bit-gather address mapping.
#[derive(Debug, Clone)]
pub struct BitmaskMapping {
    geometry: Geometry,
    channel_bits: Vec<u32>,
    bank_bits: Vec<u32>,
    selector_mask: u64,
}

impl BitmaskMapping {
    /// Creates a bit-mask mapping.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Validated geometry.
    /// * `channel_bits` - Address bits forming the channel selector.
    /// * `bank_bits` - Address bits forming the bank selector.
    ///
    /// # Returns
    ///
    /// The mapping, or the configuration error for a wrong bit count, a bit
    /// outside the offset, or a bit used twice.
    pub fn new(geometry: &Geometry, channel_bits: &[u32], bank_bits: &[u32]) -> Result<Self, ConfigError> {
        for (which, bits, selections) in [
            ("channel", channel_bits, geometry.channels),
            ("bank", bank_bits, geometry.banks),
        ] {
            let expected = selector_bits(selections);
            if bits.len() != expected as usize {
                return Err(ConfigError::MaskWidth {
                    which,
                    found: bits.len(),
                    expected,
                    selections,
                });
            }
        }
        let mut selector_mask = 0u64;
        for &bit in channel_bits.iter().chain(bank_bits) {
            if bit >= OFFSET_BITS {
                return Err(ConfigError::MaskBitRange(bit));
            }
            if selector_mask & (1 << bit) != 0 {
                return Err(ConfigError::MaskOverlap(bit));
            }
            selector_mask |= 1 << bit;
        }
        Ok(Self {
            geometry: *geometry,
            channel_bits: channel_bits.to_vec(),
            bank_bits: bank_bits.to_vec(),
            selector_mask,
        })
    }
}

/// Collects the listed address bits into a dense value.
fn gather(addr: u64, bits: &[u32]) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0, |acc, (i, &bit)| acc | (((addr >> bit) & 1) << i))
}

/// Places the bits of `value` at the listed positions.
fn scatter(value: u64, bits: &[u32]) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0, |acc, (i, &bit)| acc | (((value >> i) & 1) << bit))
}

/// Packs every address bit outside `mask` downwards.
fn pack_unmasked(addr: u64, mask: u64) -> u64 {
    let mut res = 0;
    let mut pos = 0;
    for i in 0..u64::BITS {
        if mask & (1 << i) == 0 {
            res |= ((addr >> i) & 1) << pos;
            pos += 1;
        }
    }
    res
}

/// Inverse of [`pack_unmasked`].
fn unpack_unmasked(packed: u64, mask: u64) -> u64 {
    let mut res = 0;
    let mut pos = 0;
    for i in 0..u64::BITS {
        if mask & (1 << i) == 0 {
            res |= ((packed >> pos) & 1) << i;
            pos += 1;
        }
    }
    res
}

impl AddressMapping for BitmaskMapping {
    fn extract_address_info(&self, address: u32) -> AddressInfo {
        let addr = u64::from(address);
        let (row, start_col) = self.geometry.row_col(pack_unmasked(addr, self.selector_mask));
        AddressInfo {
            channel: gather(addr, &self.channel_bits) as u32,
            bank: gather(addr, &self.bank_bits) as u32,
            row,
            start_col,
        }
    }

    fn create_address(&self, info: &AddressInfo) -> u32 {
        let packed = self.geometry.compact_offset(info.row, info.start_col);
        let addr = unpack_unmasked(packed, self.selector_mask)
            | scatter(u64::from(info.channel), &self.channel_bits)
            | scatter(u64::from(info.bank), &self.bank_bits);
        addr as u32
    }
}
