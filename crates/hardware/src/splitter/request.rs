//! Burst-by-burst request splitting.

use crate::common::constants::{ADDRESS_OFFSET_MASK, WORD_BYTES};
use crate::common::error::SimError;
use crate::transaction::{ChannelTransaction, CtId, MaskView, MemoryTransaction, RequestSlot};

use super::{AddressInfo, AddressMapping, Geometry};

/// Cuts requests into channel transactions under one address mapping.
#[derive(Debug)]
pub struct RequestSplitter {
    mapping: Box<dyn AddressMapping>,
    geometry: Geometry,
}

/// One chunk of a split range: where it lands and which bytes of the range it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    /// DRAM coordinate of the first byte.
    pub info: AddressInfo,
    /// Byte offset inside the split range.
    pub offset: u32,
    /// Bytes covered.
    pub bytes: u32,
}

impl RequestSplitter {
    /// Wraps a mapping.
    pub fn new(mapping: Box<dyn AddressMapping>, geometry: Geometry) -> Self {
        Self { mapping, geometry }
    }

    /// The underlying mapping.
    pub fn mapping(&self) -> &dyn AddressMapping {
        self.mapping.as_ref()
    }

    /// The geometry the mapping was built for.
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Maps a GPU offset to its coordinate.
    pub fn extract_address_info(&self, address: u32) -> AddressInfo {
        self.mapping.extract_address_info(address & ADDRESS_OFFSET_MASK)
    }

    /// Maps a coordinate back to its GPU offset.
    pub fn create_address(&self, info: &AddressInfo) -> u32 {
        self.mapping.create_address(info)
    }

    /// Maps a burst and checks the coordinate against the geometry.
    pub fn locate(&self, address: u32) -> Result<AddressInfo, SimError> {
        let info = self.extract_address_info(address);
        let g = &self.geometry;
        for (field, value, limit) in [
            ("channel", info.channel, g.channels),
            ("bank", info.bank, g.banks),
            ("row", info.row, g.bank_rows),
            ("column", info.start_col, g.bank_cols),
        ] {
            if value >= limit {
                return Err(SimError::CoordinateOutOfBounds {
                    field,
                    value,
                    limit,
                    address,
                });
            }
        }
        Ok(info)
    }

    /// Plans the chunks of the byte range `[address, address + size)`.
    ///
    /// Walks the range one burst at a time. A burst landing in the same channel,
    /// bank and row as the previous one extends the pending chunk; otherwise the
    /// pending chunk is closed and a new one started.
    ///
    /// # Returns
    ///
    /// Chunks in address order whose sizes add up to `size`, or
    /// `SimError::Unaligned` when `address` is not burst aligned.
    pub fn plan(&self, address: u32, size: u32) -> Result<Vec<ChunkPlan>, SimError> {
        let address = address & ADDRESS_OFFSET_MASK;
        let burst = self.geometry.burst_bytes;
        if address % burst != 0 {
            return Err(SimError::Unaligned {
                address,
                burst_bytes: burst,
            });
        }

        let mut plans: Vec<ChunkPlan> = Vec::new();
        let mut offset = 0;
        while offset < size {
            let bytes = burst.min(size - offset);
            let info = self.locate(address + offset)?;
            match plans.last_mut() {
                Some(p) if p.info.same_page(&info) => p.bytes += bytes,
                _ => plans.push(ChunkPlan { info, offset, bytes }),
            }
            offset += bytes;
        }
        Ok(plans)
    }

    /// Splits a transaction into channel transactions.
    ///
    /// Every chunk views the transaction payload (and mask) at its own offset, so
    /// nothing is copied.
    ///
    /// # Arguments
    ///
    /// * `transaction` - Read or write to split; its address must be burst aligned.
    /// * `slot` - Request buffer slot the chunks report back to.
    /// * `next_id` - Chunk identity counter, advanced once per emitted chunk.
    pub fn split(
        &self,
        transaction: &MemoryTransaction,
        slot: RequestSlot,
        next_id: &mut u64,
    ) -> Result<Vec<ChannelTransaction>, SimError> {
        let plans = self.plan(transaction.address().offset(), transaction.size())?;
        Ok(plans
            .iter()
            .map(|p| Self::emit(transaction, slot, p, next_id))
            .collect())
    }

    fn emit(transaction: &MemoryTransaction, slot: RequestSlot, p: &ChunkPlan, next_id: &mut u64) -> ChannelTransaction {
        let id = CtId(*next_id);
        *next_id += 1;
        let data = transaction.payload().view(p.offset as usize, p.bytes as usize);
        let tag = transaction.tag().map(|t| t.child(id.0 as u32));
        let chunk = if transaction.is_read() {
            ChannelTransaction::read(id, p.info, data, slot)
        } else {
            let mask = transaction.mask().map(|m| {
                MaskView::new(
                    m.clone(),
                    (p.offset / WORD_BYTES) as usize,
                    p.bytes.div_ceil(WORD_BYTES) as usize,
                )
            });
            ChannelTransaction::write(id, p.info, data, mask, slot)
        };
        chunk.with_tag(tag)
    }
}
