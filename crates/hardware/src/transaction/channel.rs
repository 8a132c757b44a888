//! Channel transactions.
//!
//! A channel transaction is one contiguous access inside a single DRAM row of a
//! single bank and channel. It is produced by splitting a request and owned by
//! exactly one container at a time: the channel queue, then the channel scheduler,
//! then the completion stage that retires it. The type is deliberately not `Clone`.

use std::fmt;
use std::ops::Range;

use crate::common::constants::WORD_BYTES;
use crate::splitter::AddressInfo;

use super::memory::{DataView, MaskView, TraceTag};
use super::request::RequestSlot;

/// Identity of a channel transaction, unique for the lifetime of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CtId(pub u64);

impl fmt::Display for CtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ct#{}", self.0)
    }
}

/// One single-row DRAM access.
#[derive(Debug)]
pub struct ChannelTransaction {
    id: CtId,
    info: AddressInfo,
    is_read: bool,
    data: DataView,
    mask: Option<MaskView>,
    request: RequestSlot,
    tag: Option<TraceTag>,
}

impl ChannelTransaction {
    /// Creates a read chunk.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique chunk identity.
    /// * `info` - Channel, bank, row and first column.
    /// * `data` - View receiving the read bytes; its length is the chunk size.
    /// * `request` - Owning request buffer slot.
    pub fn read(id: CtId, info: AddressInfo, data: DataView, request: RequestSlot) -> Self {
        Self {
            id,
            info,
            is_read: true,
            data,
            mask: None,
            request,
            tag: None,
        }
    }

    /// Creates a write chunk, optionally masked.
    pub fn write(
        id: CtId,
        info: AddressInfo,
        data: DataView,
        mask: Option<MaskView>,
        request: RequestSlot,
    ) -> Self {
        Self {
            id,
            info,
            is_read: false,
            data,
            mask,
            request,
            tag: None,
        }
    }

    /// Attaches a trace tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<TraceTag>) -> Self {
        self.tag = tag;
        self
    }

    /// Chunk identity.
    pub const fn id(&self) -> CtId {
        self.id
    }

    /// Full DRAM coordinate.
    pub const fn info(&self) -> AddressInfo {
        self.info
    }

    /// Target channel.
    pub const fn channel(&self) -> u32 {
        self.info.channel
    }

    /// Target bank.
    pub const fn bank(&self) -> u32 {
        self.info.bank
    }

    /// Target row.
    pub const fn row(&self) -> u32 {
        self.info.row
    }

    /// First column (32-bit word index inside the row).
    pub const fn start_col(&self) -> u32 {
        self.info.start_col
    }

    /// Bytes accessed.
    pub const fn bytes(&self) -> u32 {
        self.data.len() as u32
    }

    /// Whether the chunk reads.
    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    /// Whether the chunk writes.
    pub const fn is_write(&self) -> bool {
        !self.is_read
    }

    /// View into the owning request payload.
    pub const fn data(&self) -> &DataView {
        &self.data
    }

    /// Write mask slice, if masked.
    pub const fn mask(&self) -> Option<&MaskView> {
        self.mask.as_ref()
    }

    /// Owning request buffer slot.
    pub const fn request(&self) -> RequestSlot {
        self.request
    }

    /// Trace tag, if any.
    pub const fn tag(&self) -> Option<&TraceTag> {
        self.tag.as_ref()
    }

    /// Byte range covered inside the row.
    pub const fn row_bytes(&self) -> Range<u32> {
        let start = self.info.start_col * WORD_BYTES;
        start..start + self.bytes()
    }

    /// Whether both chunks touch a common byte of the same bank and row.
    pub const fn overlaps_with(&self, other: &Self) -> bool {
        if self.info.bank != other.info.bank || self.info.row != other.info.row {
            return false;
        }
        let a = self.row_bytes();
        let b = other.row_bytes();
        a.start < b.end && b.start < a.end
    }
}

impl fmt::Display for ChannelTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ch={} bank={} row={} col={} bytes={} slot={}",
            self.id,
            if self.is_read { "R" } else { "W" },
            self.info.channel,
            self.info.bank,
            self.info.row,
            self.info.start_col,
            self.bytes(),
            self.request.0
        )
    }
}
