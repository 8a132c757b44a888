//! Unit-facing memory transactions.
//!
//! This module defines the envelope exchanged on unit request and reply buses.
//! It provides:
//! 1. **Units and Buses:** The attached unit types and the `(unit, sub-unit)` bus identifier.
//! 2. **Commands and Admission:** Transaction commands and the per-bus admission state.
//! 3. **Payloads:** A shared byte buffer with non-copying views used by split chunks.
//! 4. **Trace Tags:** Optional debug metadata copied along every handoff.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::common::addr::{AddressSpace, GpuAddr};
use crate::common::constants::WORD_BYTES;

/// Unit types attached to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GpuUnit {
    /// Command processor.
    CommandProcessor,
    /// Streamer index/attribute fetch.
    StreamerFetch,
    /// Streamer vertex loaders.
    StreamerLoader,
    /// Z and stencil test.
    ZStencilTest,
    /// Color write and blend.
    ColorWrite,
    /// Display controller.
    Dac,
    /// Texture units.
    TextureUnit,
    /// System memory buses (internal).
    System,
}

impl GpuUnit {
    /// Every unit type, in bus table order.
    pub const ALL: [Self; 8] = [
        Self::CommandProcessor,
        Self::StreamerFetch,
        Self::StreamerLoader,
        Self::ZStencilTest,
        Self::ColorWrite,
        Self::Dac,
        Self::TextureUnit,
        Self::System,
    ];

    /// Short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CommandProcessor => "CommandProcessor",
            Self::StreamerFetch => "StreamerFetch",
            Self::StreamerLoader => "StreamerLoader",
            Self::ZStencilTest => "ZStencilTest",
            Self::ColorWrite => "ColorWrite",
            Self::Dac => "DAC",
            Self::TextureUnit => "TextureUnit",
            Self::System => "System",
        }
    }

    /// Whether the unit is a render output (ROP) unit.
    pub const fn is_rop(self) -> bool {
        matches!(self, Self::ZStencilTest | Self::ColorWrite)
    }
}

impl fmt::Display for GpuUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit bus: a unit type and its sub-unit index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId {
    /// Unit type.
    pub unit: GpuUnit,
    /// Sub-unit index.
    pub index: usize,
}

impl BusId {
    /// Creates a bus identifier.
    pub const fn new(unit: GpuUnit, index: usize) -> Self {
        Self { unit, index }
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.unit, self.index)
    }
}

/// Transaction commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemCommand {
    /// Read `size` bytes at `address`.
    ReadRequest,
    /// Reply carrying read bytes back to the requesting unit.
    ReadData,
    /// Write the payload (optionally masked) at `address`.
    WriteData,
    /// Write the payload immediately, bypassing the pipeline.
    PreloadData,
}

impl fmt::Display for MemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadRequest => "ReadRequest",
            Self::ReadData => "ReadData",
            Self::WriteData => "WriteData",
            Self::PreloadData => "PreloadData",
        };
        f.write_str(name)
    }
}

/// Admission state broadcast to every unit bus each GPU cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemState {
    /// No new request may be issued.
    #[default]
    None,
    /// Read requests may be issued.
    ReadAccept,
    /// Writes may be issued.
    WriteAccept,
    /// Reads and writes may be issued.
    Both,
}

impl MemState {
    /// Whether a read request is admitted under this state.
    pub const fn accepts_read(self) -> bool {
        matches!(self, Self::ReadAccept | Self::Both)
    }

    /// Whether a write is admitted under this state.
    pub const fn accepts_write(self) -> bool {
        matches!(self, Self::WriteAccept | Self::Both)
    }

    /// Whether `command` is admitted under this state.
    pub const fn accepts(self, command: MemCommand) -> bool {
        match command {
            MemCommand::ReadRequest => self.accepts_read(),
            MemCommand::WriteData => self.accepts_write(),
            MemCommand::PreloadData => true,
            MemCommand::ReadData => false,
        }
    }
}

impl fmt::Display for MemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::ReadAccept => "read",
            Self::WriteAccept => "write",
            Self::Both => "both",
        };
        f.write_str(name)
    }
}

/// Shared transaction payload.
///
/// Cloning a `Payload` shares the same bytes. Split chunks keep [`DataView`]s into it,
/// so a read reply observes bytes written by the channel schedulers without copying.
///
/// Access is serialised by a mutex rather than a `RefCell` so that transactions,
/// [`ChannelScheduler`](crate::scheduler::ChannelScheduler) implementations and the
/// whole [`Simulation`](crate::Simulation) stay `Send` and can be driven from a
/// worker thread.
#[derive(Clone, Debug, Default)]
pub struct Payload(Arc<Mutex<Vec<u8>>>);

impl Payload {
    /// Wraps existing bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(bytes)))
    }

    /// Allocates `len` zero bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the payload out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Runs `f` over the payload bytes.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.lock().as_slice())
    }

    /// Runs `f` over the mutable payload bytes.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.lock().as_mut_slice())
    }

    /// Creates a view of `len` bytes at `offset`.
    ///
    /// The range is clamped to the payload.
    pub fn view(&self, offset: usize, len: usize) -> DataView {
        let total = self.len();
        let offset = offset.min(total);
        DataView {
            buffer: self.clone(),
            offset,
            len: len.min(total - offset),
        }
    }

    /// Whether two payloads share the same bytes.
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A window into a [`Payload`].
#[derive(Clone, Debug)]
pub struct DataView {
    buffer: Payload,
    offset: usize,
    len: usize,
}

impl DataView {
    /// Byte offset inside the parent payload.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the view in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload the view points into.
    pub const fn payload(&self) -> &Payload {
        &self.buffer
    }

    /// Copies the viewed bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.with(<[u8]>::to_vec)
    }

    /// Runs `f` over the viewed bytes.
    pub fn with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.buffer
            .with(|bytes| f(&bytes[self.offset..self.offset + self.len]))
    }

    /// Runs `f` over the mutable viewed bytes.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.buffer
            .with_mut(|bytes| f(&mut bytes[self.offset..self.offset + self.len]))
    }
}

/// A window into a transaction write mask (one 32-bit mask word per 4 data bytes).
#[derive(Clone, Debug)]
pub struct MaskView {
    mask: Arc<[u32]>,
    offset: usize,
    len: usize,
}

impl MaskView {
    /// Creates a view of `len` words starting at word `offset`, clamped to the mask.
    pub fn new(mask: Arc<[u32]>, offset: usize, len: usize) -> Self {
        let offset = offset.min(mask.len());
        let len = len.min(mask.len() - offset);
        Self { mask, offset, len }
    }

    /// Viewed mask words.
    pub fn words(&self) -> &[u32] {
        &self.mask[self.offset..self.offset + self.len]
    }

    /// Word offset inside the parent mask.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Applies a word write mask: each 32-bit word becomes `(old & !mask) | (new & mask)`.
///
/// A trailing partial word is written byte-wise under the low bytes of its mask word.
pub fn masked_copy(dst: &mut [u8], src: &[u8], mask: &[u32]) {
    let len = dst.len().min(src.len());
    for (i, (d, s)) in dst[..len]
        .chunks_mut(WORD_BYTES as usize)
        .zip(src[..len].chunks(WORD_BYTES as usize))
        .enumerate()
    {
        let m = mask.get(i).copied().unwrap_or(0).to_le_bytes();
        for ((db, sb), mb) in d.iter_mut().zip(s).zip(m) {
            *db = (*db & !mb) | (sb & mb);
        }
    }
}

/// Debug metadata carried with a transaction.
///
/// Every handoff copies the tag and may append a cookie identifying the new owner,
/// so a chunk can be traced back to the unit transaction it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceTag {
    cookies: Vec<u32>,
}

impl TraceTag {
    /// Creates a tag holding a single cookie.
    pub fn new(cookie: u32) -> Self {
        Self {
            cookies: vec![cookie],
        }
    }

    /// Returns a copy extended with `cookie`.
    pub fn child(&self, cookie: u32) -> Self {
        let mut cookies = self.cookies.clone();
        cookies.push(cookie);
        Self { cookies }
    }

    /// Cookies from the root to the latest handoff.
    pub fn cookies(&self) -> &[u32] {
        &self.cookies
    }
}

impl fmt::Display for TraceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.cookies.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// A transaction on a unit request or reply bus.
#[derive(Clone, Debug)]
pub struct MemoryTransaction {
    command: MemCommand,
    address: GpuAddr,
    size: u32,
    source: BusId,
    id: u32,
    mask: Option<Arc<[u32]>>,
    payload: Payload,
    tag: Option<TraceTag>,
}

impl MemoryTransaction {
    /// Creates a read request.
    ///
    /// # Arguments
    ///
    /// * `source` - Requesting bus; the reply is delivered on the same bus.
    /// * `address` - Raw address (top bit selects system memory).
    /// * `size` - Bytes to read.
    /// * `id` - Caller-chosen identifier echoed in the reply.
    ///
    /// # Returns
    ///
    /// A `ReadRequest` with a zeroed payload that will receive the data.
    pub fn read_request(source: BusId, address: u32, size: u32, id: u32) -> Self {
        Self {
            command: MemCommand::ReadRequest,
            address: GpuAddr::new(address),
            size,
            source,
            id,
            mask: None,
            payload: Payload::zeroed(size as usize),
            tag: None,
        }
    }

    /// Creates an unmasked write of `data` at `address`.
    pub fn write(source: BusId, address: u32, data: Vec<u8>, id: u32) -> Self {
        Self {
            command: MemCommand::WriteData,
            address: GpuAddr::new(address),
            size: data.len() as u32,
            source,
            id,
            mask: None,
            payload: Payload::new(data),
            tag: None,
        }
    }

    /// Creates a masked write; `mask` holds one word per 4 bytes of `data`.
    pub fn masked_write(source: BusId, address: u32, data: Vec<u8>, mask: Vec<u32>, id: u32) -> Self {
        Self {
            mask: Some(mask.into()),
            ..Self::write(source, address, data, id)
        }
    }

    /// Creates a preload of `data` at `address`, optionally masked.
    pub fn preload(source: BusId, address: u32, data: Vec<u8>, mask: Option<Vec<u32>>) -> Self {
        Self {
            command: MemCommand::PreloadData,
            mask: mask.map(Into::into),
            ..Self::write(source, address, data, 0)
        }
    }

    /// Creates the `ReadData` reply for a completed read, sharing its payload.
    pub fn reply_to(request: &Self) -> Self {
        Self {
            command: MemCommand::ReadData,
            mask: None,
            tag: request.tag.as_ref().map(|t| t.child(request.id)),
            ..request.clone()
        }
    }

    /// Attaches a trace tag.
    #[must_use]
    pub fn with_tag(mut self, tag: TraceTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Transaction command.
    pub const fn command(&self) -> MemCommand {
        self.command
    }

    /// Raw address including the address space bit.
    pub const fn address(&self) -> GpuAddr {
        self.address
    }

    /// Address space selected by the top address bit.
    pub const fn space(&self) -> AddressSpace {
        self.address.space()
    }

    /// Size in bytes.
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Issuing (and reply) bus.
    pub const fn source(&self) -> BusId {
        self.source
    }

    /// Caller-chosen identifier.
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Write mask words, if the write is masked.
    pub fn mask(&self) -> Option<&Arc<[u32]>> {
        self.mask.as_ref()
    }

    /// Payload buffer.
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Copies the payload out.
    pub fn data(&self) -> Vec<u8> {
        self.payload.to_vec()
    }

    /// Trace tag, if any.
    pub const fn tag(&self) -> Option<&TraceTag> {
        self.tag.as_ref()
    }

    /// Whether the transaction is a read request.
    pub const fn is_read(&self) -> bool {
        matches!(self.command, MemCommand::ReadRequest)
    }
}

impl fmt::Display for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} addr={} size={} id={}",
            self.command, self.source, self.address, self.size, self.id
        )?;
        if self.mask.is_some() {
            f.write_str(" masked")?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " tag={tag}")?;
        }
        Ok(())
    }
}
