//! Transactions flowing through the controller.
//!
//! This module defines every object that travels between units, the controller and
//! the channel schedulers. It provides:
//! 1. **Unit Envelope:** [`MemoryTransaction`], the request/reply carried on unit buses.
//! 2. **Payload Views:** Shared payload buffers and the data/mask views handed to chunks.
//! 3. **Channel Transactions:** The single-channel, single-row chunks produced by splitting.
//! 4. **Requests:** The request-buffer arena tracking a transaction while its chunks are in flight.

/// Single-channel DRAM access chunks.
pub mod channel;

/// Unit-facing transaction envelope and payload buffers.
pub mod memory;

/// Request buffer entries and their arena.
pub mod request;

pub use channel::{ChannelTransaction, CtId};
pub use memory::{
    BusId, DataView, GpuUnit, MaskView, MemCommand, MemState, MemoryTransaction, Payload, TraceTag,
};
pub use request::{MemoryRequest, RequestPool, RequestSlot, RequestState};
