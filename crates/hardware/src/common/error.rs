//! Configuration and simulation error definitions.
//!
//! This module defines the two error families of the controller model. It provides:
//! 1. **Configuration Errors:** Geometry, interleaving, buffer sizing and bus width
//!    problems detected once at construction, before any cycle is simulated.
//! 2. **Simulation Errors:** Invariant violations detected while clocking. These are
//!    fatal for the run: the driver stops clocking, reports the error together with
//!    the controller's debug dump and terminates.
//!
//! Backpressure (no free buffer, channel not accepting, service queue full) is never
//! reported through these types; it simply defers work to a later cycle.

use std::io;

use thiserror::Error;

use super::addr::AddressSpace;
use crate::transaction::{BusId, MemCommand, RequestState};

/// Errors detected while validating a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Channel count outside {1, 2, 4, 8, 16}.
    #[error("unsupported channel count {0} (expected 1, 2, 4, 8 or 16)")]
    ChannelCount(u32),

    /// Banks per channel outside {1, 2, 4, 8}.
    #[error("unsupported banks per channel {0} (expected 1, 2, 4 or 8)")]
    BankCount(u32),

    /// Burst length of zero.
    #[error("burst length must be greater than zero")]
    BurstLength,

    /// Row size that does not hold a whole number of bursts.
    #[error("row size {row_size} is not a positive multiple of the {burst_bytes}-byte burst")]
    RowSize {
        /// Configured row size in bytes.
        row_size: u32,
        /// Burst size in bytes.
        burst_bytes: u32,
    },

    /// GPU memory size that is zero or does not tile channels x banks x rows.
    #[error("gpu memory size {size} is not a positive multiple of {granule} (channels x banks x row size)")]
    MemorySize {
        /// Configured GPU memory size in bytes.
        size: u64,
        /// Required granule in bytes.
        granule: u64,
    },

    /// GPU memory larger than the 31-bit GPU address space.
    #[error("gpu memory size {0} exceeds the 2 GiB gpu address space")]
    MemoryTooLarge(u64),

    /// System memory size not a multiple of the 32-bit word.
    #[error("system memory size {0} is not a multiple of 4")]
    SystemMemorySize(u64),

    /// Stride interleaving that is not a power of two multiple of the burst.
    #[error("{which} interleaving of {value} bytes must be a power of two and a multiple of the {burst_bytes}-byte burst")]
    Interleaving {
        /// Which interleaving (channel or bank).
        which: &'static str,
        /// Configured granularity in bytes.
        value: u32,
        /// Burst size in bytes.
        burst_bytes: u32,
    },

    /// Bit mask with the wrong number of bits for its selector.
    #[error("{which} mask has {found} bits but {expected} are needed to select among {selections}")]
    MaskWidth {
        /// Which mask (channel or bank).
        which: &'static str,
        /// Bits supplied.
        found: usize,
        /// Bits required.
        expected: u32,
        /// Number of selections (channels or banks).
        selections: u32,
    },

    /// Address bit appearing twice across the channel and bank masks.
    #[error("address bit {0} is used more than once by the channel and bank masks")]
    MaskOverlap(u32),

    /// Address bit beyond the 31-bit GPU offset.
    #[error("address bit {0} is outside the 31-bit gpu address offset")]
    MaskBitRange(u32),

    /// Request queue too small for the attached units.
    #[error("request queue of {size} entries is below the minimum of {minimum}")]
    RequestQueueSize {
        /// Configured request queue size.
        size: usize,
        /// Minimum for the configured unit counts.
        minimum: usize,
    },

    /// A size or count that must be positive.
    #[error("{0} must be greater than zero")]
    ZeroSized(&'static str),

    /// Bus width outside the legal range.
    #[error("bus width {width} for {unit} is outside [8, 1024]")]
    BusWidth {
        /// Unit type the width belongs to.
        unit: &'static str,
        /// Configured width in bytes per cycle.
        width: u32,
    },

    /// Number of channel schedulers differs from the channel count.
    #[error("{found} channel schedulers supplied for {expected} channels")]
    SchedulerCount {
        /// Configured channels.
        expected: u32,
        /// Schedulers supplied.
        found: usize,
    },

    /// Clock frequency of zero.
    #[error("{0} clock frequency must be greater than zero")]
    ClockFrequency(&'static str),

    /// Configuration text that failed to parse.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Fatal invariant violations raised while clocking the controller.
#[derive(Debug, Error)]
pub enum SimError {
    /// GPU request buffer has no free slot.
    #[error("request buffer exhausted admitting {command} from {unit} (address {address:#010x}, size {size})")]
    RequestPoolExhausted {
        /// Issuing bus.
        unit: BusId,
        /// Command being admitted.
        command: MemCommand,
        /// Transaction address.
        address: u32,
        /// Transaction size.
        size: u32,
    },

    /// System request buffer has no free slot.
    #[error("system request buffer exhausted admitting {command} from {unit} (address {address:#010x}, size {size})")]
    SystemPoolExhausted {
        /// Issuing bus.
        unit: BusId,
        /// Command being admitted.
        command: MemCommand,
        /// Transaction address.
        address: u32,
        /// Transaction size.
        size: u32,
    },

    /// Write admitted without a free write buffer.
    #[error("no write buffer available for write from {unit} (address {address:#010x})")]
    NoWriteBuffer {
        /// Issuing bus.
        unit: BusId,
        /// Transaction address.
        address: u32,
    },

    /// Transaction larger than the configured maximum.
    #[error("transaction of {size} bytes from {unit} exceeds the maximum of {max}")]
    TransactionTooLarge {
        /// Issuing bus.
        unit: BusId,
        /// Transaction size.
        size: u32,
        /// Maximum transaction size.
        max: u32,
    },

    /// Read or write of zero bytes.
    #[error("{command} of zero bytes from {unit} at {address:#010x}")]
    EmptyTransaction {
        /// Issuing bus.
        unit: BusId,
        /// Command being admitted.
        command: MemCommand,
        /// Transaction address.
        address: u32,
    },

    /// Unit bus or sub-unit index that does not exist.
    #[error("no bus {unit} is attached to the controller")]
    UnknownBus {
        /// Offending bus identifier.
        unit: BusId,
    },

    /// Transaction command that a unit may not issue.
    #[error("unexpected {command} on the request bus of {unit}")]
    UnexpectedCommand {
        /// Issuing bus.
        unit: BusId,
        /// Received command.
        command: MemCommand,
    },

    /// Start address not aligned to a burst.
    #[error("address {address:#010x} is not aligned to the {burst_bytes}-byte burst")]
    Unaligned {
        /// Offending address offset.
        address: u32,
        /// Burst size in bytes.
        burst_bytes: u32,
    },

    /// Access reaching beyond the end of an address space.
    #[error("{space} access at {address:#010x} of {size} bytes exceeds the {limit}-byte address space")]
    OutOfRange {
        /// Address space accessed.
        space: AddressSpace,
        /// Offset within the space.
        address: u32,
        /// Access size.
        size: u32,
        /// Size of the space.
        limit: u64,
    },

    /// Request crossing the second interleaving start address.
    #[error("access at {address:#010x} of {size} bytes straddles the second interleaving start {threshold:#010x}")]
    InterleavingStraddle {
        /// Offset of the access.
        address: u32,
        /// Access size.
        size: u32,
        /// Second interleaving start address.
        threshold: u32,
    },

    /// Split coordinate beyond the configured geometry.
    #[error("{field} {value} out of bounds (limit {limit}) for address {address:#010x}")]
    CoordinateOutOfBounds {
        /// Coordinate name.
        field: &'static str,
        /// Computed value.
        value: u32,
        /// Exclusive limit.
        limit: u32,
        /// Address of the burst being mapped.
        address: u32,
    },

    /// Two chunks of one request mapped to the same channel.
    #[error("request at {address:#010x} of {size} bytes places two chunks on channel {channel}")]
    ChannelCollision {
        /// Request address.
        address: u32,
        /// Request size.
        size: u32,
        /// Channel hit twice.
        channel: u32,
    },

    /// Channel queue without room for a new chunk.
    #[error("channel {channel} queue {queue} is full ({capacity} entries)")]
    ChannelQueueFull {
        /// Channel index.
        channel: u32,
        /// Queue index inside the channel (bank, or 0 for a shared queue).
        queue: u32,
        /// Queue capacity.
        capacity: usize,
    },

    /// Scheduler returned a chunk on a channel it does not belong to.
    #[error("channel transaction for channel {expected} returned by scheduler {found}")]
    WrongChannel {
        /// Channel recorded in the transaction.
        expected: u32,
        /// Scheduler that returned it.
        found: u32,
    },

    /// Chunk counter decremented below zero.
    #[error("chunk counter underflow for request at {address:#010x} from {unit}")]
    CounterUnderflow {
        /// Request address.
        address: u32,
        /// Issuing bus.
        unit: BusId,
    },

    /// Request found in a state the current stage cannot handle.
    #[error("request slot {slot} is {state} during {stage}")]
    UnexpectedState {
        /// Request slot.
        slot: usize,
        /// State found.
        state: RequestState,
        /// Stage that observed it.
        stage: &'static str,
    },

    /// Reference to a request slot that is not occupied.
    #[error("request slot {slot} is not occupied")]
    FreeSlot {
        /// Request slot.
        slot: usize,
    },

    /// Dependency buffer entry index beyond its size.
    #[error("dependency entry {index} out of bounds ({len} entries)")]
    DependencyIndex {
        /// Requested index.
        index: usize,
        /// Current number of entries.
        len: usize,
    },

    /// Extraction of an entry that still has a pending dependency.
    #[error("dependency entry {index} extracted while not ready")]
    NotReady {
        /// Requested index.
        index: usize,
    },

    /// System read reply out of order with respect to its issue.
    #[error("system read reply for slot {found} does not match the expected slot {expected}")]
    SystemReplyMismatch {
        /// Slot recorded at issue time.
        expected: usize,
        /// Slot carried by the reply.
        found: usize,
    },

    /// System read reply delivered with no issued read on record.
    #[error("system read reply for slot {slot} arrived with no system read outstanding")]
    UnmatchedSystemReply {
        /// Slot carried by the reply.
        slot: usize,
    },

    /// Unit submitted a transaction while its request latch was still occupied.
    #[error("request bus of {unit} already holds an unconsumed transaction")]
    RequestBusOccupied {
        /// Issuing bus.
        unit: BusId,
    },

    /// Unit bus asked to start a transfer while still busy.
    #[error("bus {unit} is busy ({remaining} cycles left) when a new transfer started")]
    BusBusy {
        /// Bus identifier.
        unit: BusId,
        /// Remaining cycles on the bus.
        remaining: u32,
    },

    /// Clocking requested after a fatal error stopped the simulation.
    #[error("simulation halted by an earlier fatal error")]
    Halted,

    /// Snapshot stream failure while saving or reading memory.
    #[error("memory snapshot failed: {0}")]
    Snapshot(#[from] io::Error),
}
