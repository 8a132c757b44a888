//! Channel schedulers.
//!
//! Each channel is served by one scheduler that owns the DRAM device behind it.
//! This module provides:
//! 1. **Scheduler Interface:** The [`ChannelScheduler`] trait the controller drives once
//!    per memory cycle, plus the per-bank accept state it advertises.
//! 2. **Backing Store:** [`DramStore`], the byte contents of one channel.
//! 3. **Reference Scheduler:** [`RowBufferScheduler`], an open/close page model with
//!    CAS, RAS and precharge latencies.

/// Per-channel DRAM contents.
pub mod store;

/// Row-buffer aware reference scheduler.
pub mod row_buffer;

pub use row_buffer::RowBufferScheduler;
pub use store::DramStore;

use std::fmt;

use crate::transaction::ChannelTransaction;

/// What a bank accepts this memory cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BankState {
    /// Reads and writes.
    #[default]
    AcceptBoth,
    /// Reads only.
    AcceptRead,
    /// Writes only.
    AcceptWrite,
    /// Nothing.
    AcceptNone,
}

impl BankState {
    /// Whether a chunk of the given kind is accepted.
    pub const fn accepts(self, is_read: bool) -> bool {
        match self {
            Self::AcceptBoth => true,
            Self::AcceptRead => is_read,
            Self::AcceptWrite => !is_read,
            Self::AcceptNone => false,
        }
    }
}

impl fmt::Display for BankState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AcceptBoth => "RW",
            Self::AcceptRead => "R",
            Self::AcceptWrite => "W",
            Self::AcceptNone => "-",
        };
        f.write_str(name)
    }
}

/// Accept state advertised by a scheduler: one entry shared by all banks, or one per bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerState {
    banks: Vec<BankState>,
}

impl SchedulerState {
    /// One state for every bank.
    pub fn shared(state: BankState) -> Self {
        Self { banks: vec![state] }
    }

    /// One state per bank.
    pub const fn per_bank(banks: Vec<BankState>) -> Self {
        Self { banks }
    }

    /// State of `bank`; banks beyond the advertised list accept nothing.
    pub fn bank(&self, bank: u32) -> BankState {
        match self.banks.as_slice() {
            [shared] => *shared,
            banks => banks.get(bank as usize).copied().unwrap_or(BankState::AcceptNone),
        }
    }

    /// Whether `ct` may be handed over this cycle.
    pub fn accepts(&self, ct: &ChannelTransaction) -> bool {
        self.bank(ct.bank()).accepts(ct.is_read())
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.banks.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

/// A channel scheduler and the DRAM device it drives.
///
/// The controller calls [`clock`](Self::clock) once per memory cycle, reads
/// [`state`](Self::state), hands over at most one chunk with
/// [`accept`](Self::accept) and drains [`take_completed`](Self::take_completed).
/// Every accepted chunk must eventually come back unchanged; the latency is up to
/// the implementation. Reads must have filled their data view by the time they
/// are returned; writes must have been applied.
pub trait ChannelScheduler: Send {
    /// Advances the scheduler to `cycle`.
    fn clock(&mut self, cycle: u64);

    /// Accept state for the current cycle.
    fn state(&self) -> SchedulerState;

    /// Takes ownership of a chunk.
    fn accept(&mut self, ct: ChannelTransaction, cycle: u64);

    /// Returns the next finished chunk, if any.
    fn take_completed(&mut self) -> Option<ChannelTransaction>;

    /// Writes bytes directly into the device, bypassing timing.
    ///
    /// # Arguments
    ///
    /// * `bank` - Target bank.
    /// * `row` - Target row.
    /// * `col` - First 32-bit column.
    /// * `data` - Bytes to store.
    /// * `mask` - Optional word mask (one word per 4 bytes).
    fn preload(&mut self, bank: u32, row: u32, col: u32, data: &[u8], mask: Option<&[u32]>);

    /// Copies device bytes out, bypassing timing.
    fn read_data(&self, bank: u32, row: u32, col: u32, out: &mut [u8]);

    /// Overwrites device bytes, bypassing timing.
    fn write_data(&mut self, bank: u32, row: u32, col: u32, data: &[u8]);

    /// Chunks accepted but not yet taken back.
    fn pending(&self) -> usize;
}
