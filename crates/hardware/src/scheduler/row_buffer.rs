//! Row-buffer aware reference scheduler.
//!
//! Serves one chunk at a time per channel. Pending chunks wait in a
//! [`DependencyBuffer`] so overlapping accesses keep their order while the
//! scheduler reorders the rest to favour the row it last opened. Latency follows
//! the usual DRAM row-buffer model:
//! 1. **Row hit:** the bank already has the row open, `t_cas`.
//! 2. **Row empty:** no row open, `t_ras + t_cas`.
//! 3. **Row conflict:** another row open, `t_pre + t_ras + t_cas`.
//!
//! Data moves when a chunk finishes, after which it is handed back unchanged.

use std::collections::VecDeque;

use crate::config::{PagePolicy, SchedulerConfig};
use crate::dependency::{BufferPolicy, DependencyBuffer};
use crate::splitter::Geometry;
use crate::transaction::ChannelTransaction;

use super::{BankState, ChannelScheduler, DramStore, SchedulerState};

/// Counters kept by the reference scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowBufferStats {
    /// Chunks that found their row open.
    pub row_hits: u64,
    /// Chunks that found the bank precharged.
    pub row_empty: u64,
    /// Chunks that had to close another row first.
    pub row_conflicts: u64,
    /// Reads served.
    pub reads: u64,
    /// Writes served.
    pub writes: u64,
}

/// Open/close page scheduler with a single service slot.
#[derive(Debug)]
pub struct RowBufferScheduler {
    channel: u32,
    config: SchedulerConfig,
    banks: u32,
    burst_bytes: u32,
    buffer: DependencyBuffer,
    open_rows: Vec<Option<u32>>,
    in_service: Option<(ChannelTransaction, u64)>,
    completed: VecDeque<ChannelTransaction>,
    store: DramStore,
    last_row: Option<u32>,
    last_was_write: bool,
    stats: RowBufferStats,
}

impl RowBufferScheduler {
    /// Creates the scheduler for `channel`.
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel index served.
    /// * `geometry` - DRAM geometry.
    /// * `config` - Scheduler timing and queue parameters.
    pub fn new(channel: u32, geometry: &Geometry, config: &SchedulerConfig) -> Self {
        Self {
            channel,
            config: config.clone(),
            banks: geometry.banks,
            burst_bytes: geometry.burst_bytes,
            buffer: DependencyBuffer::new(config.queue_size, BufferPolicy::OldestFirst),
            open_rows: vec![None; geometry.banks as usize],
            in_service: None,
            completed: VecDeque::new(),
            store: DramStore::new(geometry.row_size),
            last_row: None,
            last_was_write: false,
            stats: RowBufferStats::default(),
        }
    }

    /// Channel served.
    pub const fn channel(&self) -> u32 {
        self.channel
    }

    /// Service counters.
    pub const fn stats(&self) -> &RowBufferStats {
        &self.stats
    }

    /// Device contents.
    pub const fn store(&self) -> &DramStore {
        &self.store
    }

    /// Cycles to serve `ct`, updating the bank's open row.
    fn access_latency(&mut self, ct: &ChannelTransaction) -> u64 {
        let c = &self.config;
        let slot = &mut self.open_rows[ct.bank() as usize];
        let latency = match *slot {
            Some(open) if open == ct.row() => {
                self.stats.row_hits += 1;
                c.t_cas
            }
            Some(_) => {
                self.stats.row_conflicts += 1;
                c.t_pre + c.t_ras + c.t_cas
            }
            None => {
                self.stats.row_empty += 1;
                c.t_ras + c.t_cas
            }
        };
        *slot = match c.page_policy {
            PagePolicy::Open => Some(ct.row()),
            PagePolicy::Close => None,
        };
        let bursts = u64::from(ct.bytes().div_ceil(self.burst_bytes));
        latency + bursts * c.burst_cycles
    }

    /// Moves the data of a finished chunk.
    fn finish(&mut self, ct: &ChannelTransaction) {
        if ct.is_read() {
            self.stats.reads += 1;
            let (bank, row, col) = (ct.bank(), ct.row(), ct.start_col());
            ct.data().with_mut(|out| self.store.read(bank, row, col, out));
        } else {
            self.stats.writes += 1;
            let mask = ct.mask().map(|m| m.words());
            ct.data()
                .with(|data| self.store.write(ct.bank(), ct.row(), ct.start_col(), data, mask));
        }
    }

    /// Picks the next chunk, keeping the current read/write direction when possible.
    fn pick(&self) -> Option<usize> {
        let want_write = self.last_was_write;
        self.buffer
            .get_candidate(want_write, self.last_row)
            .or_else(|| self.buffer.get_candidate(!want_write, self.last_row))
    }

    fn bank_limit(&self) -> usize {
        (self.config.queue_size / self.banks as usize).max(1)
    }
}

impl ChannelScheduler for RowBufferScheduler {
    fn clock(&mut self, cycle: u64) {
        if let Some((ct, done)) = self.in_service.take() {
            if cycle >= done {
                self.finish(&ct);
                tracing::trace!(channel = self.channel, cycle, "served {ct}");
                self.completed.push_back(ct);
            } else {
                self.in_service = Some((ct, done));
                return;
            }
        }
        let Some(index) = self.pick() else {
            return;
        };
        // Candidates are always ready, so extraction only fails on a stale index.
        if let Ok(ct) = self.buffer.extract(index) {
            let latency = self.access_latency(&ct);
            self.last_row = Some(ct.row());
            self.last_was_write = ct.is_write();
            self.in_service = Some((ct, cycle + latency));
        }
    }

    fn state(&self) -> SchedulerState {
        if self.buffer.is_full() {
            return SchedulerState::shared(BankState::AcceptNone);
        }
        if !self.config.per_bank_state {
            return SchedulerState::shared(BankState::AcceptBoth);
        }
        let mut counts = vec![0usize; self.banks as usize];
        for e in self.buffer.iter() {
            counts[e.transaction().bank() as usize] += 1;
        }
        let limit = self.bank_limit();
        SchedulerState::per_bank(
            counts
                .into_iter()
                .map(|n| if n >= limit { BankState::AcceptNone } else { BankState::AcceptBoth })
                .collect(),
        )
    }

    fn accept(&mut self, ct: ChannelTransaction, cycle: u64) {
        self.buffer.enqueue(ct, cycle);
    }

    fn take_completed(&mut self) -> Option<ChannelTransaction> {
        self.completed.pop_front()
    }

    fn preload(&mut self, bank: u32, row: u32, col: u32, data: &[u8], mask: Option<&[u32]>) {
        self.store.write(bank, row, col, data, mask);
    }

    fn read_data(&self, bank: u32, row: u32, col: u32, out: &mut [u8]) {
        self.store.read(bank, row, col, out);
    }

    fn write_data(&mut self, bank: u32, row: u32, col: u32, data: &[u8]) {
        self.store.write(bank, row, col, data, None);
    }

    fn pending(&self) -> usize {
        self.buffer.len() + usize::from(self.in_service.is_some()) + self.completed.len()
    }
}
