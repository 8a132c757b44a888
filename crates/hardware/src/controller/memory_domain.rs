//! Memory clock domain.
//!
//! Each memory cycle clocks every channel scheduler, retires the chunks they have
//! finished and then offers each scheduler at most one new chunk. A chunk can be
//! offered once its hazard dependency is gone and its request is no longer waiting
//! for write data. The first chunk of a read also needs a free read buffer.

use crate::common::error::SimError;
use crate::config::BankSelection;
use crate::transaction::{ChannelTransaction, RequestState};

use super::MemoryController;

impl MemoryController {
    /// Advances the memory clock domain by one cycle.
    ///
    /// # Arguments
    ///
    /// * `cycle` - Memory cycle number; expected to increase by one per call.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or the fatal error that stopped the cycle.
    pub fn advance_memory_domain(&mut self, cycle: u64) -> Result<(), SimError> {
        self.memory_cycle = cycle;
        self.stats.memory_cycles += 1;
        for scheduler in &mut self.schedulers {
            scheduler.clock(cycle);
        }
        self.receive_from_schedulers()?;
        for channel in 0..self.schedulers.len() {
            self.send_to_scheduler(channel, cycle)?;
        }
        Ok(())
    }

    fn receive_from_schedulers(&mut self) -> Result<(), SimError> {
        for (channel, scheduler) in self.schedulers.iter_mut().enumerate() {
            while let Some(ct) = scheduler.take_completed() {
                if ct.channel() as usize != channel {
                    return Err(SimError::WrongChannel {
                        expected: ct.channel(),
                        found: channel as u32,
                    });
                }
                let slot = ct.request();
                let request = self.requests.require_mut(slot)?;
                if request.state() != RequestState::InMemory {
                    return Err(SimError::UnexpectedState {
                        slot: slot.0,
                        state: request.state(),
                        stage: "chunk completion",
                    });
                }
                if request.dec_counter()? == 0 {
                    request.set_state(RequestState::Ready);
                }
                let source = request.transaction().source();
                self.stats
                    .record_chunk(source, ct.channel(), ct.bytes(), ct.is_read());
                tracing::trace!(channel, "completed {ct}");
            }
        }
        Ok(())
    }

    /// Whether the request owning `ct` lets it go to memory now.
    fn dispatchable(&self, ct: &ChannelTransaction) -> bool {
        match self.requests.get(ct.request()).map(|r| r.state()) {
            Some(RequestState::Transmitting) => false,
            Some(RequestState::Ready) if ct.is_read() => self.free_read_buffers > 0,
            _ => true,
        }
    }

    /// Queue indices of `channel` in the order they are offered this cycle.
    fn queue_order(&self, channel: usize) -> Vec<usize> {
        let queues = &self.channel_queues[channel];
        let n = queues.len();
        match self.config.channel_queues.bank_selection {
            BankSelection::RoundRobin => {
                let start = self.next_bank[channel];
                (0..n).map(|i| (start + i) % n).collect()
            }
            BankSelection::OldestFirst => {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by_key(|&q| queues[q].head().map_or(u64::MAX, |e| e.timestamp()));
                order
            }
        }
    }

    fn send_to_scheduler(&mut self, channel: usize, cycle: u64) -> Result<(), SimError> {
        let state = self.schedulers[channel].state();
        let mut chosen = None;
        let mut blocked = None;
        for q in self.queue_order(channel) {
            let Some(head) = self.channel_queues[channel][q].head() else {
                continue;
            };
            let ct = head.transaction();
            if head.is_ready() && self.dispatchable(ct) && state.accepts(ct) {
                chosen = Some(q);
                break;
            }
            blocked.get_or_insert(ct.is_read());
        }

        let Some(q) = chosen else {
            match blocked {
                Some(true) => self.stats.read_stall_cycles += 1,
                Some(false) => self.stats.write_stall_cycles += 1,
                None => {}
            }
            return Ok(());
        };

        let ct = self.channel_queues[channel][q].pop()?;
        let slot = ct.request();
        let request = self.requests.require_mut(slot)?;
        match request.state() {
            RequestState::Ready => {
                request.set_state(RequestState::InMemory);
                if ct.is_read() {
                    self.free_read_buffers -= 1;
                }
            }
            RequestState::InMemory => {}
            state @ RequestState::Transmitting => {
                return Err(SimError::UnexpectedState {
                    slot: slot.0,
                    state,
                    stage: "dispatch",
                });
            }
        }
        let queues = self.channel_queues[channel].len();
        self.next_bank[channel] = (q + 1) % queues;
        self.stats.chunks_dispatched += 1;
        tracing::trace!(channel, cycle, "dispatched {ct}");
        self.schedulers[channel].accept(ct, cycle);
        Ok(())
    }
}
