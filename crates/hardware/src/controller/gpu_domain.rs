//! GPU clock domain.
//!
//! One GPU cycle runs these stages in order:
//! 1. **Bus Counters:** Finishes transfers whose last cycle has passed. Write payloads
//!    make their request dispatchable; replies land in the unit inbox.
//! 2. **Read Requests:** Takes latched transactions the broadcast state admits.
//!    Preloads are applied at once; reads and writes enter a request pool.
//! 3. **Serve Request:** Starts the head reply on its bus if the bus was reserved.
//! 4. **Commands:** Runs queued controller commands.
//! 5. **Reserve Bus:** Reserves the bus of the next reply one cycle ahead.
//! 6. **Completion Sweep:** Retires GPU requests whose chunks have all returned.
//! 7. **System Path:** Advances the system buses, issues and receives system traffic.
//! 8. **Bus State:** Broadcasts the admission state for the next cycle.

use crate::common::AddressSpace;
use crate::common::error::SimError;
use crate::transaction::{
    ChannelTransaction, MemCommand, MemState, MemoryRequest, MemoryTransaction, RequestSlot,
    RequestState,
};

use super::bus::Transfer;
use super::{McCommand, McRegister, MemoryController, ServiceEntry};

/// Queue of `ct` inside its channel.
pub(super) const fn queue_index(per_bank: bool, ct: &ChannelTransaction) -> usize {
    if per_bank { ct.bank() as usize } else { 0 }
}

impl MemoryController {
    /// Advances the GPU clock domain by one cycle.
    ///
    /// # Arguments
    ///
    /// * `cycle` - GPU cycle number; expected to increase by one per call.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or the fatal error that stopped the cycle.
    pub fn advance_gpu_domain(&mut self, cycle: u64) -> Result<(), SimError> {
        self.gpu_cycle = cycle;
        self.stats.gpu_cycles += 1;

        self.update_bus_counters(cycle)?;
        self.read_requests(cycle)?;
        self.serve_request()?;
        self.process_commands()?;

        self.stats.request_occupancy += self.requests.occupied_count() as u64;
        self.stats.system_request_occupancy += self.system_requests.occupied_count() as u64;
        self.stats.service_occupancy += self.service_queue.len() as u64;

        self.reserve_gpu_bus();
        self.update_completed_requests()?;
        self.update_system_buses()?;
        self.issue_system_transaction(cycle)?;
        self.process_system_replies(cycle);

        self.send_bus_state();
        for bus in self.buses.iter() {
            self.stats.record_state(bus.id, bus.state);
        }
        Ok(())
    }

    fn update_bus_counters(&mut self, cycle: u64) -> Result<(), SimError> {
        for bus in self.buses.iter_mut() {
            if bus.remaining == 0 {
                continue;
            }
            bus.remaining -= 1;
            if bus.remaining > 0 {
                continue;
            }
            match bus.transfer.take() {
                Some(Transfer::Write { slot, system }) => {
                    let pool = if system {
                        &mut self.system_requests
                    } else {
                        &mut self.requests
                    };
                    let request = pool.require_mut(slot)?;
                    if request.state() != RequestState::Transmitting {
                        return Err(SimError::UnexpectedState {
                            slot: slot.0,
                            state: request.state(),
                            stage: "write transfer",
                        });
                    }
                    request.set_state(RequestState::Ready);
                    tracing::trace!(bus = %bus.id, cycle, slot = slot.0, "write payload received");
                }
                Some(Transfer::Reply {
                    transaction,
                    arrival,
                    ..
                }) => {
                    self.free_read_buffers += 1;
                    self.stats.record_reply(bus.id, cycle.saturating_sub(arrival));
                    if self.config.general.memory_trace {
                        tracing::trace!(target: "gpumc::memtrace", cycle, "{transaction}");
                    }
                    bus.replies.push_back(transaction);
                }
                None => {}
            }
        }
        Ok(())
    }

    fn read_requests(&mut self, cycle: u64) -> Result<(), SimError> {
        for index in 0..self.buses.len() {
            let bus = &mut self.buses[index];
            let Some(command) = bus.latch.as_ref().map(MemoryTransaction::command) else {
                continue;
            };
            let busy = command == MemCommand::WriteData && bus.remaining > 0;
            if busy || !bus.state.accepts(command) {
                if !bus.held {
                    tracing::warn!(bus = %bus.id, state = %bus.state, cycle, "{command} held until admitted");
                    bus.held = true;
                }
                continue;
            }
            bus.held = false;
            let Some(tx) = bus.latch.take() else {
                continue;
            };

            self.stats.record_request(tx.source(), command, tx.size());
            if self.config.general.memory_trace {
                tracing::trace!(target: "gpumc::memtrace", cycle, "{tx}");
            }
            match (command, tx.space()) {
                (MemCommand::PreloadData, _) => self.preload(&tx)?,
                (_, AddressSpace::Gpu) => self.admit_gpu(index, tx, cycle)?,
                (_, AddressSpace::System) => self.admit_system(index, tx, cycle)?,
            }
        }
        Ok(())
    }

    /// Writes a preload straight into the target memory.
    fn preload(&mut self, tx: &MemoryTransaction) -> Result<(), SimError> {
        let address = tx.address().offset();
        let size = tx.size();
        let mask = tx.mask();
        match tx.space() {
            AddressSpace::Gpu => {
                self.check_gpu_range(address, size)?;
                let plans = self.splitters.select(address, size)?.plan(address, size)?;
                let schedulers = &mut self.schedulers;
                tx.payload().with(|data| {
                    for p in &plans {
                        let start = p.offset as usize;
                        let Some(bytes) = data.get(start..start + p.bytes as usize) else {
                            continue;
                        };
                        let words = mask.map(|m| {
                            let first = (start / 4).min(m.len());
                            let last = (first + bytes.len().div_ceil(4)).min(m.len());
                            &m[first..last]
                        });
                        schedulers[p.info.channel as usize].preload(
                            p.info.bank,
                            p.info.row,
                            p.info.start_col,
                            bytes,
                            words,
                        );
                    }
                });
            }
            AddressSpace::System => {
                let memory = &mut self.system_memory;
                let written = tx
                    .payload()
                    .with(|data| memory.write(address as usize, data, mask.map(|m| &m[..])));
                if !written {
                    return Err(SimError::OutOfRange {
                        space: AddressSpace::System,
                        address,
                        size,
                        limit: self.system_memory.len() as u64,
                    });
                }
            }
        }
        tracing::debug!(space = %tx.space(), address, size, "preload applied");
        Ok(())
    }

    /// Admits a GPU memory read or write: allocates its request and queues its chunks.
    fn admit_gpu(&mut self, index: usize, tx: MemoryTransaction, cycle: u64) -> Result<(), SimError> {
        let unit = tx.source();
        let command = tx.command();
        let address = tx.address().offset();
        let size = tx.size();
        self.check_transaction_size(&tx)?;
        self.check_gpu_range(address, size)?;
        let is_write = !tx.is_read();
        if is_write && self.free_write_buffers == 0 {
            return Err(SimError::NoWriteBuffer { unit, address });
        }

        let slot = self
            .requests
            .allocate(MemoryRequest::new(tx, cycle))
            .ok_or(SimError::RequestPoolExhausted {
                unit,
                command,
                address,
                size,
            })?;
        let chunks = {
            let tx = self
                .requests
                .get(slot)
                .ok_or(SimError::FreeSlot { slot: slot.0 })?
                .transaction();
            self.splitters
                .select(address, size)?
                .split(tx, slot, &mut self.next_ct_id)?
        };

        let per_bank = self.config.channel_queues.per_bank;
        let mut seen = 0u32;
        for ct in &chunks {
            let channel = ct.channel();
            if seen & (1 << channel) != 0 {
                return Err(SimError::ChannelCollision {
                    address,
                    size,
                    channel,
                });
            }
            seen |= 1 << channel;
            let q = queue_index(per_bank, ct);
            let queue = &self.channel_queues[channel as usize][q];
            if queue.is_full() {
                return Err(SimError::ChannelQueueFull {
                    channel,
                    queue: q as u32,
                    capacity: queue.capacity(),
                });
            }
        }

        let request = self.requests.require_mut(slot)?;
        request.set_counter(chunks.len() as u32);
        if is_write {
            request.set_state(RequestState::Transmitting);
            self.free_write_buffers -= 1;
            self.start_write_transfer(index, slot, false, size)?;
        }
        self.buses[index].outstanding += 1;
        tracing::trace!(bus = %unit, cycle, slot = slot.0, chunks = chunks.len(), "{command} admitted");
        for ct in chunks {
            let q = queue_index(per_bank, &ct);
            self.channel_queues[ct.channel() as usize][q].enqueue(ct, cycle);
        }
        Ok(())
    }

    /// Rejects reads and writes that are empty or larger than the maximum.
    pub(super) fn check_transaction_size(&self, tx: &MemoryTransaction) -> Result<(), SimError> {
        let unit = tx.source();
        let size = tx.size();
        if size == 0 {
            return Err(SimError::EmptyTransaction {
                unit,
                command: tx.command(),
                address: tx.address().offset(),
            });
        }
        let max = self.config.memory.max_transaction_size;
        if size > max {
            return Err(SimError::TransactionTooLarge { unit, size, max });
        }
        Ok(())
    }

    /// Occupies the unit bus while a write payload arrives.
    pub(super) fn start_write_transfer(
        &mut self,
        index: usize,
        slot: RequestSlot,
        system: bool,
        size: u32,
    ) -> Result<(), SimError> {
        let bus = &mut self.buses[index];
        if bus.remaining > 0 {
            return Err(SimError::BusBusy {
                unit: bus.id,
                remaining: bus.remaining,
            });
        }
        bus.remaining = bus.cycles_for(size);
        bus.transfer = Some(Transfer::Write { slot, system });
        Ok(())
    }

    fn serve_request(&mut self) -> Result<(), SimError> {
        let Some(unit) = self.service_queue.front().map(|e| e.reply.source()) else {
            return Ok(());
        };
        let bus = self.buses.get_mut(unit).ok_or(SimError::UnknownBus { unit })?;
        if !bus.reserved || bus.remaining > 0 {
            return Ok(());
        }
        let Some(entry) = self.service_queue.pop_front() else {
            return Ok(());
        };
        bus.reserved = false;
        bus.remaining = bus.cycles_for(entry.reply.size());
        tracing::trace!(bus = %unit, cycles = bus.remaining, "reply transfer started");
        bus.transfer = Some(Transfer::Reply {
            transaction: entry.reply,
            arrival: entry.arrival,
            system: entry.system,
        });
        Ok(())
    }

    fn process_commands(&mut self) -> Result<(), SimError> {
        while let Some(command) = self.commands.pop_front() {
            match command {
                McCommand::RegisterWrite {
                    register: McRegister::SecondInterleavingStart,
                    value,
                } => {
                    self.splitters.set_second_start(value);
                    tracing::debug!(address = value, "second interleaving start updated");
                }
                McCommand::SaveMemory => self.save_memory()?,
                McCommand::LoadMemory => self.load_memory()?,
            }
        }
        Ok(())
    }

    fn reserve_gpu_bus(&mut self) {
        let Some(unit) = self.service_queue.front().map(|e| e.reply.source()) else {
            return;
        };
        if let Some(bus) = self.buses.get_mut(unit) {
            if bus.remaining <= 1 {
                bus.reserved = true;
            }
        }
    }

    fn update_completed_requests(&mut self) -> Result<(), SimError> {
        let capacity = self.config.buffers.service_queue_size;
        let done: Vec<RequestSlot> = self
            .requests
            .occupied()
            .filter(|(_, r)| r.counter() == 0 && r.state() == RequestState::Ready)
            .map(|(slot, _)| slot)
            .collect();
        for slot in done {
            let is_read = self.requests.get(slot).is_some_and(MemoryRequest::is_read);
            if is_read && self.service_queue.len() >= capacity {
                continue;
            }
            let request = self.requests.release(slot)?;
            let arrival = request.arrival();
            let tx = request.into_transaction();
            self.buses.release(tx.source());
            tracing::trace!(slot = slot.0, "{} completed", tx.command());
            if is_read {
                self.service_queue.push_back(ServiceEntry {
                    reply: MemoryTransaction::reply_to(&tx),
                    arrival,
                    system: false,
                });
            } else {
                self.free_write_buffers += 1;
            }
        }
        Ok(())
    }

    /// Computes the admission state of every unit bus.
    pub(super) fn send_bus_state(&mut self) {
        let required = self.config.admission_reserve();
        let pools_ok =
            self.requests.free_count() >= required && self.system_requests.free_count() >= required;
        let writes_ok = self.free_write_buffers >= self.config.write_reserve();
        let b = &self.config.buffers;
        let rop_limit = if b.split_request_buffer_per_rop {
            b.request_queue_size / self.config.units.stamp_units.max(1)
        } else {
            usize::MAX
        };
        for bus in self.buses.iter_mut() {
            bus.state = if !pools_ok || (bus.id.unit.is_rop() && bus.outstanding >= rop_limit) {
                MemState::None
            } else if writes_ok && bus.remaining < 2 && !bus.reserved {
                MemState::Both
            } else {
                MemState::ReadAccept
            };
        }
    }
}
