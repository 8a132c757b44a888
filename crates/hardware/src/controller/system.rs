//! System memory path.
//!
//! System memory requests bypass the channel schedulers. Admitted requests wait in
//! strict FIFO order; the head is issued on system bus 0 (reads) or 1 (writes) once
//! that bus has been idle for `transaction_cycles` since its previous issue. Data
//! moves at issue time. The reply comes back on the same bus after the configured
//! latency and then occupies the bus for another `transaction_cycles`.

use std::collections::VecDeque;

use crate::common::AddressSpace;
use crate::common::constants::{SYSTEM_READ_BUS, SYSTEM_WRITE_BUS};
use crate::common::error::SimError;
use crate::transaction::{MemoryRequest, MemoryTransaction, RequestSlot, RequestState};

use super::{MemoryController, ServiceEntry};

/// Reply travelling back on a system bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SystemReply {
    /// Read data for the request in `slot`.
    Read(RequestSlot),
    /// Write acknowledgement.
    Write,
}

/// One system bus.
#[derive(Debug, Default)]
pub(super) struct SystemBus {
    last_issue: Option<u64>,
    in_flight: VecDeque<(u64, SystemReply)>,
    current: Option<SystemReply>,
    remaining: u32,
}

impl SystemBus {
    /// Whether a new transaction may be issued at `cycle`.
    fn spaced(&self, cycle: u64, spacing: u64) -> bool {
        self.last_issue.is_none_or(|last| cycle >= last + spacing)
    }

    /// Whether nothing is in flight or being delivered.
    pub(super) fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.current.is_none()
    }

    /// Replies in flight plus the one being delivered.
    pub(super) fn pending(&self) -> usize {
        self.in_flight.len() + usize::from(self.current.is_some())
    }
}

impl MemoryController {
    /// Admits a system memory read or write into the system pool.
    pub(super) fn admit_system(
        &mut self,
        index: usize,
        tx: MemoryTransaction,
        cycle: u64,
    ) -> Result<(), SimError> {
        let unit = tx.source();
        let command = tx.command();
        let address = tx.address().offset();
        let size = tx.size();
        self.check_transaction_size(&tx)?;
        let limit = self.system_memory.len() as u64;
        if u64::from(address) + u64::from(size) > limit {
            return Err(SimError::OutOfRange {
                space: AddressSpace::System,
                address,
                size,
                limit,
            });
        }
        let is_write = !tx.is_read();
        if is_write && self.free_write_buffers == 0 {
            return Err(SimError::NoWriteBuffer { unit, address });
        }

        let slot = self
            .system_requests
            .allocate(MemoryRequest::new(tx, cycle))
            .ok_or(SimError::SystemPoolExhausted {
                unit,
                command,
                address,
                size,
            })?;
        if is_write {
            self.system_requests
                .require_mut(slot)?
                .set_state(RequestState::Transmitting);
            self.free_write_buffers -= 1;
            self.start_write_transfer(index, slot, true, size)?;
        }
        self.buses[index].outstanding += 1;
        self.system_queue.push_back(slot);
        tracing::trace!(bus = %unit, cycle, slot = slot.0, "system {command} admitted");
        Ok(())
    }

    /// Finishes system bus transfers and delivers their replies.
    ///
    /// A read reply that finds the service queue full keeps its bus and retries on
    /// the next cycle.
    pub(super) fn update_system_buses(&mut self) -> Result<(), SimError> {
        let capacity = self.config.buffers.service_queue_size;
        for bus in &mut self.system_buses {
            bus.remaining = bus.remaining.saturating_sub(1);
            if bus.remaining > 0 {
                continue;
            }
            let Some(reply) = bus.current else {
                continue;
            };
            match reply {
                SystemReply::Read(slot) => {
                    if self.service_queue.len() >= capacity {
                        continue;
                    }
                    let expected = self
                        .system_arrivals
                        .pop_front()
                        .ok_or(SimError::UnmatchedSystemReply { slot: slot.0 })?;
                    if expected != slot {
                        return Err(SimError::SystemReplyMismatch {
                            expected: expected.0,
                            found: slot.0,
                        });
                    }
                    let request = self.system_requests.release(slot)?;
                    let arrival = request.arrival();
                    let tx = request.into_transaction();
                    self.buses.release(tx.source());
                    self.service_queue.push_back(ServiceEntry {
                        reply: MemoryTransaction::reply_to(&tx),
                        arrival,
                        system: true,
                    });
                }
                SystemReply::Write => self.free_write_buffers += 1,
            }
            bus.current = None;
        }
        Ok(())
    }

    /// Issues the head of the system FIFO if its bus is free.
    pub(super) fn issue_system_transaction(&mut self, cycle: u64) -> Result<(), SimError> {
        let Some(&slot) = self.system_queue.front() else {
            return Ok(());
        };
        let request = self
            .system_requests
            .get(slot)
            .ok_or(SimError::FreeSlot { slot: slot.0 })?;
        let tx = request.transaction();
        let address = tx.address().offset();
        let size = tx.size();
        let spacing = self.config.system.transaction_cycles;
        let out_of_range = SimError::OutOfRange {
            space: AddressSpace::System,
            address,
            size,
            limit: self.system_memory.len() as u64,
        };

        if request.is_read() {
            let bus = &mut self.system_buses[SYSTEM_READ_BUS];
            if !bus.spaced(cycle, spacing) || self.free_read_buffers == 0 {
                return Ok(());
            }
            let src = self
                .system_memory
                .slice(address as usize, size as usize)
                .ok_or(out_of_range)?;
            tx.payload().with_mut(|dst| {
                let n = dst.len().min(src.len());
                dst[..n].copy_from_slice(&src[..n]);
            });
            self.free_read_buffers -= 1;
            bus.last_issue = Some(cycle);
            bus.in_flight.push_back((
                cycle + self.config.system.read_latency,
                SystemReply::Read(slot),
            ));
            self.system_arrivals.push_back(slot);
            self.stats.system_read_bytes += u64::from(size);
        } else {
            if request.state() != RequestState::Ready {
                return Ok(());
            }
            let bus = &mut self.system_buses[SYSTEM_WRITE_BUS];
            if !bus.spaced(cycle, spacing) {
                return Ok(());
            }
            let memory = &mut self.system_memory;
            let mask = tx.mask().map(|m| &m[..]);
            if !tx.payload().with(|data| memory.write(address as usize, data, mask)) {
                return Err(out_of_range);
            }
            bus.last_issue = Some(cycle);
            bus.in_flight.push_back((cycle + self.config.system.write_latency, SystemReply::Write));
            let source = tx.source();
            self.stats.system_write_bytes += u64::from(size);
            let _ = self.system_requests.release(slot)?;
            self.buses.release(source);
        }
        let _ = self.system_queue.pop_front();
        tracing::trace!(cycle, slot = slot.0, address, size, "system transaction issued");
        Ok(())
    }

    /// Moves replies whose latency has elapsed onto their idle system bus.
    pub(super) fn process_system_replies(&mut self, cycle: u64) {
        let cycles = u32::try_from(self.config.system.transaction_cycles).unwrap_or(u32::MAX);
        for bus in &mut self.system_buses {
            if bus.current.is_some() || bus.remaining > 0 {
                continue;
            }
            if bus.in_flight.front().is_none_or(|&(ready, _)| ready > cycle) {
                continue;
            }
            let Some((_, reply)) = bus.in_flight.pop_front() else {
                continue;
            };
            bus.remaining = cycles;
            bus.current = Some(reply);
        }
    }
}
