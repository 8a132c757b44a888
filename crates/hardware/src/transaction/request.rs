//! Request buffer entries.
//!
//! Every admitted read or write occupies one slot of a fixed-capacity request pool
//! until all of its chunks have returned and the completion sweep retires it. The
//! pool is an arena: chunks refer back to their request by [`RequestSlot`] only.

use std::collections::VecDeque;
use std::fmt;

use crate::common::error::SimError;

use super::memory::MemoryTransaction;

/// Index of a request inside its pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestSlot(pub usize);

/// Progress of a request through the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Admitted and dispatchable, or all chunks returned.
    Ready,
    /// Write payload still crossing the unit bus.
    Transmitting,
    /// At least one chunk has been handed to a channel scheduler.
    InMemory,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Transmitting => "transmitting",
            Self::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

/// One admitted unit transaction.
#[derive(Debug)]
pub struct MemoryRequest {
    transaction: MemoryTransaction,
    arrival: u64,
    counter: u32,
    state: RequestState,
}

impl MemoryRequest {
    /// Creates a request in the `Ready` state with no outstanding chunks.
    pub fn new(transaction: MemoryTransaction, arrival: u64) -> Self {
        Self {
            transaction,
            arrival,
            counter: 0,
            state: RequestState::Ready,
        }
    }

    /// The owned transaction.
    pub const fn transaction(&self) -> &MemoryTransaction {
        &self.transaction
    }

    /// Consumes the request, returning its transaction.
    pub fn into_transaction(self) -> MemoryTransaction {
        self.transaction
    }

    /// GPU cycle the request was admitted.
    pub const fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Restores the admission cycle (system replies travel without their request).
    pub const fn set_arrival(&mut self, cycle: u64) {
        self.arrival = cycle;
    }

    /// Outstanding chunks.
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Sets the number of outstanding chunks.
    pub const fn set_counter(&mut self, chunks: u32) {
        self.counter = chunks;
    }

    /// Retires one chunk.
    ///
    /// # Returns
    ///
    /// The remaining chunk count, or `SimError::CounterUnderflow` when no chunk
    /// was outstanding.
    pub fn dec_counter(&mut self) -> Result<u32, SimError> {
        if self.counter == 0 {
            return Err(SimError::CounterUnderflow {
                address: self.transaction.address().val(),
                unit: self.transaction.source(),
            });
        }
        self.counter -= 1;
        Ok(self.counter)
    }

    /// Current state.
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Moves the request to `state`.
    pub const fn set_state(&mut self, state: RequestState) {
        self.state = state;
    }

    /// Whether the owned transaction is a read.
    pub const fn is_read(&self) -> bool {
        self.transaction.is_read()
    }
}

/// Fixed-capacity arena of requests with a free-list of slot identifiers.
#[derive(Debug)]
pub struct RequestPool {
    slots: Vec<Option<MemoryRequest>>,
    free: VecDeque<usize>,
}

impl RequestPool {
    /// Creates a pool with `capacity` free slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).collect(),
        }
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Free slots.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Stores `request` in the next free slot.
    ///
    /// # Returns
    ///
    /// The slot, or `None` when the pool is exhausted.
    pub fn allocate(&mut self, request: MemoryRequest) -> Option<RequestSlot> {
        let index = self.free.pop_front()?;
        self.slots[index] = Some(request);
        Some(RequestSlot(index))
    }

    /// Removes the request in `slot` and returns the slot to the free list.
    pub fn release(&mut self, slot: RequestSlot) -> Result<MemoryRequest, SimError> {
        let request = self
            .slots
            .get_mut(slot.0)
            .and_then(Option::take)
            .ok_or(SimError::FreeSlot { slot: slot.0 })?;
        self.free.push_back(slot.0);
        Ok(request)
    }

    /// The request in `slot`, if occupied.
    pub fn get(&self, slot: RequestSlot) -> Option<&MemoryRequest> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    /// The request in `slot` mutably, if occupied.
    pub fn get_mut(&mut self, slot: RequestSlot) -> Option<&mut MemoryRequest> {
        self.slots.get_mut(slot.0).and_then(Option::as_mut)
    }

    /// The request in `slot`, failing with `SimError::FreeSlot` if empty.
    pub fn require_mut(&mut self, slot: RequestSlot) -> Result<&mut MemoryRequest, SimError> {
        self.get_mut(slot).ok_or(SimError::FreeSlot { slot: slot.0 })
    }

    /// Occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (RequestSlot, &MemoryRequest)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (RequestSlot(i), r)))
    }

    /// Indices of occupied slots in ascending order.
    pub fn occupied_slots(&self) -> Vec<usize> {
        self.occupied().map(|(slot, _)| slot.0).collect()
    }
}
