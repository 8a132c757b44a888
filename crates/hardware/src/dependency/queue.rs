//! FIFO dependency queue.

use std::collections::VecDeque;

use crate::common::error::SimError;
use crate::transaction::ChannelTransaction;

use super::{Entry, make_entry, wakeup};

/// Bounded FIFO of pending chunks with hazard edges.
#[derive(Debug)]
pub struct DependencyQueue {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl DependencyQueue {
    /// Creates an empty queue holding at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a chunk, recording the pending chunk it must follow.
    ///
    /// Callers check [`Self::is_full`] first; the capacity is not enforced here.
    pub fn enqueue(&mut self, ct: ChannelTransaction, timestamp: u64) {
        let entry = make_entry(self.entries.iter(), ct, timestamp);
        self.entries.push_back(entry);
    }

    /// Oldest entry.
    pub fn head(&self) -> Option<&Entry> {
        self.entries.front()
    }

    /// Whether the head exists and has no pending dependency.
    pub fn head_ready(&self) -> bool {
        self.entries.front().is_some_and(Entry::is_ready)
    }

    /// Removes the head and wakes its dependents.
    ///
    /// # Returns
    ///
    /// The head chunk, `SimError::NotReady` if it still waits on another chunk,
    /// or `SimError::DependencyIndex` when the queue is empty.
    pub fn pop(&mut self) -> Result<ChannelTransaction, SimError> {
        match self.entries.front() {
            None => return Err(SimError::DependencyIndex { index: 0, len: 0 }),
            Some(e) if !e.is_ready() => return Err(SimError::NotReady { index: 0 }),
            Some(_) => {}
        }
        let entry = self
            .entries
            .pop_front()
            .ok_or(SimError::DependencyIndex { index: 0, len: 0 })?;
        wakeup(self.entries.iter_mut(), entry.ct.id());
        Ok(entry.ct)
    }

    /// Pending chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunk is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another chunk would exceed the capacity.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Capacity in chunks.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }
}
