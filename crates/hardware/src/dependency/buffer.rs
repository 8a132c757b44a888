//! Random-access dependency buffer.
//!
//! Used by channel schedulers that pick among pending chunks rather than
//! draining them in order. Entries keep insertion order; index 0 is the oldest.

use serde::{Deserialize, Serialize};

use crate::common::error::SimError;
use crate::transaction::ChannelTransaction;

use super::{Entry, make_entry, wakeup};

/// Candidate selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferPolicy {
    /// Only the oldest entry is ever a candidate.
    Fifo,
    /// Any ready entry is a candidate, oldest first.
    #[default]
    OldestFirst,
}

/// Bounded random-access buffer of pending chunks with hazard edges.
#[derive(Debug)]
pub struct DependencyBuffer {
    entries: Vec<Entry>,
    capacity: usize,
    policy: BufferPolicy,
}

impl DependencyBuffer {
    /// Creates an empty buffer.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum pending chunks.
    /// * `policy` - Candidate selection policy.
    pub fn new(capacity: usize, policy: BufferPolicy) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Appends a chunk, recording the pending chunk it must follow.
    pub fn enqueue(&mut self, ct: ChannelTransaction, timestamp: u64) {
        let entry = make_entry(self.entries.iter(), ct, timestamp);
        self.entries.push(entry);
    }

    fn entry(&self, index: usize) -> Result<&Entry, SimError> {
        self.entries.get(index).ok_or(SimError::DependencyIndex {
            index,
            len: self.entries.len(),
        })
    }

    /// The chunk at `index`.
    pub fn get(&self, index: usize) -> Result<&ChannelTransaction, SimError> {
        self.entry(index).map(Entry::transaction)
    }

    /// Whether the entry at `index` has no pending dependency.
    pub fn ready(&self, index: usize) -> Result<bool, SimError> {
        self.entry(index).map(Entry::is_ready)
    }

    /// Enqueue cycle of the entry at `index`.
    pub fn timestamp(&self, index: usize) -> Result<u64, SimError> {
        self.entry(index).map(Entry::timestamp)
    }

    /// Removes the ready entry at `index` and wakes its dependents.
    ///
    /// # Returns
    ///
    /// The chunk, `SimError::DependencyIndex` for a bad index or
    /// `SimError::NotReady` when the entry still waits on another chunk.
    pub fn extract(&mut self, index: usize) -> Result<ChannelTransaction, SimError> {
        if !self.ready(index)? {
            return Err(SimError::NotReady { index });
        }
        let entry = self.entries.remove(index);
        wakeup(self.entries.iter_mut(), entry.ct.id());
        Ok(entry.ct)
    }

    /// Index of the next chunk of the requested kind to issue.
    ///
    /// Under `OldestFirst` the oldest ready chunk of that kind is chosen, unless a
    /// ready chunk of that kind targets `preferred_row`, in which case the oldest
    /// such chunk wins. Under `Fifo` only the head is considered.
    pub fn get_candidate(&self, want_write: bool, preferred_row: Option<u32>) -> Option<usize> {
        let eligible = |e: &Entry| e.is_ready() && e.ct.is_write() == want_write;
        match self.policy {
            BufferPolicy::Fifo => self.entries.first().filter(|e| eligible(*e)).map(|_| 0),
            BufferPolicy::OldestFirst => {
                let mut first = None;
                for (i, e) in self.entries.iter().enumerate().filter(|&(_, e)| eligible(e)) {
                    if preferred_row == Some(e.ct.row()) {
                        return Some(i);
                    }
                    first.get_or_insert(i);
                }
                first
            }
        }
    }

    /// Pending chunks of the requested kind targeting `row`.
    ///
    /// Under `Fifo` only the run of such chunks at the head is counted.
    pub fn count_hits(&self, row: u32, want_write: bool) -> usize {
        let hit = |e: &&Entry| e.ct.row() == row && e.ct.is_write() == want_write;
        match self.policy {
            BufferPolicy::Fifo => self.entries.iter().take_while(hit).count(),
            BufferPolicy::OldestFirst => self.entries.iter().filter(hit).count(),
        }
    }

    /// Pending chunks sharing the row of the entry at `index`.
    pub fn accesses(&self, index: usize) -> Result<usize, SimError> {
        let row = self.get(index)?.row();
        Ok(self.entries.iter().filter(|e| e.ct.row() == row).count())
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

    /// Candidate selection policy.
    pub const fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }
}
