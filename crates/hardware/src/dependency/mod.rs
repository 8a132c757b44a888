//! Hazard tracking between pending channel transactions.
//!
//! Every pending chunk records at most one earlier chunk it must wait for:
//! a read waits for the most recent overlapping write, a write waits for the most
//! recent overlapping access of either kind. Removing a chunk wakes every entry
//! waiting on it. Two containers share this logic:
//! 1. **DependencyQueue:** strict FIFO; only the head is ever dispatched.
//! 2. **DependencyBuffer:** random access with an oldest-first or FIFO candidate policy.

/// Random-access dependency buffer.
pub mod buffer;

/// FIFO dependency queue.
pub mod queue;

pub use buffer::{BufferPolicy, DependencyBuffer};
pub use queue::DependencyQueue;

use crate::transaction::{ChannelTransaction, CtId};

/// A pending chunk and the chunk it waits for.
#[derive(Debug)]
pub struct Entry {
    ct: ChannelTransaction,
    dependency: Option<CtId>,
    timestamp: u64,
}

impl Entry {
    /// The pending chunk.
    pub const fn transaction(&self) -> &ChannelTransaction {
        &self.ct
    }

    /// The chunk this entry waits for, if any.
    pub const fn dependency(&self) -> Option<CtId> {
        self.dependency
    }

    /// Cycle the entry was enqueued.
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Whether the entry may be dispatched.
    pub const fn is_ready(&self) -> bool {
        self.dependency.is_none()
    }
}

/// Scans `pending` from newest to oldest for the chunk `incoming` must follow.
fn find_dependency<'a, I>(pending: I, incoming: &ChannelTransaction) -> Option<CtId>
where
    I: DoubleEndedIterator<Item = &'a Entry>,
{
    pending
        .rev()
        .find(|e| (incoming.is_write() || e.ct.is_write()) && incoming.overlaps_with(&e.ct))
        .map(|e| e.ct.id())
}

/// Builds the entry for `ct` given the currently pending entries.
fn make_entry<'a, I>(pending: I, ct: ChannelTransaction, timestamp: u64) -> Entry
where
    I: DoubleEndedIterator<Item = &'a Entry>,
{
    let dependency = find_dependency(pending, &ct);
    Entry {
        ct,
        dependency,
        timestamp,
    }
}

/// Clears every dependency on `removed`.
fn wakeup<'a, I>(entries: I, removed: CtId)
where
    I: Iterator<Item = &'a mut Entry>,
{
    for e in entries.filter(|e| e.dependency == Some(removed)) {
        e.dependency = None;
    }
}
