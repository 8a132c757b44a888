//! Unit bus table.
//!
//! Every attached unit instance owns one request bus (a one-entry input latch) and
//! one reply bus. A bus carries one transfer at a time: either a write payload
//! arriving from the unit or a read reply leaving the controller. Replies reach the
//! unit's inbox when their transfer finishes.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::config::UnitConfig;
use crate::transaction::{BusId, GpuUnit, MemState, MemoryTransaction, RequestSlot};

/// Transfer occupying a bus.
#[derive(Debug)]
pub(super) enum Transfer {
    /// Write payload arriving from the unit.
    Write {
        /// Request the payload belongs to.
        slot: RequestSlot,
        /// Whether the request lives in the system pool.
        system: bool,
    },
    /// Read reply leaving for the unit.
    Reply {
        /// The `ReadData` transaction.
        transaction: MemoryTransaction,
        /// GPU cycle the read was admitted.
        arrival: u64,
        /// Whether the read targeted system memory.
        system: bool,
    },
}

/// One unit bus.
#[derive(Debug)]
pub(super) struct UnitBus {
    pub(super) id: BusId,
    pub(super) width: u32,
    pub(super) remaining: u32,
    pub(super) transfer: Option<Transfer>,
    pub(super) reserved: bool,
    pub(super) state: MemState,
    pub(super) latch: Option<MemoryTransaction>,
    pub(super) held: bool,
    pub(super) replies: VecDeque<MemoryTransaction>,
    pub(super) outstanding: usize,
}

impl UnitBus {
    fn new(id: BusId, width: u32) -> Self {
        Self {
            id,
            width,
            remaining: 0,
            transfer: None,
            reserved: false,
            state: MemState::None,
            latch: None,
            held: false,
            replies: VecDeque::new(),
            outstanding: 0,
        }
    }

    /// Cycles needed to move `bytes` over this bus.
    pub(super) const fn cycles_for(&self, bytes: u32) -> u32 {
        let cycles = bytes.div_ceil(self.width);
        if cycles == 0 { 1 } else { cycles }
    }

    /// Whether nothing is latched, in flight or reserved.
    pub(super) const fn is_idle(&self) -> bool {
        self.latch.is_none() && self.transfer.is_none() && !self.reserved
    }
}

impl fmt::Display for UnitBus {
    /// Formats as `Unit[i] state kind.space.cycles.slot -> transaction`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} state={}", self.id, self.state)?;
        match &self.transfer {
            Some(Transfer::Write { slot, system }) => write!(
                f,
                " W.{}.{}.{}",
                if *system { "s" } else { "g" },
                self.remaining,
                slot.0
            )?,
            Some(Transfer::Reply {
                transaction, system, ..
            }) => write!(
                f,
                " R.{}.{} -> {transaction}",
                if *system { "s" } else { "g" },
                self.remaining
            )?,
            None => f.write_str(" idle")?,
        }
        if self.reserved {
            f.write_str(" reserved")?;
        }
        if let Some(tx) = &self.latch {
            write!(f, " latched[{tx}]")?;
        }
        if self.outstanding > 0 {
            write!(f, " outstanding={}", self.outstanding)?;
        }
        Ok(())
    }
}

/// All unit buses in unit type order.
#[derive(Debug)]
pub(super) struct BusTable {
    buses: Vec<UnitBus>,
    first: [usize; GpuUnit::ALL.len()],
    count: [usize; GpuUnit::ALL.len()],
}

impl BusTable {
    /// One bus per instance of every unit type except the internal system buses.
    pub(super) fn new(units: &UnitConfig) -> Self {
        let mut buses = Vec::new();
        let mut first = [0; GpuUnit::ALL.len()];
        let mut count = [0; GpuUnit::ALL.len()];
        for (t, unit) in GpuUnit::ALL.into_iter().enumerate() {
            first[t] = buses.len();
            if unit == GpuUnit::System {
                continue;
            }
            count[t] = units.instances(unit);
            let width = units.bus_widths.width(unit);
            buses.extend((0..count[t]).map(|i| UnitBus::new(BusId::new(unit, i), width)));
        }
        Self { buses, first, count }
    }

    /// Table index of `id`, if attached.
    pub(super) fn position(&self, id: BusId) -> Option<usize> {
        let t = GpuUnit::ALL.iter().position(|u| *u == id.unit)?;
        (id.index < self.count[t]).then(|| self.first[t] + id.index)
    }

    pub(super) fn get(&self, id: BusId) -> Option<&UnitBus> {
        self.position(id).map(|i| &self.buses[i])
    }

    pub(super) fn get_mut(&mut self, id: BusId) -> Option<&mut UnitBus> {
        self.position(id).map(|i| &mut self.buses[i])
    }

    /// Drops one outstanding request from the count of `id`.
    pub(super) fn release(&mut self, id: BusId) {
        if let Some(bus) = self.get_mut(id) {
            bus.outstanding = bus.outstanding.saturating_sub(1);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.buses.len()
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &UnitBus> + '_ {
        self.buses.iter()
    }

    pub(super) fn iter_mut(&mut self) -> impl Iterator<Item = &mut UnitBus> + '_ {
        self.buses.iter_mut()
    }
}

impl Index<usize> for BusTable {
    type Output = UnitBus;

    fn index(&self, index: usize) -> &UnitBus {
        &self.buses[index]
    }
}

impl IndexMut<usize> for BusTable {
    fn index_mut(&mut self, index: usize) -> &mut UnitBus {
        &mut self.buses[index]
    }
}
