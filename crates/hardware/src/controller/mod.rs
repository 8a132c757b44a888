//! Multi-channel memory controller.
//!
//! The controller connects the GPU units to GPU memory (served by one scheduler per
//! channel) and to system memory. It is clocked by two independent clocks:
//! 1. **GPU Domain:** Takes requests off the unit buses, admits them into the
//!    request buffer, sends read replies back, retires completed requests, runs the
//!    system memory path and broadcasts the admission state.
//! 2. **Memory Domain:** Clocks the channel schedulers, collects finished chunks and
//!    hands at most one new chunk per channel to its scheduler.
//!
//! Every fatal inconsistency surfaces as a [`SimError`]. The caller is expected to
//! stop clocking, report the error together with [`MemoryController::debug_info`]
//! and end the run.

/// Unit bus table.
mod bus;

/// Debug dump.
mod debug;

/// GPU clock domain stages.
mod gpu_domain;

/// Memory clock domain stages.
mod memory_domain;

/// Memory snapshot commands.
mod snapshot;

/// System memory path.
mod system;

/// System memory backing store.
pub mod sysmem;

pub use debug::range_list;
pub use sysmem::SystemMemory;

use std::collections::VecDeque;
use std::fmt;

use crate::common::constants::SYSTEM_BUSES;
use crate::common::error::{ConfigError, SimError};
use crate::config::Config;
use crate::dependency::DependencyQueue;
use crate::scheduler::{ChannelScheduler, RowBufferScheduler, SchedulerState};
use crate::splitter::{Geometry, SplitterPair};
use crate::stats::McStats;
use crate::transaction::{BusId, MemCommand, MemState, MemoryTransaction, RequestPool, RequestSlot};

use bus::BusTable;
use system::SystemBus;

/// Controller registers writable through [`McCommand::RegisterWrite`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum McRegister {
    /// First GPU address served by the second interleaving (0 disables it).
    SecondInterleavingStart,
}

/// Commands accepted from the command processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum McCommand {
    /// Writes a controller register.
    RegisterWrite {
        /// Register written.
        register: McRegister,
        /// New value.
        value: u32,
    },
    /// Dumps GPU and system memory to the snapshot files.
    SaveMemory,
    /// Restores GPU and system memory from the snapshot files.
    LoadMemory,
}

/// Completed read waiting for its reply bus.
#[derive(Debug)]
struct ServiceEntry {
    reply: MemoryTransaction,
    arrival: u64,
    system: bool,
}

/// The memory controller.
pub struct MemoryController {
    config: Config,
    splitters: SplitterPair,
    schedulers: Vec<Box<dyn ChannelScheduler>>,
    /// Per channel: one queue, or one per bank.
    channel_queues: Vec<Vec<DependencyQueue>>,
    next_bank: Vec<usize>,
    requests: RequestPool,
    buses: BusTable,
    service_queue: VecDeque<ServiceEntry>,
    free_read_buffers: u32,
    free_write_buffers: u32,
    commands: VecDeque<McCommand>,
    system_memory: SystemMemory,
    system_requests: RequestPool,
    system_queue: VecDeque<RequestSlot>,
    system_buses: [SystemBus; SYSTEM_BUSES],
    system_arrivals: VecDeque<RequestSlot>,
    next_ct_id: u64,
    gpu_cycle: u64,
    memory_cycle: u64,
    stats: McStats,
}

impl MemoryController {
    /// Creates a controller with one [`RowBufferScheduler`] per channel.
    ///
    /// # Arguments
    ///
    /// * `config` - Controller configuration; validated here.
    ///
    /// # Returns
    ///
    /// The controller, or the first configuration problem found.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = Geometry::from_config(&config)?;
        let schedulers = (0..geometry.channels)
            .map(|ch| {
                Box::new(RowBufferScheduler::new(ch, &geometry, &config.scheduler))
                    as Box<dyn ChannelScheduler>
            })
            .collect();
        Self::with_schedulers(config, schedulers)
    }

    /// Creates a controller driving caller-supplied channel schedulers.
    ///
    /// # Arguments
    ///
    /// * `config` - Controller configuration; validated here.
    /// * `schedulers` - One scheduler per channel, in channel order.
    pub fn with_schedulers(
        config: Config,
        schedulers: Vec<Box<dyn ChannelScheduler>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let splitters = SplitterPair::new(&config)?;
        let channels = config.memory.channels;
        if schedulers.len() != channels as usize {
            return Err(ConfigError::SchedulerCount {
                expected: channels,
                found: schedulers.len(),
            });
        }

        let queues_per_channel = if config.channel_queues.per_bank {
            config.memory.banks_per_channel as usize
        } else {
            1
        };
        let capacity = config.buffers.max_channel_transactions;
        let channel_queues = (0..channels)
            .map(|_| (0..queues_per_channel).map(|_| DependencyQueue::new(capacity)).collect())
            .collect();

        let b = &config.buffers;
        let mut controller = Self {
            splitters,
            schedulers,
            channel_queues,
            next_bank: vec![0; channels as usize],
            requests: RequestPool::new(b.request_queue_size),
            buses: BusTable::new(&config.units),
            service_queue: VecDeque::with_capacity(b.service_queue_size),
            free_read_buffers: b.read_buffers,
            free_write_buffers: b.write_buffers,
            commands: VecDeque::new(),
            system_memory: SystemMemory::new(config.memory.system_memory_size as usize),
            system_requests: RequestPool::new(b.request_queue_size),
            system_queue: VecDeque::new(),
            system_buses: [SystemBus::default(), SystemBus::default()],
            system_arrivals: VecDeque::new(),
            next_ct_id: 0,
            gpu_cycle: 0,
            memory_cycle: 0,
            stats: McStats::default(),
            config,
        };
        controller.send_bus_state();
        tracing::debug!(
            channels,
            banks = controller.config.memory.banks_per_channel,
            buses = controller.buses.len(),
            "memory controller ready"
        );
        Ok(controller)
    }

    /// Places a unit transaction on its request bus.
    ///
    /// The transaction is consumed by the next GPU cycle whose broadcast admission
    /// state accepts it; until then it stays latched.
    ///
    /// # Returns
    ///
    /// `SimError::UnknownBus` for a bus that is not attached,
    /// `SimError::UnexpectedCommand` for a `ReadData`, and
    /// `SimError::RequestBusOccupied` when the previous transaction is still latched.
    pub fn submit(&mut self, transaction: MemoryTransaction) -> Result<(), SimError> {
        let unit = transaction.source();
        let bus = self.buses.get_mut(unit).ok_or(SimError::UnknownBus { unit })?;
        if transaction.command() == MemCommand::ReadData {
            return Err(SimError::UnexpectedCommand {
                unit,
                command: MemCommand::ReadData,
            });
        }
        if bus.latch.is_some() {
            return Err(SimError::RequestBusOccupied { unit });
        }
        bus.latch = Some(transaction);
        Ok(())
    }

    /// Queues a controller command; commands run in order during the next GPU cycle.
    pub fn submit_command(&mut self, command: McCommand) {
        self.commands.push_back(command);
    }

    /// Admission state last broadcast on `bus` (`MemState::None` if not attached).
    pub fn admission_state(&self, bus: BusId) -> MemState {
        self.buses.get(bus).map_or(MemState::None, |b| b.state)
    }

    /// Whether `bus` still holds a transaction waiting for admission.
    pub fn is_latched(&self, bus: BusId) -> bool {
        self.buses.get(bus).is_some_and(|b| b.latch.is_some())
    }

    /// Takes the oldest read reply delivered on `bus`.
    pub fn take_reply(&mut self, bus: BusId) -> Option<MemoryTransaction> {
        self.buses.get_mut(bus)?.replies.pop_front()
    }

    /// Whether no request, chunk, reply or command is in flight anywhere.
    ///
    /// Replies already delivered to a unit inbox do not count.
    pub fn is_idle(&self) -> bool {
        self.requests.occupied_count() == 0
            && self.system_requests.occupied_count() == 0
            && self.service_queue.is_empty()
            && self.commands.is_empty()
            && self.buses.iter().all(bus::UnitBus::is_idle)
            && self.system_buses.iter().all(SystemBus::is_idle)
            && self.channel_queues.iter().flatten().all(DependencyQueue::is_empty)
            && self.schedulers.iter().all(|s| s.pending() == 0)
    }

    /// Configuration the controller was built with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Collected statistics.
    pub const fn stats(&self) -> &McStats {
        &self.stats
    }

    /// Last GPU cycle simulated.
    pub const fn gpu_cycle(&self) -> u64 {
        self.gpu_cycle
    }

    /// Last memory cycle simulated.
    pub const fn memory_cycle(&self) -> u64 {
        self.memory_cycle
    }

    /// Free read buffers.
    pub const fn free_read_buffers(&self) -> u32 {
        self.free_read_buffers
    }

    /// Free write buffers.
    pub const fn free_write_buffers(&self) -> u32 {
        self.free_write_buffers
    }

    /// GPU memory request buffer.
    pub const fn requests(&self) -> &RequestPool {
        &self.requests
    }

    /// System memory request buffer.
    pub const fn system_requests(&self) -> &RequestPool {
        &self.system_requests
    }

    /// Completed reads waiting for their reply bus.
    pub fn service_queue_len(&self) -> usize {
        self.service_queue.len()
    }

    /// Chunks waiting in the queues of `channel`.
    pub fn channel_queue_len(&self, channel: u32) -> usize {
        self.channel_queues
            .get(channel as usize)
            .map_or(0, |qs| qs.iter().map(DependencyQueue::len).sum())
    }

    /// Scheduler of `channel`.
    pub fn scheduler(&self, channel: u32) -> Option<&dyn ChannelScheduler> {
        self.schedulers.get(channel as usize).map(|s| &**s)
    }

    /// Current accept state of every channel scheduler.
    pub fn scheduler_states(&self) -> Vec<SchedulerState> {
        self.schedulers.iter().map(|s| s.state()).collect()
    }

    /// System memory contents.
    pub const fn system_memory(&self) -> &SystemMemory {
        &self.system_memory
    }

    /// Current second interleaving start address.
    pub const fn second_interleaving_start(&self) -> u32 {
        self.splitters.second_start()
    }

    /// Reads GPU memory directly from the schedulers' devices, bypassing timing.
    ///
    /// # Returns
    ///
    /// The bytes, or the splitting error for the range.
    pub fn peek_gpu(&self, address: u32, size: u32) -> Result<Vec<u8>, SimError> {
        self.check_gpu_range(address, size)?;
        let plans = self.splitters.select(address, size)?.plan(address, size)?;
        let mut out = vec![0u8; size as usize];
        for p in plans {
            let start = p.offset as usize;
            let dst = &mut out[start..start + p.bytes as usize];
            self.schedulers[p.info.channel as usize].read_data(p.info.bank, p.info.row, p.info.start_col, dst);
        }
        Ok(out)
    }

    fn check_gpu_range(&self, address: u32, size: u32) -> Result<(), SimError> {
        let limit = self.config.memory.gpu_memory_size;
        if u64::from(address) + u64::from(size) > limit {
            return Err(SimError::OutOfRange {
                space: crate::common::AddressSpace::Gpu,
                address,
                size,
                limit,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryController")
            .field("gpu_cycle", &self.gpu_cycle)
            .field("memory_cycle", &self.memory_cycle)
            .field("channels", &self.schedulers.len())
            .field("requests", &self.requests.occupied_count())
            .field("system_requests", &self.system_requests.occupied_count())
            .field("service_queue", &self.service_queue.len())
            .field("free_read_buffers", &self.free_read_buffers)
            .field("free_write_buffers", &self.free_write_buffers)
            .finish_non_exhaustive()
    }
}
