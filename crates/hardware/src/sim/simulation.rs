//! Two-domain simulation driver.

use crate::common::error::{ConfigError, SimError};
use crate::config::{ClockConfig, Config};
use crate::controller::{McCommand, MemoryController};
use crate::transaction::{BusId, MemoryTransaction};

/// Picoseconds per microsecond; periods are `PS_PER_US / frequency_mhz`.
const PS_PER_US: u64 = 1_000_000;

/// Clock domain advanced by one [`Simulation::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// GPU clock domain.
    Gpu,
    /// Memory clock domain.
    Memory,
}

/// A memory controller clocked by two independent clocks.
///
/// Time advances in integer picoseconds. Each step runs whichever domain has the
/// earlier next edge; when both edges coincide the GPU domain runs first.
#[derive(Debug)]
pub struct Simulation {
    controller: MemoryController,
    gpu_period: u64,
    memory_period: u64,
    next_gpu: u64,
    next_memory: u64,
    gpu_cycle: u64,
    memory_cycle: u64,
    halted: bool,
}

impl Simulation {
    /// Creates a simulation around a controller built from `config`.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Ok(Self::with_controller(MemoryController::new(config)?))
    }

    /// Creates a simulation around an existing controller, using its clock settings.
    pub fn with_controller(controller: MemoryController) -> Self {
        let ClockConfig {
            gpu_frequency_mhz,
            memory_frequency_mhz,
        } = controller.config().clocks;
        Self {
            controller,
            gpu_period: (PS_PER_US / gpu_frequency_mhz.max(1)).max(1),
            memory_period: (PS_PER_US / memory_frequency_mhz.max(1)).max(1),
            next_gpu: 0,
            next_memory: 0,
            gpu_cycle: 0,
            memory_cycle: 0,
            halted: false,
        }
    }

    /// The controller.
    pub const fn controller(&self) -> &MemoryController {
        &self.controller
    }

    /// The controller, mutably.
    pub const fn controller_mut(&mut self) -> &mut MemoryController {
        &mut self.controller
    }

    /// GPU cycles completed.
    pub const fn gpu_cycle(&self) -> u64 {
        self.gpu_cycle
    }

    /// Memory cycles completed.
    pub const fn memory_cycle(&self) -> u64 {
        self.memory_cycle
    }

    /// Simulated time of the next clock edge, in picoseconds.
    pub fn time_ps(&self) -> u64 {
        self.next_gpu.min(self.next_memory)
    }

    /// Whether a fatal error has stopped the simulation.
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Places a unit transaction on its request bus.
    pub fn submit(&mut self, transaction: MemoryTransaction) -> Result<(), SimError> {
        self.controller.submit(transaction)
    }

    /// Queues a controller command.
    pub fn submit_command(&mut self, command: McCommand) {
        self.controller.submit_command(command);
    }

    /// Takes the oldest read reply delivered on `bus`.
    pub fn take_reply(&mut self, bus: BusId) -> Option<MemoryTransaction> {
        self.controller.take_reply(bus)
    }

    /// Advances the domain with the earlier next edge by one cycle.
    ///
    /// # Returns
    ///
    /// The domain that ran. A fatal controller error is logged together with the
    /// controller's debug dump, halts the simulation and is returned; later calls
    /// fail with `SimError::Halted`.
    pub fn step(&mut self) -> Result<Domain, SimError> {
        if self.halted {
            return Err(SimError::Halted);
        }
        let (domain, result) = if self.next_gpu <= self.next_memory {
            let r = self.controller.advance_gpu_domain(self.gpu_cycle);
            self.gpu_cycle += 1;
            self.next_gpu += self.gpu_period;
            (Domain::Gpu, r)
        } else {
            let r = self.controller.advance_memory_domain(self.memory_cycle);
            self.memory_cycle += 1;
            self.next_memory += self.memory_period;
            (Domain::Memory, r)
        };
        if let Err(e) = result {
            self.halted = true;
            tracing::error!(error = %e, "fatal controller error\n{}", self.controller.debug_info());
            return Err(e);
        }
        Ok(domain)
    }

    /// Runs until one more GPU cycle has completed, including every memory cycle
    /// whose edge comes earlier.
    pub fn tick_gpu(&mut self) -> Result<(), SimError> {
        while self.step()? != Domain::Gpu {}
        Ok(())
    }

    /// Runs `cycles` GPU cycles.
    pub fn run_gpu_cycles(&mut self, cycles: u64) -> Result<(), SimError> {
        for _ in 0..cycles {
            self.tick_gpu()?;
        }
        Ok(())
    }

    /// Runs until the controller is idle or `max_gpu_cycles` more GPU cycles have run.
    ///
    /// # Returns
    ///
    /// `true` if the controller went idle within the limit.
    pub fn run_until_idle(&mut self, max_gpu_cycles: u64) -> Result<bool, SimError> {
        for _ in 0..max_gpu_cycles {
            if self.controller.is_idle() {
                return Ok(true);
            }
            self.tick_gpu()?;
        }
        Ok(self.controller.is_idle())
    }
}
