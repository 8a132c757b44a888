use gpumc_core::MemoryController;
use gpumc_core::config::{Config, InterleavingConfig};
use gpumc_core::sim::Simulation;
use gpumc_core::transaction::{BusId, GpuUnit, MemoryTransaction};
use tracing_subscriber::EnvFilter;

/// GPU cycles a helper waits before declaring the controller stuck.
pub const MAX_CYCLES: u64 = 20_000;

pub const COLOR0: BusId = BusId::new(GpuUnit::ColorWrite, 0);
pub const ZST0: BusId = BusId::new(GpuUnit::ZStencilTest, 0);
pub const TEX0: BusId = BusId::new(GpuUnit::TextureUnit, 0);
pub const CP: BusId = BusId::new(GpuUnit::CommandProcessor, 0);

/// Start of system memory in the unit address map.
pub const SYSTEM_BASE: u32 = 0x8000_0000;

/// Two channels, two banks, 32-byte bursts and one instance of every unit.
///
/// With one unit per class the admission reserve is 14 request slots and the
/// write reserve is 6 buffers.
pub fn small_config() -> Config {
    let mut config = Config::default();
    config.memory.channels = 2;
    config.memory.banks_per_channel = 2;
    config.memory.row_size = 256;
    config.memory.burst_length = 8;
    config.memory.gpu_memory_size = 64 * 1024;
    config.memory.system_memory_size = 4096;
    config.interleaving.first = InterleavingConfig::Stride {
        channel_interleaving: 32,
        bank_interleaving: 64,
    };
    config.units.texture_units = 1;
    config.units.stamp_units = 1;
    config.units.streamer_loader_units = 1;
    config.buffers.request_queue_size = 32;
    config.buffers.service_queue_size = 8;
    config.buffers.read_buffers = 16;
    config.buffers.write_buffers = 16;
    config.buffers.max_channel_transactions = 16;
    config.scheduler.queue_size = 8;
    config.system.read_latency = 20;
    config.system.write_latency = 20;
    config.system.transaction_cycles = 4;
    config
}

/// Deterministic test bytes.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestContext {
    pub sim: Simulation,
    next_id: u32,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(small_config())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let sim = Simulation::new(config).expect("test configuration must be valid");
        Self { sim, next_id: 1 }
    }

    pub fn with_controller(controller: MemoryController) -> Self {
        init_tracing();
        Self {
            sim: Simulation::with_controller(controller),
            next_id: 1,
        }
    }

    pub fn controller(&self) -> &MemoryController {
        self.sim.controller()
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Places a transaction on its request bus without clocking.
    pub fn issue(&mut self, tx: MemoryTransaction) {
        self.sim.submit(tx).expect("request bus must be free");
    }

    /// Clocks `cycles` GPU cycles.
    pub fn run(&mut self, cycles: u64) {
        self.sim.run_gpu_cycles(cycles).expect("no fatal controller error");
    }

    /// Clocks until nothing is in flight.
    pub fn settle(&mut self) {
        let idle = self.sim.run_until_idle(MAX_CYCLES).expect("no fatal controller error");
        assert!(idle, "controller did not drain:\n{}", self.controller().debug_info());
    }

    /// Issues an unmasked write and waits for it to retire.
    pub fn write(&mut self, bus: BusId, address: u32, data: &[u8]) {
        let id = self.id();
        self.issue(MemoryTransaction::write(bus, address, data.to_vec(), id));
        self.settle();
    }

    /// Issues a masked write and waits for it to retire.
    pub fn masked_write(&mut self, bus: BusId, address: u32, data: &[u8], mask: Vec<u32>) {
        let id = self.id();
        self.issue(MemoryTransaction::masked_write(bus, address, data.to_vec(), mask, id));
        self.settle();
    }

    /// Applies a preload; it takes effect in the next GPU cycle.
    pub fn preload(&mut self, bus: BusId, address: u32, data: &[u8]) {
        self.issue(MemoryTransaction::preload(bus, address, data.to_vec(), None));
        self.run(1);
    }

    /// Issues a read and clocks until its reply arrives on `bus`.
    pub fn read(&mut self, bus: BusId, address: u32, size: u32) -> MemoryTransaction {
        let id = self.id();
        self.issue(MemoryTransaction::read_request(bus, address, size, id));
        for _ in 0..MAX_CYCLES {
            self.sim.tick_gpu().expect("no fatal controller error");
            if let Some(reply) = self.sim.take_reply(bus) {
                return reply;
            }
        }
        panic!("no reply on {bus}:\n{}", self.controller().debug_info());
    }
}
