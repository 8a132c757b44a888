//! Configuration system for the GPU memory controller.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the controller. It provides:
//! 1. **Defaults:** Baseline DRAM geometry, buffer sizes, unit counts and bus widths.
//! 2. **Structures:** Hierarchical config for memory, interleaving, buffers, channel
//!    queues, units, system memory, the reference scheduler and the clock domains.
//! 3. **Enums:** Interleaving strategy, bank selection and page policy.
//! 4. **Validation:** `Config::validate` runs every construction-time check once.
//!
//! Configuration is supplied as JSON (see [`Config::from_json`]) or built with
//! `Config::default()`. It is never mutated after the controller is constructed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::constants::{BURST_BEAT_BYTES, MAX_BUS_WIDTH, MIN_BUS_WIDTH, WORD_BYTES};
use crate::common::error::ConfigError;
use crate::splitter::SplitterPair;
use crate::transaction::GpuUnit;

/// Default configuration constants for the controller.
mod defaults {
    /// Number of independent DRAM channels.
    pub const CHANNELS: u32 = 4;

    /// Banks per channel.
    pub const BANKS: u32 = 8;

    /// DRAM row (page) size in bytes.
    pub const ROW_SIZE: u32 = 2048;

    /// Beats per burst (bytes per burst = 4 x burst length).
    pub const BURST_LENGTH: u32 = 8;

    /// GPU-local memory size (256 MiB).
    pub const GPU_MEMORY_SIZE: u64 = 256 * 1024 * 1024;

    /// System memory size (64 MiB).
    pub const SYSTEM_MEMORY_SIZE: u64 = 64 * 1024 * 1024;

    /// Largest transaction a unit may issue.
    pub const MAX_TRANSACTION_SIZE: u32 = 256;

    /// Channel interleaving granularity in bytes.
    pub const CHANNEL_INTERLEAVING: u32 = 256;

    /// Bank interleaving granularity in bytes.
    pub const BANK_INTERLEAVING: u32 = 1024;

    /// Request buffer entries (GPU and system pools each).
    pub const REQUEST_QUEUE_SIZE: usize = 512;

    /// Completed reads waiting for a reply bus.
    pub const SERVICE_QUEUE_SIZE: usize = 128;

    /// Read buffer credits.
    pub const READ_BUFFERS: u32 = 64;

    /// Write buffer credits.
    pub const WRITE_BUFFERS: u32 = 64;

    /// Pending channel transactions per channel queue.
    pub const MAX_CHANNEL_TRANSACTIONS: usize = 64;

    /// Texture units attached to the controller.
    pub const TEXTURE_UNITS: usize = 4;

    /// Stamp pipes (one Z-stencil and one color-write unit each).
    pub const STAMP_UNITS: usize = 4;

    /// Streamer loader units.
    pub const STREAMER_LOADER_UNITS: usize = 4;

    /// Default bus width in bytes per cycle.
    pub const BUS_WIDTH: u32 = 64;

    /// System memory read latency in GPU cycles.
    pub const SYSTEM_READ_LATENCY: u64 = 500;

    /// System memory write latency in GPU cycles.
    pub const SYSTEM_WRITE_LATENCY: u64 = 500;

    /// Cycles a system bus stays busy per transaction.
    pub const SYSTEM_TRANSACTION_CYCLES: u64 = 16;

    /// Reference scheduler queue depth.
    pub const SCHEDULER_QUEUE_SIZE: usize = 16;

    /// CAS latency in memory cycles.
    pub const T_CAS: u64 = 14;

    /// RAS latency in memory cycles.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in memory cycles.
    pub const T_PRE: u64 = 14;

    /// Memory cycles to transfer one burst.
    pub const BURST_CYCLES: u64 = 4;

    /// GPU clock in MHz.
    pub const GPU_FREQUENCY_MHZ: u64 = 500;

    /// Memory clock in MHz.
    pub const MEMORY_FREQUENCY_MHZ: u64 = 1000;
}

/// Address interleaving strategy for one splitter instance.
///
/// Bit lists name address bit positions of the GPU offset, least significant
/// selector bit first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum InterleavingConfig {
    /// Power-of-two channel and bank interleaving granularities in bytes.
    Stride {
        /// Bytes mapped to one channel before rotating to the next.
        channel_interleaving: u32,
        /// Bytes mapped to one bank before rotating to the next.
        bank_interleaving: u32,
    },
    /// Explicit, disjoint channel and bank selector bits.
    Bitmask {
        /// Address bits forming the channel selector.
        channel_bits: Vec<u32>,
        /// Address bits forming the bank selector.
        bank_bits: Vec<u32>,
    },
}

impl Default for InterleavingConfig {
    fn default() -> Self {
        Self::Stride {
            channel_interleaving: defaults::CHANNEL_INTERLEAVING,
            bank_interleaving: defaults::BANK_INTERLEAVING,
        }
    }
}

/// Order in which per-bank channel queues are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BankSelection {
    /// Rotate the starting bank every dispatch.
    #[default]
    RoundRobin,
    /// Visit banks by the enqueue time of their head transaction.
    OldestFirst,
}

/// Page management policy of the reference scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PagePolicy {
    /// Leave the row open after an access.
    #[default]
    Open,
    /// Precharge after every access.
    Close,
}

/// Root configuration.
///
/// # Examples
///
/// ```
/// use gpumc_core::config::{Config, InterleavingConfig};
///
/// let json = r#"{
///     "memory": { "channels": 2, "banks_per_channel": 2, "burst_length": 8 },
///     "interleaving": {
///         "first": { "type": "Stride", "channel_interleaving": 32, "bank_interleaving": 64 }
///     }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.memory.channels, 2);
/// assert_eq!(
///     config.interleaving.first,
///     InterleavingConfig::Stride { channel_interleaving: 32, bank_interleaving: 64 }
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings (tracing, snapshot directory).
    pub general: GeneralConfig,
    /// DRAM geometry and memory sizes.
    pub memory: MemoryConfig,
    /// Address interleaving.
    pub interleaving: InterleavingSetup,
    /// Request, service and data buffers.
    pub buffers: BufferConfig,
    /// Channel queue organisation.
    pub channel_queues: ChannelQueueConfig,
    /// Attached units and their bus widths.
    pub units: UnitConfig,
    /// System memory timing.
    pub system: SystemMemoryConfig,
    /// Reference channel scheduler.
    pub scheduler: SchedulerConfig,
    /// Clock domain frequencies.
    pub clocks: ClockConfig,
}

impl Config {
    /// Parses a JSON configuration; missing sections and fields take defaults.
    ///
    /// # Arguments
    ///
    /// * `text` - JSON document.
    ///
    /// # Returns
    ///
    /// The parsed configuration, not yet validated.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Bytes carried by one DRAM burst.
    pub const fn burst_bytes(&self) -> u32 {
        BURST_BEAT_BYTES * self.memory.burst_length
    }

    /// Number of request buffer entries each unit class may need at once.
    ///
    /// The controller stops accepting new requests when fewer entries than
    /// this remain free in either request pool.
    pub const fn admission_reserve(&self) -> usize {
        let u = &self.units;
        2 + 2 + 2 * u.streamer_loader_units + 4 * u.stamp_units + 2 + 2 * u.texture_units
    }

    /// Write buffers that must be free before writes are accepted.
    pub const fn write_reserve(&self) -> u32 {
        2 + 4 * self.units.stamp_units as u32
    }

    /// Runs every construction-time check.
    ///
    /// # Returns
    ///
    /// `Ok(())` when the configuration describes a buildable controller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.memory;
        if !matches!(m.channels, 1 | 2 | 4 | 8 | 16) {
            return Err(ConfigError::ChannelCount(m.channels));
        }
        if !matches!(m.banks_per_channel, 1 | 2 | 4 | 8) {
            return Err(ConfigError::BankCount(m.banks_per_channel));
        }
        if m.burst_length == 0 {
            return Err(ConfigError::BurstLength);
        }
        let burst_bytes = self.burst_bytes();
        if m.row_size == 0 || m.row_size % burst_bytes != 0 {
            return Err(ConfigError::RowSize {
                row_size: m.row_size,
                burst_bytes,
            });
        }
        let granule = u64::from(m.channels) * u64::from(m.banks_per_channel) * u64::from(m.row_size);
        if m.gpu_memory_size == 0 || m.gpu_memory_size % granule != 0 {
            return Err(ConfigError::MemorySize {
                size: m.gpu_memory_size,
                granule,
            });
        }
        if m.gpu_memory_size > 1 << 31 {
            return Err(ConfigError::MemoryTooLarge(m.gpu_memory_size));
        }
        if m.system_memory_size % u64::from(WORD_BYTES) != 0 || m.system_memory_size > 1 << 31 {
            return Err(ConfigError::SystemMemorySize(m.system_memory_size));
        }
        if m.max_transaction_size == 0 {
            return Err(ConfigError::ZeroSized("max_transaction_size"));
        }

        let u = &self.units;
        for (name, count) in [
            ("texture_units", u.texture_units),
            ("stamp_units", u.stamp_units),
            ("streamer_loader_units", u.streamer_loader_units),
        ] {
            if count == 0 {
                return Err(ConfigError::ZeroSized(name));
            }
        }
        for unit in GpuUnit::ALL {
            let width = u.bus_widths.width(unit);
            if !(MIN_BUS_WIDTH..=MAX_BUS_WIDTH).contains(&width) {
                return Err(ConfigError::BusWidth {
                    unit: unit.name(),
                    width,
                });
            }
        }

        let b = &self.buffers;
        let minimum = 2 * (u.texture_units + u.stamp_units + u.streamer_loader_units + 3);
        if b.request_queue_size < minimum {
            return Err(ConfigError::RequestQueueSize {
                size: b.request_queue_size,
                minimum,
            });
        }
        for (name, value) in [
            ("service_queue_size", b.service_queue_size),
            ("read_buffers", b.read_buffers as usize),
            ("write_buffers", b.write_buffers as usize),
            ("max_channel_transactions", b.max_channel_transactions),
            ("scheduler.queue_size", self.scheduler.queue_size),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSized(name));
            }
        }
        if self.system.transaction_cycles == 0 {
            return Err(ConfigError::ZeroSized("system.transaction_cycles"));
        }
        if self.clocks.gpu_frequency_mhz == 0 {
            return Err(ConfigError::ClockFrequency("gpu"));
        }
        if self.clocks.memory_frequency_mhz == 0 {
            return Err(ConfigError::ClockFrequency("memory"));
        }

        SplitterPair::new(self).map(|_| ())
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Emit a `gpumc::memtrace` trace event for every accepted unit transaction.
    #[serde(default)]
    pub memory_trace: bool,

    /// Directory holding the memory snapshot files.
    #[serde(default = "GeneralConfig::default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl GeneralConfig {
    fn default_snapshot_dir() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            memory_trace: false,
            snapshot_dir: Self::default_snapshot_dir(),
        }
    }
}

/// DRAM geometry and memory sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Independent DRAM channels (1, 2, 4, 8 or 16).
    pub channels: u32,
    /// Banks per channel (1, 2, 4 or 8).
    pub banks_per_channel: u32,
    /// Row (page) size in bytes.
    pub row_size: u32,
    /// Beats per burst; one beat carries 4 bytes.
    pub burst_length: u32,
    /// GPU-local memory size in bytes.
    pub gpu_memory_size: u64,
    /// System memory size in bytes.
    pub system_memory_size: u64,
    /// Largest transaction a unit may issue, in bytes.
    pub max_transaction_size: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            channels: defaults::CHANNELS,
            banks_per_channel: defaults::BANKS,
            row_size: defaults::ROW_SIZE,
            burst_length: defaults::BURST_LENGTH,
            gpu_memory_size: defaults::GPU_MEMORY_SIZE,
            system_memory_size: defaults::SYSTEM_MEMORY_SIZE,
            max_transaction_size: defaults::MAX_TRANSACTION_SIZE,
        }
    }
}

/// The two splitter instances and the threshold choosing between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterleavingSetup {
    /// Interleaving used below the second start address.
    pub first: InterleavingConfig,
    /// Interleaving used at and above the second start address.
    pub second: InterleavingConfig,
    /// Whether the second interleaving exists at all.
    pub second_enabled: bool,
    /// Initial second interleaving start address (0 disables the switch).
    pub second_start_address: u32,
}

/// Request, service and data buffer sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Entries in each request pool (GPU and system).
    pub request_queue_size: usize,
    /// Completed reads waiting for their reply bus.
    pub service_queue_size: usize,
    /// Read buffer credits.
    pub read_buffers: u32,
    /// Write buffer credits.
    pub write_buffers: u32,
    /// Capacity of each channel (or channel bank) queue.
    pub max_channel_transactions: usize,
    /// Cap the request buffer share of every Z-stencil and color-write unit.
    pub split_request_buffer_per_rop: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            request_queue_size: defaults::REQUEST_QUEUE_SIZE,
            service_queue_size: defaults::SERVICE_QUEUE_SIZE,
            read_buffers: defaults::READ_BUFFERS,
            write_buffers: defaults::WRITE_BUFFERS,
            max_channel_transactions: defaults::MAX_CHANNEL_TRANSACTIONS,
            split_request_buffer_per_rop: false,
        }
    }
}

/// Channel queue organisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelQueueConfig {
    /// One queue per bank instead of one per channel.
    pub per_bank: bool,
    /// Bank visiting order when `per_bank` is set.
    pub bank_selection: BankSelection,
}

/// Attached units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Texture units.
    pub texture_units: usize,
    /// Stamp pipes (Z-stencil and color-write pairs).
    pub stamp_units: usize,
    /// Streamer loader units.
    pub streamer_loader_units: usize,
    /// Bus width per unit type.
    pub bus_widths: BusWidthConfig,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            texture_units: defaults::TEXTURE_UNITS,
            stamp_units: defaults::STAMP_UNITS,
            streamer_loader_units: defaults::STREAMER_LOADER_UNITS,
            bus_widths: BusWidthConfig::default(),
        }
    }
}

impl UnitConfig {
    /// Number of buses (sub-units) attached for a unit type.
    pub const fn instances(&self, unit: GpuUnit) -> usize {
        match unit {
            GpuUnit::CommandProcessor | GpuUnit::StreamerFetch | GpuUnit::Dac => 1,
            GpuUnit::StreamerLoader => self.streamer_loader_units,
            GpuUnit::ZStencilTest | GpuUnit::ColorWrite => self.stamp_units,
            GpuUnit::TextureUnit => self.texture_units,
            GpuUnit::System => crate::common::constants::SYSTEM_BUSES,
        }
    }
}

/// Bus width in bytes per cycle for every unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusWidthConfig {
    /// Command processor.
    pub command_processor: u32,
    /// Streamer fetch.
    pub streamer_fetch: u32,
    /// Streamer loader.
    pub streamer_loader: u32,
    /// Z-stencil test.
    pub z_stencil: u32,
    /// Color write.
    pub color_write: u32,
    /// Display controller.
    pub dac: u32,
    /// Texture unit.
    pub texture_unit: u32,
    /// System memory buses.
    pub system: u32,
}

impl Default for BusWidthConfig {
    fn default() -> Self {
        Self {
            command_processor: defaults::BUS_WIDTH,
            streamer_fetch: defaults::BUS_WIDTH,
            streamer_loader: defaults::BUS_WIDTH,
            z_stencil: defaults::BUS_WIDTH,
            color_write: defaults::BUS_WIDTH,
            dac: defaults::BUS_WIDTH,
            texture_unit: defaults::BUS_WIDTH,
            system: defaults::BUS_WIDTH,
        }
    }
}

impl BusWidthConfig {
    /// Width of the buses attached to `unit`.
    pub const fn width(&self, unit: GpuUnit) -> u32 {
        match unit {
            GpuUnit::CommandProcessor => self.command_processor,
            GpuUnit::StreamerFetch => self.streamer_fetch,
            GpuUnit::StreamerLoader => self.streamer_loader,
            GpuUnit::ZStencilTest => self.z_stencil,
            GpuUnit::ColorWrite => self.color_write,
            GpuUnit::Dac => self.dac,
            GpuUnit::TextureUnit => self.texture_unit,
            GpuUnit::System => self.system,
        }
    }

    /// Cycles needed to move `bytes` across a bus of `unit`.
    pub const fn transfer_cycles(&self, unit: GpuUnit, bytes: u32) -> u32 {
        bytes.div_ceil(self.width(unit))
    }
}

/// System memory timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMemoryConfig {
    /// Cycles from read issue until the data returns.
    pub read_latency: u64,
    /// Cycles from write issue until the write is acknowledged.
    pub write_latency: u64,
    /// Cycles a system bus stays busy per transaction.
    pub transaction_cycles: u64,
}

impl Default for SystemMemoryConfig {
    fn default() -> Self {
        Self {
            read_latency: defaults::SYSTEM_READ_LATENCY,
            write_latency: defaults::SYSTEM_WRITE_LATENCY,
            transaction_cycles: defaults::SYSTEM_TRANSACTION_CYCLES,
        }
    }
}

/// Reference channel scheduler parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Transactions the scheduler holds before refusing more.
    pub queue_size: usize,
    /// Row buffer management.
    pub page_policy: PagePolicy,
    /// Column access latency.
    pub t_cas: u64,
    /// Row activation latency.
    pub t_ras: u64,
    /// Precharge latency.
    pub t_pre: u64,
    /// Memory cycles to move one burst.
    pub burst_cycles: u64,
    /// Advertise one accept state per bank instead of one per channel.
    pub per_bank_state: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_size: defaults::SCHEDULER_QUEUE_SIZE,
            page_policy: PagePolicy::Open,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            burst_cycles: defaults::BURST_CYCLES,
            per_bank_state: false,
        }
    }
}

/// Clock domain frequencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// GPU domain frequency in MHz.
    pub gpu_frequency_mhz: u64,
    /// Memory domain frequency in MHz.
    pub memory_frequency_mhz: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            gpu_frequency_mhz: defaults::GPU_FREQUENCY_MHZ,
            memory_frequency_mhz: defaults::MEMORY_FREQUENCY_MHZ,
        }
    }
}
