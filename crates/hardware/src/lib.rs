//! Cycle-accurate GPU memory controller library.
//!
//! This crate models the memory controller of a GPU with the following:
//! 1. **Transactions:** Unit requests and replies, shared payloads, and the single-row
//!    channel transactions they are split into.
//! 2. **Splitting:** Fixed-stride and bit-mask address interleaving across channels and
//!    banks, with a run-time switch to a second interleaving.
//! 3. **Hazards:** Per-channel dependency tracking that keeps overlapping accesses in order.
//! 4. **Controller:** Admission, request buffers, read/write credits, unit buses, the
//!    system memory path, snapshots and commands, clocked in two domains.
//! 5. **Schedulers:** The channel scheduler interface and a row-buffer reference model.
//! 6. **Simulation:** A two-clock driver, configuration, and statistics collection.

/// Common types and constants (addresses, errors, fixed parameters).
pub mod common;
/// Controller configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Memory controller (admission, GPU and memory domains, system path, snapshots).
pub mod controller;
/// Hazard dependency tracking for channel queues and scheduler buffers.
pub mod dependency;
/// Channel schedulers and the DRAM backing store.
pub mod scheduler;
/// Two-domain simulation driver.
pub mod sim;
/// Address mapping and request splitting.
pub mod splitter;
/// Controller statistics collection and reporting.
pub mod stats;
/// Unit transactions, channel transactions and request buffers.
pub mod transaction;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The memory controller; construct with `MemoryController::new`.
pub use crate::controller::{McCommand, McRegister, MemoryController};
/// Errors returned by construction and clocking.
pub use crate::common::error::{ConfigError, SimError};
/// Two-domain driver around a controller.
pub use crate::sim::Simulation;
