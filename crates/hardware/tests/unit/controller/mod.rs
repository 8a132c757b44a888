//! # Memory Controller Tests
//!
//! End-to-end behaviour of the controller driven through the two-clock
//! simulation, with the reference scheduler or with scheduler doubles.

/// Request admission, the broadcast state and held transactions.
pub mod admission;

/// Controller commands: register writes.
pub mod commands;

/// The debug dump and its helpers.
pub mod debug;

/// Fatal conditions and how they stop the simulation.
pub mod errors;

/// Reads, writes and preloads through the channel pipeline.
pub mod pipeline;


/// The system memory path.
pub mod system;
