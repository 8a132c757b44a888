//! Simulation driver.
//!
//! Clocks a memory controller's GPU and memory domains at their configured
//! frequencies and exposes the unit-side ports.

/// Two-domain simulation driver.
pub mod simulation;

pub use simulation::{Domain, Simulation};
