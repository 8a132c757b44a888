//! First/second interleaving selection.
//!
//! Memory below the second interleaving start address uses the first splitter and
//! memory at or above it uses the second. A start address of zero, or a
//! configuration without a second interleaving, routes everything to the first.

use crate::common::error::{ConfigError, SimError};
use crate::config::Config;

use super::{Geometry, RequestSplitter, build_mapping};

/// The two splitters and the start address choosing between them.
#[derive(Debug)]
pub struct SplitterPair {
    first: RequestSplitter,
    second: Option<RequestSplitter>,
    second_start: u32,
}

impl SplitterPair {
    /// Builds both splitters from the configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Controller configuration.
    ///
    /// # Returns
    ///
    /// The pair, or the configuration error of either interleaving.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let geometry = Geometry::from_config(config)?;
        let setup = &config.interleaving;
        let first = RequestSplitter::new(build_mapping(&setup.first, &geometry)?, geometry);
        let second = if setup.second_enabled {
            Some(RequestSplitter::new(build_mapping(&setup.second, &geometry)?, geometry))
        } else {
            None
        };
        Ok(Self {
            first,
            second,
            second_start: setup.second_start_address,
        })
    }

    /// Current second interleaving start address.
    pub const fn second_start(&self) -> u32 {
        self.second_start
    }

    /// Updates the second interleaving start address (0 disables the switch).
    pub const fn set_second_start(&mut self, address: u32) {
        self.second_start = address;
    }

    /// Geometry shared by both splitters.
    pub const fn geometry(&self) -> &Geometry {
        self.first.geometry()
    }

    /// Selects the splitter for `size` bytes at GPU offset `address`.
    ///
    /// # Returns
    ///
    /// The splitter, or `SimError::InterleavingStraddle` when the range crosses
    /// the second interleaving start address.
    pub fn select(&self, address: u32, size: u32) -> Result<&RequestSplitter, SimError> {
        let Some(second) = self.second.as_ref().filter(|_| self.second_start != 0) else {
            return Ok(&self.first);
        };
        let end = u64::from(address) + u64::from(size);
        if end <= u64::from(self.second_start) {
            Ok(&self.first)
        } else if address >= self.second_start {
            Ok(second)
        } else {
            Err(SimError::InterleavingStraddle {
                address,
                size,
                threshold: self.second_start,
            })
        }
    }
}
