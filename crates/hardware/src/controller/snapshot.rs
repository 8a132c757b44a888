//! Memory snapshots.
//!
//! GPU memory is dumped in GPU address order one burst at a time, reading each
//! burst from the channel scheduler the active interleaving maps it to, so a
//! snapshot loads back correctly under the same interleaving. System memory is
//! dumped verbatim.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::common::constants::{GPU_SNAPSHOT_FILE, SYSTEM_SNAPSHOT_FILE};
use crate::common::error::SimError;

use super::MemoryController;

impl MemoryController {
    /// Writes GPU memory and system memory to the given streams.
    pub fn save_memory_to(&self, gpu: &mut dyn Write, system: &mut dyn Write) -> Result<(), SimError> {
        let burst = self.splitters.geometry().burst_bytes;
        let mut buf = vec![0u8; burst as usize];
        let mut address = 0u64;
        while address < self.config.memory.gpu_memory_size {
            let a = address as u32;
            let info = self.splitters.select(a, burst)?.locate(a)?;
            self.schedulers[info.channel as usize].read_data(info.bank, info.row, info.start_col, &mut buf);
            gpu.write_all(&buf)?;
            address += u64::from(burst);
        }
        system.write_all(self.system_memory.as_slice())?;
        Ok(())
    }

    /// Restores memory from the given streams; `None` leaves that memory untouched.
    ///
    /// # Returns
    ///
    /// `SimError::Snapshot` if a stream ends before the memory is filled.
    pub fn load_memory_from(
        &mut self,
        gpu: Option<&mut dyn Read>,
        system: Option<&mut dyn Read>,
    ) -> Result<(), SimError> {
        if let Some(gpu) = gpu {
            let burst = self.splitters.geometry().burst_bytes;
            let mut buf = vec![0u8; burst as usize];
            let mut address = 0u64;
            while address < self.config.memory.gpu_memory_size {
                let a = address as u32;
                let info = self.splitters.select(a, burst)?.locate(a)?;
                gpu.read_exact(&mut buf)?;
                self.schedulers[info.channel as usize].write_data(info.bank, info.row, info.start_col, &buf);
                address += u64::from(burst);
            }
        }
        if let Some(system) = system {
            system.read_exact(self.system_memory.as_mut_slice())?;
        }
        Ok(())
    }

    /// Saves both memories to the snapshot files in the configured directory.
    pub fn save_memory(&self) -> Result<(), SimError> {
        let dir = &self.config.general.snapshot_dir;
        let mut gpu = BufWriter::new(File::create(dir.join(GPU_SNAPSHOT_FILE))?);
        let mut system = BufWriter::new(File::create(dir.join(SYSTEM_SNAPSHOT_FILE))?);
        self.save_memory_to(&mut gpu, &mut system)?;
        gpu.flush()?;
        system.flush()?;
        tracing::debug!(dir = %dir.display(), "memory snapshot saved");
        Ok(())
    }

    /// Loads both memories from the snapshot files in the configured directory.
    ///
    /// A missing file is reported as a warning and leaves that memory unchanged.
    pub fn load_memory(&mut self) -> Result<(), SimError> {
        let dir = self.config.general.snapshot_dir.clone();
        let mut gpu = open_snapshot(&dir.join(GPU_SNAPSHOT_FILE))?;
        let mut system = open_snapshot(&dir.join(SYSTEM_SNAPSHOT_FILE))?;
        self.load_memory_from(
            gpu.as_mut().map(|r| r as &mut dyn Read),
            system.as_mut().map(|r| r as &mut dyn Read),
        )?;
        tracing::debug!(dir = %dir.display(), "memory snapshot loaded");
        Ok(())
    }
}

fn open_snapshot(path: &Path) -> Result<Option<BufReader<File>>, SimError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "snapshot file not found, memory left unchanged");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
