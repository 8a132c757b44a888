//! Controller statistics collection and reporting.
//!
//! This module tracks the traffic seen by the memory controller. It provides:
//! 1. **Summary:** Clock counts, admitted transactions and average buffer occupancy.
//! 2. **Per Bus:** Requests, bytes, accept cycles and read service latency per unit bus.
//! 3. **Per Channel:** Bytes moved between each unit bus and each channel.
//! 4. **Stalls:** Memory cycles in which a channel had work but could not dispatch.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::transaction::{BusId, MemCommand, MemState};

/// Counters kept for one unit bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Read requests admitted.
    pub read_requests: u64,
    /// Writes admitted.
    pub write_requests: u64,
    /// Preloads applied.
    pub preloads: u64,
    /// Bytes requested by reads.
    pub read_bytes: u64,
    /// Bytes carried by writes.
    pub write_bytes: u64,
    /// Read replies delivered.
    pub replies: u64,
    /// GPU cycles from admission to reply delivery, summed over replies.
    pub reply_latency: u64,
    /// GPU cycles in which reads were accepted.
    pub read_accept_cycles: u64,
    /// GPU cycles in which writes were accepted.
    pub write_accept_cycles: u64,
}

impl BusStats {
    /// Mean GPU cycles per delivered read reply.
    pub fn avg_reply_latency(&self) -> f64 {
        if self.replies == 0 {
            0.0
        } else {
            self.reply_latency as f64 / self.replies as f64
        }
    }
}

/// Bytes moved between one bus and one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelBytes {
    /// Bytes read.
    pub read: u64,
    /// Bytes written.
    pub write: u64,
}

/// Statistics of one memory controller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McStats {
    /// GPU domain cycles simulated.
    pub gpu_cycles: u64,
    /// Memory domain cycles simulated.
    pub memory_cycles: u64,
    /// Chunks handed to channel schedulers.
    pub chunks_dispatched: u64,
    /// Chunks returned by channel schedulers.
    pub chunks_completed: u64,
    /// Memory cycles a channel held a read it could not dispatch.
    pub read_stall_cycles: u64,
    /// Memory cycles a channel held a write it could not dispatch.
    pub write_stall_cycles: u64,
    /// Bytes read from system memory.
    pub system_read_bytes: u64,
    /// Bytes written to system memory.
    pub system_write_bytes: u64,
    /// Occupied GPU request slots, summed over GPU cycles.
    pub request_occupancy: u64,
    /// Occupied system request slots, summed over GPU cycles.
    pub system_request_occupancy: u64,
    /// Service queue entries, summed over GPU cycles.
    pub service_occupancy: u64,
    /// Per unit bus counters.
    pub buses: BTreeMap<BusId, BusStats>,
    /// Bytes per (bus, channel).
    pub channels: BTreeMap<(BusId, u32), ChannelBytes>,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"buses"`, `"channels"`, `"system"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "buses", "channels", "system"];

impl McStats {
    /// Counts a transaction taken off a request bus.
    pub fn record_request(&mut self, bus: BusId, command: MemCommand, size: u32) {
        let s = self.buses.entry(bus).or_default();
        match command {
            MemCommand::ReadRequest => {
                s.read_requests += 1;
                s.read_bytes += u64::from(size);
            }
            MemCommand::WriteData => {
                s.write_requests += 1;
                s.write_bytes += u64::from(size);
            }
            MemCommand::PreloadData => s.preloads += 1,
            MemCommand::ReadData => {}
        }
    }

    /// Counts a read reply delivered after `latency` GPU cycles.
    pub fn record_reply(&mut self, bus: BusId, latency: u64) {
        let s = self.buses.entry(bus).or_default();
        s.replies += 1;
        s.reply_latency += latency;
    }

    /// Counts the admission state broadcast on `bus` this cycle.
    pub fn record_state(&mut self, bus: BusId, state: MemState) {
        let s = self.buses.entry(bus).or_default();
        s.read_accept_cycles += u64::from(state.accepts_read());
        s.write_accept_cycles += u64::from(state.accepts_write());
    }

    /// Counts a chunk returned by `channel` on behalf of `bus`.
    pub fn record_chunk(&mut self, bus: BusId, channel: u32, bytes: u32, is_read: bool) {
        self.chunks_completed += 1;
        let c = self.channels.entry((bus, channel)).or_default();
        if is_read {
            c.read += u64::from(bytes);
        } else {
            c.write += u64::from(bytes);
        }
    }

    /// Per bus counters summed over every bus.
    pub fn totals(&self) -> BusStats {
        self.buses.values().fold(BusStats::default(), |mut t, s| {
            t.read_requests += s.read_requests;
            t.write_requests += s.write_requests;
            t.preloads += s.preloads;
            t.read_bytes += s.read_bytes;
            t.write_bytes += s.write_bytes;
            t.replies += s.replies;
            t.reply_latency += s.reply_latency;
            t.read_accept_cycles += s.read_accept_cycles;
            t.write_accept_cycles += s.write_accept_cycles;
            t
        })
    }

    /// Mean occupied GPU request slots per GPU cycle.
    pub fn avg_request_occupancy(&self) -> f64 {
        per_cycle(self.request_occupancy, self.gpu_cycles)
    }

    /// Mean service queue length per GPU cycle.
    pub fn avg_service_occupancy(&self) -> f64 {
        per_cycle(self.service_occupancy, self.gpu_cycles)
    }

    /// Renders the requested sections.
    ///
    /// # Arguments
    ///
    /// * `sections` - Section names from [`STATS_SECTIONS`], or empty for all.
    pub fn report(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let mut out = String::new();
        let o = &mut out;

        if want("summary") {
            let _ = writeln!(o, "\n==========================================================");
            let _ = writeln!(o, "GPU MEMORY CONTROLLER STATISTICS");
            let _ = writeln!(o, "==========================================================");
            let _ = writeln!(o, "gpu_cycles               {}", self.gpu_cycles);
            let _ = writeln!(o, "memory_cycles            {}", self.memory_cycles);
            let t = self.totals();
            let _ = writeln!(o, "transactions             {}", t.read_requests + t.write_requests);
            let _ = writeln!(o, "reads                    {} ({} B)", t.read_requests, t.read_bytes);
            let _ = writeln!(o, "writes                   {} ({} B)", t.write_requests, t.write_bytes);
            let _ = writeln!(o, "preloads                 {}", t.preloads);
            let _ = writeln!(o, "read_latency.avg         {:.2}", t.avg_reply_latency());
            let _ = writeln!(o, "chunks.dispatched        {}", self.chunks_dispatched);
            let _ = writeln!(o, "chunks.completed         {}", self.chunks_completed);
            let _ = writeln!(
                o,
                "stalls.read              {} ({:.2}%)",
                self.read_stall_cycles,
                per_cycle(self.read_stall_cycles, self.memory_cycles) * 100.0
            );
            let _ = writeln!(
                o,
                "stalls.write             {} ({:.2}%)",
                self.write_stall_cycles,
                per_cycle(self.write_stall_cycles, self.memory_cycles) * 100.0
            );
            let _ = writeln!(o, "request_buffer.avg       {:.2}", self.avg_request_occupancy());
            let _ = writeln!(o, "service_queue.avg        {:.2}", self.avg_service_occupancy());
            let _ = writeln!(o, "----------------------------------------------------------");
        }
        if want("buses") {
            let _ = writeln!(o, "UNIT BUSES");
            for (bus, s) in &self.buses {
                let _ = writeln!(
                    o,
                    "  {:<20} rd {:>8} ({:>10} B)  wr {:>8} ({:>10} B)  pre {:>4}  lat {:>8.2}",
                    bus.to_string(),
                    s.read_requests,
                    s.read_bytes,
                    s.write_requests,
                    s.write_bytes,
                    s.preloads,
                    s.avg_reply_latency()
                );
                let _ = writeln!(
                    o,
                    "  {:<20} accept.read {:.2}%  accept.write {:.2}%",
                    "",
                    per_cycle(s.read_accept_cycles, self.gpu_cycles) * 100.0,
                    per_cycle(s.write_accept_cycles, self.gpu_cycles) * 100.0
                );
            }
            let _ = writeln!(o, "----------------------------------------------------------");
        }
        if want("channels") {
            let _ = writeln!(o, "CHANNEL TRAFFIC");
            for ((bus, channel), c) in &self.channels {
                let _ = writeln!(
                    o,
                    "  {:<20} ch{:<3} read {:>10} B  write {:>10} B",
                    bus.to_string(),
                    channel,
                    c.read,
                    c.write
                );
            }
            let _ = writeln!(o, "----------------------------------------------------------");
        }
        if want("system") {
            let _ = writeln!(o, "SYSTEM MEMORY");
            let _ = writeln!(o, "  bytes.read             {}", self.system_read_bytes);
            let _ = writeln!(o, "  bytes.write            {}", self.system_write_bytes);
            let _ = writeln!(
                o,
                "  request_buffer.avg     {:.2}",
                per_cycle(self.system_request_occupancy, self.gpu_cycles)
            );
            let _ = writeln!(o, "==========================================================");
        }
        out
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.report(sections));
    }

    /// Prints every section.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}

fn per_cycle(total: u64, cycles: u64) -> f64 {
    if cycles == 0 {
        0.0
    } else {
        total as f64 / cycles as f64
    }
}
