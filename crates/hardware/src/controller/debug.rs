//! Debug dump.

use std::fmt::Write as _;

use super::MemoryController;

/// Formats ascending integers, folding consecutive runs into ranges.
///
/// # Examples
///
/// ```
/// use gpumc_core::controller::range_list;
///
/// assert_eq!(range_list(&[0, 2, 3, 4, 5, 9]), "{ 0, [2..5], 9 (6) }");
/// assert_eq!(range_list(&[]), "{ (0) }");
/// ```
pub fn range_list(values: &[usize]) -> String {
    let mut parts = Vec::new();
    let mut iter = values.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            let _ = iter.next();
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("[{start}..{end}]")
        });
    }
    if parts.is_empty() {
        format!("{{ ({}) }}", values.len())
    } else {
        format!("{{ {} ({}) }}", parts.join(", "), values.len())
    }
}

impl MemoryController {
    /// Human-readable dump of the controller state, for fatal error reports.
    pub fn debug_info(&self) -> String {
        let mut out = String::new();
        let o = &mut out;
        let _ = writeln!(
            o,
            "memory controller @ gpu cycle {} / memory cycle {}",
            self.gpu_cycle, self.memory_cycle
        );
        let _ = writeln!(
            o,
            "  read buffers free {}/{}  write buffers free {}/{}",
            self.free_read_buffers,
            self.config.buffers.read_buffers,
            self.free_write_buffers,
            self.config.buffers.write_buffers
        );
        let _ = writeln!(o, "  gpu requests    {}", range_list(&self.requests.occupied_slots()));
        for (slot, r) in self.requests.occupied() {
            let _ = writeln!(
                o,
                "    [{}] {} counter={} arrival={} {}",
                slot.0,
                r.state(),
                r.counter(),
                r.arrival(),
                r.transaction()
            );
        }
        let _ = writeln!(
            o,
            "  system requests {}",
            range_list(&self.system_requests.occupied_slots())
        );
        let queued: Vec<usize> = self.system_queue.iter().map(|s| s.0).collect();
        let _ = writeln!(o, "  system fifo     {queued:?}");
        for (i, bus) in self.system_buses.iter().enumerate() {
            let _ = writeln!(o, "  system bus {i}    pending={}", bus.pending());
        }
        let _ = writeln!(o, "  service queue   {} entries", self.service_queue.len());
        for entry in &self.service_queue {
            let _ = writeln!(o, "    {} arrival={}", entry.reply, entry.arrival);
        }
        let _ = writeln!(
            o,
            "  second interleaving start {:#010x}",
            self.splitters.second_start()
        );
        for bus in self.buses.iter() {
            let _ = writeln!(o, "  {bus}");
        }
        for (channel, (queues, scheduler)) in self.channel_queues.iter().zip(&self.schedulers).enumerate() {
            let lens: Vec<usize> = queues.iter().map(crate::dependency::DependencyQueue::len).collect();
            let _ = writeln!(
                o,
                "  channel {channel}: queues {lens:?} scheduler [{}] pending {}",
                scheduler.state(),
                scheduler.pending()
            );
            for queue in queues {
                for e in queue.iter() {
                    let dep = e
                        .dependency()
                        .map_or_else(|| "-".to_string(), |d| d.to_string());
                    let _ = writeln!(o, "    {} dep={dep} ts={}", e.transaction(), e.timestamp());
                }
            }
        }
        out
    }
}
