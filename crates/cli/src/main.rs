//! GPU memory controller simulator CLI.
//!
//! This binary drives the controller model from the command line. It performs:
//! 1. **Trace run:** Loads a JSON configuration and a JSON transaction trace, issues
//!    each transaction on its unit bus once the admission state allows it, clocks both
//!    domains until the trace drains, and prints statistics.
//! 2. **Config dump:** Prints the default configuration as JSON, as a starting point
//!    for custom configurations.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::{fs, process};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use gpumc_core::config::Config;
use gpumc_core::sim::Simulation;
use gpumc_core::transaction::{BusId, GpuUnit, MemCommand, MemoryTransaction};

#[derive(Parser, Debug)]
#[command(
    name = "gpumc",
    author,
    version,
    about = "Cycle-accurate GPU memory controller simulator",
    long_about = "Replay a transaction trace through the memory controller model.\n\nExamples:\n  gpumc config > mc.json\n  gpumc run --config mc.json --trace trace.json --stats summary --stats buses"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON transaction trace.
    Run {
        /// Controller configuration (JSON); defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Transaction trace (JSON array of entries).
        #[arg(short, long)]
        trace: PathBuf,

        /// Stop after this many GPU cycles.
        #[arg(long, default_value_t = 10_000_000)]
        max_cycles: u64,

        /// Statistics sections to print (summary, buses, channels, system); all when omitted.
        #[arg(long)]
        stats: Vec<String>,

        /// Print every read reply as it is delivered.
        #[arg(long)]
        replies: bool,
    },

    /// Print the default configuration as JSON.
    Config,
}

/// One trace entry.
#[derive(Debug, Deserialize)]
struct TraceEntry {
    /// Earliest GPU cycle the transaction may be issued.
    cycle: u64,
    command: MemCommand,
    unit: GpuUnit,
    #[serde(default)]
    sub_unit: usize,
    address: u32,
    /// Bytes to read; writes and preloads take their size from `data`.
    #[serde(default)]
    size: u32,
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    mask: Option<Vec<u32>>,
}

impl TraceEntry {
    fn into_transaction(self, id: u32) -> Result<MemoryTransaction, String> {
        let bus = BusId::new(self.unit, self.sub_unit);
        match self.command {
            MemCommand::ReadRequest => Ok(MemoryTransaction::read_request(bus, self.address, self.size, id)),
            MemCommand::WriteData => Ok(match self.mask {
                Some(mask) => MemoryTransaction::masked_write(bus, self.address, self.data, mask, id),
                None => MemoryTransaction::write(bus, self.address, self.data, id),
            }),
            MemCommand::PreloadData => Ok(MemoryTransaction::preload(bus, self.address, self.data, self.mask)),
            MemCommand::ReadData => Err(format!("trace entry {id}: units cannot issue ReadData")),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            trace,
            max_cycles,
            stats,
            replies,
        } => cmd_run(config, &trace, max_cycles, &stats, replies),
        Commands::Config => cmd_config(),
    }
}

fn cmd_config() {
    match serde_json::to_string_pretty(&Config::default()) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error serialising configuration: {e}");
            process::exit(1);
        }
    }
}

fn read_file(path: &PathBuf, what: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {what} {}: {e}", path.display());
        process::exit(1);
    })
}

/// Loads the trace into per-bus FIFOs, keeping file order within each bus.
fn load_trace(path: &PathBuf) -> BTreeMap<BusId, VecDeque<(u64, MemoryTransaction)>> {
    let entries: Vec<TraceEntry> = serde_json::from_str(&read_file(path, "trace")).unwrap_or_else(|e| {
        eprintln!("Error parsing trace {}: {e}", path.display());
        process::exit(1);
    });
    let mut queues: BTreeMap<BusId, VecDeque<(u64, MemoryTransaction)>> = BTreeMap::new();
    for (id, entry) in entries.into_iter().enumerate() {
        let cycle = entry.cycle;
        let tx = entry.into_transaction(id as u32).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        });
        queues.entry(tx.source()).or_default().push_back((cycle, tx));
    }
    queues
}

/// Replays the trace, clocking the simulation one GPU cycle at a time.
///
/// On a fatal controller error the simulation has already logged the error and the
/// debug dump; statistics are printed and the process exits with code 1.
fn cmd_run(config: Option<PathBuf>, trace: &PathBuf, max_cycles: u64, stats: &[String], replies: bool) {
    let config = match config {
        Some(path) => Config::from_json(&read_file(&path, "config")).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(1);
        }),
        None => Config::default(),
    };
    let mut sim = Simulation::new(config).unwrap_or_else(|e| {
        eprintln!("Error: invalid configuration: {e}");
        process::exit(1);
    });
    let mut queues = load_trace(trace);
    let buses: Vec<BusId> = queues.keys().copied().collect();
    let total: usize = queues.values().map(VecDeque::len).sum();
    println!("[*] Replaying {total} transactions on {} buses", buses.len());

    tracing::debug!(total, buses = buses.len(), max_cycles, "trace loaded");

    let mut delivered = 0u64;
    while sim.gpu_cycle() < max_cycles {
        let now = sim.gpu_cycle();
        for (bus, queue) in &mut queues {
            let ready = queue
                .front()
                .is_some_and(|(cycle, tx)| *cycle <= now && sim.controller().admission_state(*bus).accepts(tx.command()));
            if !ready || sim.controller().is_latched(*bus) {
                continue;
            }
            if let Some((_, tx)) = queue.pop_front() {
                if let Err(e) = sim.submit(tx) {
                    eprintln!("\n[!] FATAL: {e}");
                    eprintln!("{}", sim.controller().debug_info());
                    process::exit(1);
                }
            }
        }

        if let Err(e) = sim.tick_gpu() {
            eprintln!("\n[!] FATAL at GPU cycle {now}: {e}");
            sim.controller().stats().print_sections(stats);
            process::exit(1);
        }

        for bus in &buses {
            while let Some(reply) = sim.take_reply(*bus) {
                delivered += 1;
                if replies {
                    println!("{:>10}  {reply}", sim.gpu_cycle());
                }
            }
        }

        if queues.values().all(VecDeque::is_empty) && sim.controller().is_idle() {
            break;
        }
    }

    println!(
        "[*] Finished at GPU cycle {} (memory cycle {}), {delivered} read replies",
        sim.gpu_cycle(),
        sim.memory_cycle()
    );
    if !sim.controller().is_idle() {
        println!("[!] Cycle limit reached with work outstanding");
    }
    sim.controller().stats().print_sections(stats);
}
