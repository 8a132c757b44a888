//! # Statistics Tests
//!
//! Counter updates and the sectioned text report.

use gpumc_core::stats::{McStats, STATS_SECTIONS};
use gpumc_core::transaction::{MemCommand, MemState};
use pretty_assertions::assert_eq;

use crate::common::harness::{COLOR0, TEX0, TestContext, pattern};

const HEADERS: [&str; 4] = [
    "GPU MEMORY CONTROLLER STATISTICS",
    "UNIT BUSES",
    "CHANNEL TRAFFIC",
    "SYSTEM MEMORY",
];

#[test]
fn counters_accumulate_per_bus() {
    let mut stats = McStats::default();
    stats.record_request(COLOR0, MemCommand::WriteData, 64);
    stats.record_request(TEX0, MemCommand::ReadRequest, 32);
    stats.record_request(TEX0, MemCommand::ReadRequest, 32);
    stats.record_request(TEX0, MemCommand::PreloadData, 16);
    stats.record_reply(TEX0, 10);
    stats.record_reply(TEX0, 20);
    stats.record_state(TEX0, MemState::ReadAccept);
    stats.record_state(TEX0, MemState::Both);

    let tex = stats.buses[&TEX0];
    assert_eq!((tex.read_requests, tex.read_bytes, tex.preloads), (2, 64, 1));
    assert_eq!(tex.avg_reply_latency(), 15.0);
    assert_eq!((tex.read_accept_cycles, tex.write_accept_cycles), (2, 1));

    let totals = stats.totals();
    assert_eq!(totals.write_bytes, 64);
    assert_eq!(totals.read_requests + totals.write_requests, 3);
}

#[test]
fn chunks_are_counted_per_channel() {
    let mut stats = McStats::default();
    stats.record_chunk(COLOR0, 1, 32, false);
    stats.record_chunk(COLOR0, 1, 32, true);
    stats.record_chunk(COLOR0, 0, 32, true);
    assert_eq!(stats.chunks_completed, 3);
    assert_eq!(stats.channels[&(COLOR0, 1)].read, 32);
    assert_eq!(stats.channels[&(COLOR0, 1)].write, 32);
    assert_eq!(stats.channels[&(COLOR0, 0)].write, 0);
}

#[test]
fn empty_stats_report_every_section_without_dividing_by_zero() {
    let report = McStats::default().report(&[]);
    for header in HEADERS {
        assert!(report.contains(header), "missing {header}");
    }
    assert!(report.contains("stalls.read              0 (0.00%)"));
    assert_eq!(STATS_SECTIONS.len(), HEADERS.len());
}

#[test]
fn report_prints_only_the_requested_sections() {
    let report = McStats::default().report(&["system".to_string(), "channels".to_string()]);
    assert!(report.contains("SYSTEM MEMORY"));
    assert!(report.contains("CHANNEL TRAFFIC"));
    assert!(!report.contains("UNIT BUSES"));
    assert!(!report.contains("GPU MEMORY CONTROLLER STATISTICS"));
}

#[test]
fn report_after_traffic_names_the_buses() {
    let mut ctx = TestContext::new();
    ctx.write(COLOR0, 0x1000, &pattern(64, 1));
    let _ = ctx.read(TEX0, 0x1000, 64);

    let stats = ctx.controller().stats();
    assert_eq!(stats.chunks_dispatched, 4);
    assert!(stats.avg_request_occupancy() > 0.0);
    let report = stats.report(&["buses".to_string()]);
    assert!(report.contains("ColorWrite[0]"));
    assert!(report.contains("TextureUnit[0]"));
}
