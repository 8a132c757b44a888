//! # System Memory Path Tests
//!
//! Reads and writes whose address has the system bit set bypass the channels
//! and go through the system FIFO and buses.

use gpumc_core::common::constants::SYSTEM_MEMORY_PATTERN;
use gpumc_core::transaction::MemoryTransaction;
use pretty_assertions::assert_eq;

use crate::common::harness::{COLOR0, SYSTEM_BASE, TEX0, TestContext, pattern};

fn fill_pattern(len: usize) -> Vec<u8> {
    SYSTEM_MEMORY_PATTERN.to_le_bytes().into_iter().cycle().take(len).collect()
}

#[test]
fn system_memory_starts_with_the_fill_pattern() {
    let ctx = TestContext::new();
    let memory = ctx.controller().system_memory();
    assert_eq!(memory.len(), 4096);
    assert_eq!(memory.slice(0, 8).unwrap(), &[0xFE, 0xCA, 0xAD, 0xDE, 0xFE, 0xCA, 0xAD, 0xDE]);
    assert!(memory.slice(4090, 8).is_none());
}

#[test]
fn read_returns_system_memory_contents() {
    let mut ctx = TestContext::new();
    let reply = ctx.read(TEX0, SYSTEM_BASE | 0x100, 32);
    assert_eq!(reply.payload().to_vec(), fill_pattern(32));

    let mc = ctx.controller();
    assert_eq!(mc.stats().system_read_bytes, 32);
    assert_eq!(mc.stats().chunks_dispatched, 0);
    assert_eq!(mc.free_read_buffers(), 16);
}

#[test]
fn reply_waits_for_the_read_latency() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::read_request(TEX0, SYSTEM_BASE, 32, 1));
    // Latency 20 plus four cycles on the system bus.
    ctx.run(20);
    assert!(ctx.sim.take_reply(TEX0).is_none());
    ctx.settle();
    assert!(ctx.sim.take_reply(TEX0).is_some());
}

#[test]
fn write_lands_in_system_memory() {
    let mut ctx = TestContext::new();
    let data = pattern(32, 9);
    ctx.write(COLOR0, SYSTEM_BASE | 0x200, &data);

    let mc = ctx.controller();
    assert_eq!(mc.system_memory().slice(0x200, 32).unwrap(), &data[..]);
    assert_eq!(mc.stats().system_write_bytes, 32);
    assert_eq!(mc.free_write_buffers(), 16);
    assert_eq!(mc.system_requests().free_count(), 32);

    assert_eq!(ctx.read(TEX0, SYSTEM_BASE | 0x200, 32).payload().to_vec(), data);
}

#[test]
fn masked_write_keeps_the_fill_pattern_elsewhere() {
    let mut ctx = TestContext::new();
    let data = vec![0x55; 32];
    let mask: Vec<u32> = (0..8).map(|w| if w < 2 { u32::MAX } else { 0 }).collect();
    ctx.masked_write(COLOR0, SYSTEM_BASE | 0x300, &data, mask);

    let mut expected = fill_pattern(32);
    expected[..8].fill(0x55);
    assert_eq!(ctx.controller().system_memory().slice(0x300, 32).unwrap(), &expected[..]);
}

#[test]
fn system_preload_is_written_at_once() {
    let mut ctx = TestContext::new();
    ctx.preload(COLOR0, SYSTEM_BASE | 0x40, &[7; 16]);
    assert_eq!(ctx.controller().system_memory().slice(0x40, 16).unwrap(), &[7; 16]);
    assert_eq!(ctx.controller().system_requests().free_count(), 32);
}

#[test]
fn gpu_and_system_reads_interleave() {
    let mut ctx = TestContext::new();
    ctx.write(COLOR0, 0x1000, &pattern(64, 4));
    ctx.issue(MemoryTransaction::read_request(TEX0, SYSTEM_BASE | 0x80, 32, 1));
    ctx.issue(MemoryTransaction::read_request(COLOR0, 0x1000, 64, 2));
    ctx.settle();

    assert_eq!(ctx.sim.take_reply(TEX0).unwrap().payload().to_vec(), fill_pattern(32));
    assert_eq!(ctx.sim.take_reply(COLOR0).unwrap().payload().to_vec(), pattern(64, 4));
}
