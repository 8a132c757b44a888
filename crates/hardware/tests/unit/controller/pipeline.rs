//! # Channel Pipeline Tests
//!
//! Writes, reads, masked writes and preloads that travel through the request
//! buffer, the channel queues and the schedulers.

use std::sync::atomic::Ordering;

use gpumc_core::MemoryController;
use gpumc_core::config::{BankSelection, Config, PagePolicy};
use gpumc_core::scheduler::ChannelScheduler;
use gpumc_core::transaction::{MemCommand, MemoryTransaction, RequestSlot, RequestState};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{COLOR0, TEX0, TestContext, pattern, small_config};
use crate::common::mocks::GatedScheduler;

// ══════════════════════════════════════════════════════════
// 1. Writes and reads
// ══════════════════════════════════════════════════════════

#[test]
fn write_is_split_across_both_channels() {
    let mut ctx = TestContext::new();
    let data = pattern(64, 1);
    ctx.write(COLOR0, 0x1000, &data);

    let mc = ctx.controller();
    assert_eq!(mc.stats().chunks_dispatched, 2);
    assert_eq!(mc.stats().chunks_completed, 2);
    assert_eq!(mc.free_write_buffers(), 16);
    assert_eq!(mc.requests().free_count(), 32);
    assert_eq!(mc.peek_gpu(0x1000, 64).unwrap(), data);
    assert!(ctx.sim.take_reply(COLOR0).is_none());
}

#[test]
fn read_returns_the_written_bytes() {
    let mut ctx = TestContext::new();
    let data = pattern(64, 5);
    ctx.write(COLOR0, 0x1000, &data);

    let reply = ctx.read(COLOR0, 0x1000, 64);
    assert_eq!(reply.command(), MemCommand::ReadData);
    assert_eq!(reply.size(), 64);
    assert_eq!(reply.payload().to_vec(), data);

    let mc = ctx.controller();
    for channel in 0..2 {
        let bytes = mc.stats().channels[&(COLOR0, channel)];
        assert_eq!((bytes.read, bytes.write), (32, 32));
    }
    assert_eq!(mc.free_read_buffers(), 16);
    assert_eq!(mc.stats().buses[&COLOR0].replies, 1);
}

#[test]
fn unwritten_memory_reads_as_zero() {
    let mut ctx = TestContext::new();
    let reply = ctx.read(TEX0, 0x4000, 32);
    assert_eq!(reply.payload().to_vec(), vec![0; 32]);
}

#[test]
fn masked_write_keeps_unselected_words() {
    let mut ctx = TestContext::new();
    ctx.preload(COLOR0, 0x2000, &[0xFF; 64]);

    let data = pattern(64, 3);
    let mask: Vec<u32> = (0..16).map(|w| if w % 2 == 0 { u32::MAX } else { 0 }).collect();
    ctx.masked_write(COLOR0, 0x2000, &data, mask);

    let expected: Vec<u8> = (0..64)
        .map(|i| if (i / 4) % 2 == 0 { data[i] } else { 0xFF })
        .collect();
    assert_eq!(ctx.controller().peek_gpu(0x2000, 64).unwrap(), expected);
    assert_eq!(ctx.read(COLOR0, 0x2000, 64).payload().to_vec(), expected);
}

// ══════════════════════════════════════════════════════════
// 2. Preload
// ══════════════════════════════════════════════════════════

#[test]
fn preload_is_idempotent_and_takes_no_request_slot() {
    let mut ctx = TestContext::new();
    let data = pattern(64, 11);
    ctx.preload(COLOR0, 0x3000, &data);
    let first = ctx.controller().peek_gpu(0x3000, 64).unwrap();
    ctx.preload(COLOR0, 0x3000, &data);

    let mc = ctx.controller();
    assert_eq!(first, data);
    assert_eq!(mc.peek_gpu(0x3000, 64).unwrap(), first);
    assert_eq!(mc.requests().free_count(), 32);
    assert_eq!(mc.stats().buses[&COLOR0].preloads, 2);
    assert_eq!(mc.stats().chunks_dispatched, 0);
    assert!(mc.is_idle());
}

#[test]
fn masked_preload_merges_into_memory() {
    let mut ctx = TestContext::new();
    ctx.preload(COLOR0, 0, &[0x11; 32]);
    ctx.issue(MemoryTransaction::preload(COLOR0, 0, vec![0x22; 32], Some(vec![0, u32::MAX, 0, 0, 0, 0, 0, 0])));
    ctx.run(1);

    let mut expected = vec![0x11; 32];
    expected[4..8].fill(0x22);
    assert_eq!(ctx.controller().peek_gpu(0, 32).unwrap(), expected);
}

// ══════════════════════════════════════════════════════════
// 3. Queue organisation
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::shared_queue(|_: &mut Config| {})]
#[case::per_bank_round_robin(|c: &mut Config| c.channel_queues.per_bank = true)]
#[case::per_bank_oldest_first(|c: &mut Config| {
    c.channel_queues.per_bank = true;
    c.channel_queues.bank_selection = BankSelection::OldestFirst;
})]
#[case::close_page(|c: &mut Config| c.scheduler.page_policy = PagePolicy::Close)]
#[case::per_bank_scheduler_state(|c: &mut Config| c.scheduler.per_bank_state = true)]
fn round_trip_under_every_queue_layout(#[case] tweak: fn(&mut Config)) {
    let mut config = small_config();
    tweak(&mut config);
    let mut ctx = TestContext::with_config(config);

    let a = pattern(64, 21);
    let b = pattern(64, 42);
    ctx.write(COLOR0, 0x0, &a);
    ctx.write(COLOR0, 0x440, &b);

    assert_eq!(ctx.read(TEX0, 0x0, 64).payload().to_vec(), a);
    assert_eq!(ctx.read(TEX0, 0x440, 64).payload().to_vec(), b);
    assert_eq!(ctx.controller().stats().chunks_completed, 8);
}

// ══════════════════════════════════════════════════════════
// 4. Completion
// ══════════════════════════════════════════════════════════

#[test]
fn request_completes_only_when_every_chunk_is_back() {
    let config = small_config();
    let row_size = config.memory.row_size;
    let (open, _) = GatedScheduler::new(row_size, true);
    let (gated, gate) = GatedScheduler::new(row_size, false);
    let schedulers: Vec<Box<dyn ChannelScheduler>> = vec![Box::new(open), Box::new(gated)];
    let mut ctx = TestContext::with_controller(MemoryController::with_schedulers(config, schedulers).unwrap());

    let data = pattern(64, 7);
    ctx.preload(COLOR0, 0x1000, &data);
    ctx.issue(MemoryTransaction::read_request(COLOR0, 0x1000, 64, 1));
    ctx.run(20);

    let request = ctx.controller().requests().get(RequestSlot(0)).unwrap();
    assert_eq!(request.state(), RequestState::InMemory);
    assert_eq!(request.counter(), 1);
    assert_eq!(ctx.controller().service_queue_len(), 0);
    assert!(ctx.sim.take_reply(COLOR0).is_none());

    gate.store(true, Ordering::SeqCst);
    ctx.settle();
    let reply = ctx.sim.take_reply(COLOR0).unwrap();
    assert_eq!(reply.id(), 1);
    assert_eq!(reply.payload().to_vec(), data);
}
