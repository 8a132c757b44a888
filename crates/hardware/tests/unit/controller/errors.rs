//! # Fatal Error Tests
//!
//! Inconsistencies that stop the controller, how the simulation halts on them,
//! and scheduler misbehaviour injected through scripted schedulers.

use gpumc_core::MemoryController;
use gpumc_core::common::addr::AddressSpace;
use gpumc_core::common::error::SimError;
use gpumc_core::scheduler::{BankState, ChannelScheduler, SchedulerState};
use gpumc_core::splitter::AddressInfo;
use gpumc_core::transaction::{
    ChannelTransaction, CtId, MemCommand, MemoryTransaction, Payload, RequestSlot, RequestState,
};
use pretty_assertions::assert_eq;

use crate::common::harness::{COLOR0, SYSTEM_BASE, TEX0, TestContext, pattern, small_config};
use crate::common::mocks::{MockChunkSource, ScriptedScheduler};

fn scripted(sources: [MockChunkSource; 2]) -> MemoryController {
    let config = small_config();
    let row_size = config.memory.row_size;
    let schedulers: Vec<Box<dyn ChannelScheduler>> = sources
        .into_iter()
        .map(|s| Box::new(ScriptedScheduler::new(s, row_size)) as Box<dyn ChannelScheduler>)
        .collect();
    MemoryController::with_schedulers(config, schedulers).unwrap()
}

fn idle_source(state: BankState) -> MockChunkSource {
    let mut source = MockChunkSource::new();
    source.expect_state().returning(move || SchedulerState::shared(state));
    source.expect_completed().returning(|_| None);
    source
}

fn forged_chunk(channel: u32, slot: usize) -> ChannelTransaction {
    let data = Payload::zeroed(32).view(0, 32);
    ChannelTransaction::read(CtId(99), AddressInfo::new(channel, 0, 0, 0), data, RequestSlot(slot))
}

// ══════════════════════════════════════════════════════════
// 1. Request errors
// ══════════════════════════════════════════════════════════

#[test]
fn unaligned_request_halts_the_simulation() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x1004, 32, 1));

    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(matches!(err, SimError::Unaligned { address: 0x1004, burst_bytes: 32 }), "{err:?}");
    assert!(ctx.sim.is_halted());
    assert!(matches!(ctx.sim.step(), Err(SimError::Halted)));
    assert!(matches!(ctx.sim.tick_gpu(), Err(SimError::Halted)));
}

#[test]
fn oversized_transaction_is_fatal() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::write(COLOR0, 0, pattern(512, 0), 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(
        matches!(err, SimError::TransactionTooLarge { unit: COLOR0, size: 512, max: 256 }),
        "{err:?}"
    );
}

#[test]
fn access_past_gpu_memory_is_fatal() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x1_0000, 32, 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(
        matches!(err, SimError::OutOfRange { space: AddressSpace::Gpu, address: 0x1_0000, size: 32, .. }),
        "{err:?}"
    );
}

#[test]
fn chunks_sharing_a_channel_are_fatal() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x0, 128, 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(matches!(err, SimError::ChannelCollision { address: 0, size: 128, .. }), "{err:?}");
}

#[test]
fn empty_gpu_read_is_fatal() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x1000, 0, 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(
        matches!(
            err,
            SimError::EmptyTransaction { unit: TEX0, command: MemCommand::ReadRequest, address: 0x1000 }
        ),
        "{err:?}"
    );
    assert_eq!(ctx.controller().free_read_buffers(), 16);
    assert_eq!(ctx.controller().requests().free_count(), 32);
}

#[test]
fn empty_system_write_is_fatal() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::write(COLOR0, SYSTEM_BASE | 0x40, Vec::new(), 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(
        matches!(
            err,
            SimError::EmptyTransaction { unit: COLOR0, command: MemCommand::WriteData, address: 0x40 }
        ),
        "{err:?}"
    );
    assert_eq!(ctx.controller().free_write_buffers(), 16);
}

// ══════════════════════════════════════════════════════════
// 2. Scheduler misbehaviour
// ══════════════════════════════════════════════════════════

#[test]
fn chunk_returned_by_the_wrong_channel_is_fatal() {
    let mut ch0 = MockChunkSource::new();
    ch0.expect_state().returning(|| SchedulerState::shared(BankState::AcceptBoth));
    let forged = forged_chunk(1, 0);
    ch0.expect_completed().times(1).return_once(move |_| Some(forged));
    let mut mc = scripted([ch0, idle_source(BankState::AcceptBoth)]);

    let err = mc.advance_memory_domain(0).unwrap_err();
    assert!(matches!(err, SimError::WrongChannel { expected: 1, found: 0 }), "{err:?}");
}

#[test]
fn chunk_for_a_free_slot_is_fatal() {
    let mut ch0 = MockChunkSource::new();
    ch0.expect_state().returning(|| SchedulerState::shared(BankState::AcceptBoth));
    let forged = forged_chunk(0, 5);
    ch0.expect_completed().times(1).return_once(move |_| Some(forged));
    let mut mc = scripted([ch0, idle_source(BankState::AcceptBoth)]);

    let err = mc.advance_memory_domain(0).unwrap_err();
    assert!(matches!(err, SimError::FreeSlot { slot: 5 }), "{err:?}");
}

#[test]
fn refusing_scheduler_stalls_dispatch() {
    let mc = scripted([idle_source(BankState::AcceptNone), idle_source(BankState::AcceptNone)]);
    let mut ctx = TestContext::with_controller(mc);
    ctx.issue(MemoryTransaction::write(COLOR0, 0x1000, pattern(64, 1), 1));
    ctx.run(10);

    let mc = ctx.controller();
    assert!(mc.stats().write_stall_cycles > 0);
    assert_eq!(mc.stats().read_stall_cycles, 0);
    assert_eq!(mc.stats().chunks_dispatched, 0);
    assert_eq!(mc.scheduler(0).unwrap().pending(), 0);
    assert_eq!(mc.channel_queue_len(0), 1);
    assert_eq!(mc.channel_queue_len(1), 1);
    assert!(!mc.is_idle());
}

#[test]
fn read_only_scheduler_takes_reads_and_stalls_writes() {
    let mc = scripted([idle_source(BankState::AcceptRead), idle_source(BankState::AcceptRead)]);
    let mut ctx = TestContext::with_controller(mc);
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x0, 64, 1));
    ctx.run(1);
    ctx.issue(MemoryTransaction::write(COLOR0, 0x1000, pattern(64, 1), 2));
    ctx.run(10);

    let mc = ctx.controller();
    assert_eq!(mc.stats().chunks_dispatched, 2);
    assert_eq!(mc.scheduler(0).unwrap().pending(), 1);
    assert!(mc.stats().write_stall_cycles > 0);
}

#[test]
fn chunk_completed_twice_halts_the_run() {
    let mut ch0 = MockChunkSource::new();
    ch0.expect_state().returning(|| SchedulerState::shared(BankState::AcceptBoth));
    let mut returned = 0;
    ch0.expect_completed().returning(move |cycle| {
        if cycle < 10 || returned == 2 {
            return None;
        }
        returned += 1;
        Some(forged_chunk(0, 0))
    });
    let mc = scripted([ch0, idle_source(BankState::AcceptBoth)]);
    let mut ctx = TestContext::with_controller(mc);
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x0, 32, 1));

    // The first return retires the only chunk and leaves the request Ready;
    // the second finds it no longer in memory.
    let err = (0..100)
        .find_map(|_| ctx.sim.step().err())
        .expect("second completion halts the run");
    assert!(
        matches!(
            err,
            SimError::UnexpectedState { slot: 0, state: RequestState::Ready, stage: "chunk completion" }
        ),
        "{err:?}"
    );
    assert!(ctx.sim.is_halted());
    let mc = ctx.controller();
    assert_eq!(mc.stats().chunks_dispatched, 1);
    assert_eq!(mc.stats().chunks_completed, 1);
}
