//! # Admission Tests
//!
//! The per-bus admission state, how it reacts to the request buffer and write
//! buffer reserves, and transactions held on a bus until admitted.

use gpumc_core::common::error::SimError;
use gpumc_core::transaction::{BusId, GpuUnit, MemState, MemoryTransaction};
use pretty_assertions::assert_eq;

use crate::common::harness::{COLOR0, CP, TEX0, TestContext, ZST0, pattern, small_config};

#[test]
fn every_bus_starts_accepting_both() {
    let ctx = TestContext::new();
    for bus in [COLOR0, ZST0, TEX0, CP] {
        assert_eq!(ctx.controller().admission_state(bus), MemState::Both);
    }
    assert_eq!(ctx.controller().admission_state(BusId::new(GpuUnit::TextureUnit, 7)), MemState::None);
}

#[test]
fn write_reserve_limits_buses_to_reads() {
    let mut config = small_config();
    config.buffers.write_buffers = 6;
    let mut ctx = TestContext::with_config(config);

    ctx.issue(MemoryTransaction::write(COLOR0, 0x0, pattern(64, 1), 1));
    ctx.sim.tick_gpu().unwrap();
    assert_eq!(ctx.controller().free_write_buffers(), 5);
    assert_eq!(ctx.controller().admission_state(ZST0), MemState::ReadAccept);

    ctx.issue(MemoryTransaction::write(ZST0, 0x1000, pattern(64, 2), 2));
    ctx.sim.tick_gpu().unwrap();
    assert!(ctx.controller().is_latched(ZST0));

    let err = ctx.sim.submit(MemoryTransaction::write(ZST0, 0x2000, pattern(64, 3), 3)).unwrap_err();
    assert!(matches!(err, SimError::RequestBusOccupied { unit: ZST0 }), "{err:?}");

    ctx.settle();
    assert!(!ctx.controller().is_latched(ZST0));
    assert_eq!(ctx.controller().peek_gpu(0x0, 64).unwrap(), pattern(64, 1));
    assert_eq!(ctx.controller().peek_gpu(0x1000, 64).unwrap(), pattern(64, 2));
    assert_eq!(ctx.controller().admission_state(ZST0), MemState::Both);
}

#[test]
fn reads_still_flow_while_writes_are_held() {
    let mut config = small_config();
    config.buffers.write_buffers = 6;
    let mut ctx = TestContext::with_config(config);

    ctx.issue(MemoryTransaction::write(COLOR0, 0x0, pattern(64, 1), 1));
    ctx.sim.tick_gpu().unwrap();
    ctx.issue(MemoryTransaction::read_request(ZST0, 0x1000, 32, 2));
    ctx.sim.tick_gpu().unwrap();
    assert!(!ctx.controller().is_latched(ZST0));
    assert_eq!(ctx.controller().stats().buses[&ZST0].read_requests, 1);
    ctx.settle();
}

#[test]
fn request_reserve_closes_every_bus() {
    let mut config = small_config();
    config.buffers.request_queue_size = 14;
    let mut ctx = TestContext::with_config(config);

    ctx.issue(MemoryTransaction::read_request(TEX0, 0x0, 32, 1));
    ctx.sim.tick_gpu().unwrap();
    assert_eq!(ctx.controller().requests().free_count(), 13);
    for bus in [COLOR0, ZST0, TEX0, CP] {
        assert_eq!(ctx.controller().admission_state(bus), MemState::None);
    }

    ctx.issue(MemoryTransaction::read_request(COLOR0, 0x40, 32, 2));
    ctx.sim.tick_gpu().unwrap();
    assert!(ctx.controller().is_latched(COLOR0));

    ctx.settle();
    assert_eq!(ctx.controller().admission_state(COLOR0), MemState::Both);
    assert!(ctx.sim.take_reply(TEX0).is_some());
    assert!(ctx.sim.take_reply(COLOR0).is_some());
}

#[test]
fn preload_is_taken_in_any_state() {
    let mut config = small_config();
    config.buffers.request_queue_size = 14;
    let mut ctx = TestContext::with_config(config);

    ctx.issue(MemoryTransaction::read_request(TEX0, 0x0, 32, 1));
    ctx.sim.tick_gpu().unwrap();
    assert_eq!(ctx.controller().admission_state(CP), MemState::None);

    ctx.issue(MemoryTransaction::preload(CP, 0x800, vec![0xAB; 32], None));
    ctx.sim.tick_gpu().unwrap();
    assert!(!ctx.controller().is_latched(CP));
    assert_eq!(ctx.controller().peek_gpu(0x800, 32).unwrap(), vec![0xAB; 32]);
    ctx.settle();
}

#[test]
fn unknown_bus_is_refused() {
    let mut ctx = TestContext::new();
    let bus = BusId::new(GpuUnit::TextureUnit, 5);
    let err = ctx.sim.submit(MemoryTransaction::read_request(bus, 0, 32, 1)).unwrap_err();
    assert!(matches!(err, SimError::UnknownBus { unit } if unit == bus), "{err:?}");
}

#[test]
fn read_data_is_not_a_request() {
    let mut ctx = TestContext::new();
    let reply = MemoryTransaction::reply_to(&MemoryTransaction::read_request(COLOR0, 0, 32, 1));
    let err = ctx.sim.submit(reply).unwrap_err();
    assert!(matches!(err, SimError::UnexpectedCommand { unit: COLOR0, .. }), "{err:?}");
    assert!(!ctx.controller().is_latched(COLOR0));
}
