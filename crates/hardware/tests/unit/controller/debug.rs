//! # Debug Dump Tests

use gpumc_core::controller::range_list;
use gpumc_core::transaction::MemoryTransaction;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{COLOR0, TestContext, pattern};

#[rstest]
#[case::empty(&[], "{ (0) }")]
#[case::single(&[7], "{ 7 (1) }")]
#[case::run(&[0, 1, 2], "{ [0..2] (3) }")]
#[case::mixed(&[0, 2, 3, 4, 5, 9], "{ 0, [2..5], 9 (6) }")]
fn range_list_folds_runs(#[case] values: &[usize], #[case] expected: &str) {
    assert_eq!(range_list(values), expected);
}

#[test]
fn dump_shows_requests_buses_and_channels() {
    let mut ctx = TestContext::new();
    ctx.issue(MemoryTransaction::write(COLOR0, 0x1000, pattern(64, 1), 1));
    ctx.sim.tick_gpu().unwrap();

    let info = ctx.controller().debug_info();
    assert!(info.starts_with("memory controller @ gpu cycle 0 / memory cycle 0"), "{info}");
    assert!(info.contains("gpu requests    { 0 (1) }"), "{info}");
    assert!(info.contains("[0] transmitting counter=2"), "{info}");
    assert!(info.contains("ColorWrite[0] state=both W.g.1.0"), "{info}");
    assert!(info.contains("channel 0: queues [1]"), "{info}");
    assert!(info.contains("channel 1: queues [1]"), "{info}");
}

#[test]
fn idle_dump_has_no_requests() {
    let ctx = TestContext::new();
    let info = ctx.controller().debug_info();
    assert!(info.contains("gpu requests    { (0) }"));
    assert!(info.contains("read buffers free 16/16  write buffers free 16/16"));
    assert!(info.contains("second interleaving start 0x00000000"));
}
