//! # Controller Command Tests
//!
//! Register writes from the command processor and their effect on address
//! interleaving.

use gpumc_core::common::error::SimError;
use gpumc_core::config::{Config, InterleavingConfig};
use gpumc_core::transaction::MemoryTransaction;
use gpumc_core::{McCommand, McRegister};
use pretty_assertions::assert_eq;

use crate::common::harness::{COLOR0, TEX0, TestContext, pattern, small_config};

fn dual_config() -> Config {
    let mut config = small_config();
    config.interleaving.second_enabled = true;
    config.interleaving.second = InterleavingConfig::Stride {
        channel_interleaving: 64,
        bank_interleaving: 128,
    };
    config
}

fn set_second_start(ctx: &mut TestContext, value: u32) {
    ctx.sim.submit_command(McCommand::RegisterWrite {
        register: McRegister::SecondInterleavingStart,
        value,
    });
    ctx.run(1);
}

#[test]
fn register_write_moves_the_second_interleaving_start() {
    let mut ctx = TestContext::with_config(dual_config());
    assert_eq!(ctx.controller().second_interleaving_start(), 0);
    set_second_start(&mut ctx, 0x8000);
    assert_eq!(ctx.controller().second_interleaving_start(), 0x8000);
    assert!(ctx.controller().is_idle());
}

#[test]
fn addresses_above_the_start_use_the_second_mapping() {
    let mut ctx = TestContext::with_config(dual_config());
    set_second_start(&mut ctx, 0x8000);

    let data = pattern(64, 8);
    ctx.write(COLOR0, 0x9000, &data);
    let stats = ctx.controller().stats();
    assert_eq!(stats.chunks_completed, 1);
    assert_eq!(stats.channels[&(COLOR0, 0)].write, 64);
    assert!(!stats.channels.contains_key(&(COLOR0, 1)));

    assert_eq!(ctx.read(TEX0, 0x9000, 64).payload().to_vec(), data);
}

#[test]
fn addresses_below_the_start_keep_the_first_mapping() {
    let mut ctx = TestContext::with_config(dual_config());
    set_second_start(&mut ctx, 0x8000);
    ctx.write(COLOR0, 0x1000, &pattern(64, 1));
    assert_eq!(ctx.controller().stats().chunks_completed, 2);
}

#[test]
fn request_straddling_the_start_is_fatal() {
    let mut ctx = TestContext::with_config(dual_config());
    set_second_start(&mut ctx, 0x8000);
    ctx.issue(MemoryTransaction::read_request(TEX0, 0x7FE0, 64, 1));
    let err = ctx.sim.tick_gpu().unwrap_err();
    assert!(
        matches!(err, SimError::InterleavingStraddle { address: 0x7FE0, size: 64, threshold: 0x8000 }),
        "{err:?}"
    );
}

#[test]
fn register_write_without_a_second_mapping_is_harmless() {
    let mut ctx = TestContext::new();
    set_second_start(&mut ctx, 0x4000);
    ctx.write(COLOR0, 0x5000, &pattern(64, 2));
    assert_eq!(ctx.controller().stats().chunks_completed, 2);
}
