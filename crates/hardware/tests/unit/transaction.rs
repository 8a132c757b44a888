//! # Transaction Tests
//!
//! Address space decoding, payload sharing, write masks, trace tags, admission
//! states and the request pool arena.

use gpumc_core::common::addr::{AddressSpace, GpuAddr};
use gpumc_core::common::error::SimError;
use gpumc_core::transaction::memory::masked_copy;
use gpumc_core::transaction::{
    BusId, GpuUnit, MemCommand, MemState, MemoryRequest, MemoryTransaction, Payload, RequestPool,
    RequestSlot, RequestState, TraceTag,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

const BUS: BusId = BusId::new(GpuUnit::TextureUnit, 2);

#[test]
fn top_bit_selects_the_address_space() {
    let gpu = GpuAddr::new(0x1234_5678);
    assert_eq!(gpu.space(), AddressSpace::Gpu);
    assert_eq!(gpu.offset(), 0x1234_5678);

    let sys = GpuAddr::new(0x8000_0040);
    assert_eq!(sys.space(), AddressSpace::System);
    assert_eq!(sys.offset(), 0x40);
    assert_eq!(GpuAddr::in_space(AddressSpace::System, 0x40), sys);
    assert_eq!(sys.to_string(), "0x80000040");
}

#[test]
fn views_share_the_payload() {
    let payload = Payload::new((0..16).collect());
    let view = payload.view(4, 8);
    assert_eq!(view.to_vec(), vec![4, 5, 6, 7, 8, 9, 10, 11]);

    view.with_mut(|b| b[0] = 0xAA);
    assert_eq!(payload.to_vec()[4], 0xAA);
    assert!(view.payload().shares_buffer(&payload));
    assert!(!payload.shares_buffer(&Payload::zeroed(16)));
}

#[test]
fn view_is_clamped_to_the_payload() {
    let payload = Payload::zeroed(8);
    assert_eq!(payload.view(6, 10).len(), 2);
    assert!(payload.view(20, 4).is_empty());
}

#[test]
fn masked_copy_merges_per_byte_lane() {
    let mut dst = vec![0x11; 10];
    let src = vec![0xEE; 10];
    masked_copy(&mut dst, &src, &[0xFFFF_FFFF, 0x0000_FF00, 0x0000_00FF]);
    assert_eq!(dst, vec![0xEE, 0xEE, 0xEE, 0xEE, 0x11, 0xEE, 0x11, 0x11, 0xEE, 0x11]);
}

#[test]
fn reply_shares_the_request_payload_and_extends_the_tag() {
    let read = MemoryTransaction::read_request(BUS, 0x100, 32, 9).with_tag(TraceTag::new(5));
    let reply = MemoryTransaction::reply_to(&read);

    assert_eq!(reply.command(), MemCommand::ReadData);
    assert_eq!(reply.source(), BUS);
    assert_eq!(reply.id(), 9);
    assert_eq!(reply.size(), 32);
    assert!(reply.payload().shares_buffer(read.payload()));
    assert_eq!(reply.tag().unwrap().cookies(), &[5, 9]);
    assert_eq!(reply.tag().unwrap().to_string(), "5:9");
}

#[test]
fn constructors_set_command_and_size() {
    let write = MemoryTransaction::masked_write(BUS, 0x40, vec![1; 8], vec![u32::MAX; 2], 3);
    assert_eq!(write.command(), MemCommand::WriteData);
    assert_eq!(write.size(), 8);
    assert_eq!(write.mask().map(|m| m.len()), Some(2));
    assert!(write.to_string().ends_with("masked"));

    let preload = MemoryTransaction::preload(BUS, 0x8000_0000, vec![0; 4], None);
    assert_eq!(preload.command(), MemCommand::PreloadData);
    assert_eq!(preload.space(), AddressSpace::System);
    assert!(!preload.is_read());
}

#[rstest]
#[case(MemState::None, false, false)]
#[case(MemState::ReadAccept, true, false)]
#[case(MemState::WriteAccept, false, true)]
#[case(MemState::Both, true, true)]
fn admission_state_gates_commands(#[case] state: MemState, #[case] read: bool, #[case] write: bool) {
    assert_eq!(state.accepts(MemCommand::ReadRequest), read);
    assert_eq!(state.accepts(MemCommand::WriteData), write);
    assert!(state.accepts(MemCommand::PreloadData));
    assert!(!state.accepts(MemCommand::ReadData));
}

#[test]
fn request_pool_recycles_slots() {
    let mut pool = RequestPool::new(2);
    let a = pool.allocate(MemoryRequest::new(MemoryTransaction::read_request(BUS, 0, 32, 1), 0)).unwrap();
    let b = pool.allocate(MemoryRequest::new(MemoryTransaction::read_request(BUS, 32, 32, 2), 0)).unwrap();
    assert_eq!((a, b), (RequestSlot(0), RequestSlot(1)));
    assert!(pool.allocate(MemoryRequest::new(MemoryTransaction::read_request(BUS, 64, 32, 3), 0)).is_none());

    assert_eq!(pool.release(a).unwrap().transaction().id(), 1);
    assert_eq!(pool.free_count(), 1);
    assert_eq!(pool.occupied_slots(), vec![1]);
    assert!(matches!(pool.release(a), Err(SimError::FreeSlot { slot: 0 })));
}

#[test]
fn counter_reaches_zero_once_and_then_underflows() {
    let mut request = MemoryRequest::new(MemoryTransaction::read_request(BUS, 0x200, 64, 1), 7);
    assert_eq!(request.state(), RequestState::Ready);
    request.set_counter(2);
    request.set_state(RequestState::InMemory);

    assert_eq!(request.dec_counter().unwrap(), 1);
    assert_eq!(request.dec_counter().unwrap(), 0);
    let err = request.dec_counter().unwrap_err();
    assert!(matches!(err, SimError::CounterUnderflow { address: 0x200, unit: BUS }), "{err:?}");
}
