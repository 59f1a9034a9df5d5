//! Full-stack tests of the descriptor-ring adapter: attach, transmit
//! round trip with backpressure, receive delivery, link failover and the
//! fatal error path, all against the register-file hardware model.

mod common;

use common::{dma_mem, eth_frame, DmaMem, MockHw, MockSink, MAC_A, MAC_B};

use dma_pool::{DmaArena, MemoryRegion};
use redlink_engine::context::{BUF_SIZE, MAX_PORTS};
use redlink_engine::hw::{
    IRQ_HW_ERROR, IRQ_LINK_PORT0, IRQ_RX_PORT0, IRQ_RX_PORT1, IRQ_TX_PORT0,
    LINK_STATUS_ANEG_DONE, LINK_STATUS_UP, REG_HW_ERR, REG_IMR, REG_ISR, REG_LINK_STATUS_BASE,
};
use redlink_engine::pool::POOL_PACKETS;
use redlink_engine::ring::descriptor::{CTRL_LEN_MASK, CTRL_OWN};
use redlink_engine::ring::{Descriptor, DESC_SIZE};
use redlink_engine::{
    handle_interrupt, AdapterConfig, AdapterContext, AdapterState, ChipGeneration, EngineError,
    IsrOutcome, RingCommand, RingId, SoftFilter, TxStatus,
};
use redlink_rlmt::types::PORT_UP_SETTLE_MS;

/// A station elsewhere on the segment.
const PEER: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x99];

const RING_SIZE: u16 = 4;
const REGION_SIZE: usize = 512 * 1024;

type Ctx = AdapterContext<MockHw, MockSink, SoftFilter>;

/// Where attach put each area, recomputed by replaying the carve order on
/// a shadow arena over the same region.
struct Layout {
    tx_ring: [MemoryRegion; MAX_PORTS],
    rx_ring: [MemoryRegion; MAX_PORTS],
}

fn layout(region: MemoryRegion) -> Layout {
    let mut arena = DmaArena::new(region).unwrap();
    let mut tx_ring = [MemoryRegion::new(0, 0); MAX_PORTS];
    let mut rx_ring = [MemoryRegion::new(0, 0); MAX_PORTS];
    for port in 0..MAX_PORTS {
        tx_ring[port] = arena.carve_ring(RING_SIZE as usize, DESC_SIZE).unwrap();
        rx_ring[port] = arena.carve_ring(RING_SIZE as usize, DESC_SIZE).unwrap();
        arena.carve_buffers(POOL_PACKETS, BUF_SIZE).unwrap();
        arena.carve_buffers(RING_SIZE as usize, BUF_SIZE).unwrap();
    }
    Layout { tx_ring, rx_ring }
}

fn setup() -> (DmaMem, MockHw, MockSink, Ctx) {
    let mem = dma_mem(REGION_SIZE);
    let hw = MockHw::default();
    let sink = MockSink::default();
    let config = AdapterConfig::new(ChipGeneration::Yukon, 2, [MAC_A, MAC_B])
        .with_ring_sizes(RING_SIZE, RING_SIZE);
    let ctx = unsafe {
        AdapterContext::attach(config, mem.region, hw.clone(), SoftFilter::new(), sink.clone())
    }
    .unwrap();
    (mem, hw, sink, ctx)
}

/// Bring one port's link up and run time forward past the settle window.
fn bring_up(ctx: &Ctx, port: u8, now: u64) -> u64 {
    ctx.link_event(port, true, now);
    let settled = now + PORT_UP_SETTLE_MS + 100;
    ctx.timer_tick(settled);
    settled
}

fn desc_at(region: MemoryRegion, slot: u16) -> *mut Descriptor {
    (region.base + slot as usize * DESC_SIZE) as *mut Descriptor
}

/// Hardware model: complete one descriptor, optionally rewriting its
/// length field (RX).
fn hw_complete(region: MemoryRegion, slot: u16, len: Option<u16>) {
    unsafe {
        let p = desc_at(region, slot);
        let mut d = core::ptr::read_volatile(p);
        d.control &= !CTRL_OWN;
        if let Some(len) = len {
            d.control = (d.control & !CTRL_LEN_MASK) | len as u32;
        }
        core::ptr::write_volatile(p, d);
    }
}

#[test]
fn test_attach_starts_masked_then_start_opens_interrupts() {
    let (_mem, hw, _sink, ctx) = setup();
    assert_eq!(ctx.state(), AdapterState::Attached);
    assert_eq!(hw.reg(REG_IMR), 0);

    ctx.start(0).unwrap();
    assert_eq!(ctx.state(), AdapterState::Running);
    assert_ne!(hw.reg(REG_IMR), 0);

    let commands = hw.commands();
    for port in 0..2 {
        assert!(commands.contains(&(RingId::rx(port), RingCommand::Start)));
        assert!(commands.contains(&(RingId::tx(port), RingCommand::Start)));
    }
}

#[test]
fn test_submit_rejected_before_start() {
    let (_mem, _hw, _sink, ctx) = setup();
    let frame = eth_frame(PEER, *MAC_A.as_bytes(), 60);
    assert_eq!(
        ctx.submit_for_transmit(0, &frame),
        Err(EngineError::NotRunning)
    );
}

#[test]
fn test_net_up_reported_after_settle() {
    let (_mem, _hw, sink, ctx) = setup();
    ctx.start(0).unwrap();
    assert!(sink.link_reports().is_empty());

    bring_up(&ctx, 0, 1_000);
    assert_eq!(ctx.active_port(), Some(0));
    assert_eq!(sink.link_reports(), vec![true]);
}

#[test]
fn test_tx_round_trip_with_backpressure() {
    let (mem, hw, _sink, ctx) = setup();
    let layout = layout(mem.region);
    ctx.start(0).unwrap();
    bring_up(&ctx, 0, 1_000);

    let frame = eth_frame(PEER, *MAC_A.as_bytes(), 60);
    for _ in 0..RING_SIZE {
        assert_eq!(ctx.submit_for_transmit(0, &frame), Ok(TxStatus::Accepted));
    }
    // Ring full: the fifth submission backs off without an error.
    assert_eq!(
        ctx.submit_for_transmit(0, &frame),
        Ok(TxStatus::Backpressure)
    );

    // Hardware sends all four and the completion interrupt fires.
    for slot in 0..RING_SIZE {
        hw_complete(layout.tx_ring[0], slot, None);
    }
    hw.set_reg(REG_ISR, IRQ_TX_PORT0);
    assert_eq!(handle_interrupt(&ctx, 5_000), IsrOutcome::Serviced);
    // The acknowledge cleared the level-triggered source.
    assert_eq!(hw.reg(REG_ISR), 0);

    // All four slots reclaimed: the ring takes a full burst again.
    for _ in 0..RING_SIZE {
        assert_eq!(ctx.submit_for_transmit(0, &frame), Ok(TxStatus::Accepted));
    }
}

#[test]
fn test_rx_frame_delivered_upward() {
    let (mem, hw, sink, ctx) = setup();
    let layout = layout(mem.region);
    ctx.start(0).unwrap();
    bring_up(&ctx, 0, 1_000);

    // Hardware model: frame lands in the first posted RX buffer.
    let frame = eth_frame(*MAC_A.as_bytes(), PEER, 72);
    unsafe {
        let d = core::ptr::read_volatile(desc_at(layout.rx_ring[0], 0));
        let buf = ((d.addr_hi as u64) << 32 | d.addr_lo as u64) as *mut u8;
        core::ptr::copy_nonoverlapping(frame.as_ptr(), buf, frame.len());
    }
    hw_complete(layout.rx_ring[0], 0, Some(frame.len() as u16));

    hw.set_reg(REG_ISR, IRQ_RX_PORT0);
    assert_eq!(handle_interrupt(&ctx, 5_000), IsrOutcome::Serviced);

    let delivered = sink.frames();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, 0);
    assert_eq!(delivered[0].1, frame);
}

#[test]
fn test_rx_on_standby_port_not_delivered() {
    let (mem, hw, sink, ctx) = setup();
    let layout = layout(mem.region);
    ctx.start(0).unwrap();
    let t = bring_up(&ctx, 0, 1_000);
    let t = bring_up(&ctx, 1, t);
    assert_eq!(ctx.active_port(), Some(0));

    let frame = eth_frame(*MAC_B.as_bytes(), PEER, 60);
    unsafe {
        let d = core::ptr::read_volatile(desc_at(layout.rx_ring[1], 0));
        let buf = ((d.addr_hi as u64) << 32 | d.addr_lo as u64) as *mut u8;
        core::ptr::copy_nonoverlapping(frame.as_ptr(), buf, frame.len());
    }
    hw_complete(layout.rx_ring[1], 0, Some(frame.len() as u16));

    hw.set_reg(REG_ISR, IRQ_RX_PORT1);
    assert_eq!(handle_interrupt(&ctx, t + 500), IsrOutcome::Serviced);
    assert!(sink.frames().is_empty());
}

#[test]
fn test_link_loss_fails_over_to_standby() {
    let (_mem, hw, _sink, ctx) = setup();
    ctx.start(0).unwrap();
    hw.set_reg(
        REG_LINK_STATUS_BASE,
        LINK_STATUS_UP | LINK_STATUS_ANEG_DONE,
    );
    hw.set_reg(
        REG_LINK_STATUS_BASE + 4,
        LINK_STATUS_UP | LINK_STATUS_ANEG_DONE,
    );
    let t = bring_up(&ctx, 0, 1_000);
    let t = bring_up(&ctx, 1, t);
    assert_eq!(ctx.active_port(), Some(0));
    hw.clear_commands();

    // Carrier drops on the active port; the interrupt carries the change.
    hw.set_reg(REG_LINK_STATUS_BASE, 0);
    hw.set_reg(REG_ISR, IRQ_LINK_PORT0);
    assert_eq!(handle_interrupt(&ctx, t + 1_000), IsrOutcome::Serviced);

    assert_eq!(ctx.active_port(), Some(1));
    // Outgoing port lost carrier, so the switch is hard: the new active
    // port's queues restart.
    let commands = hw.commands();
    assert!(commands.contains(&(RingId::rx(1), RingCommand::Stop)));
    assert!(commands.contains(&(RingId::rx(1), RingCommand::Start)));
}

#[test]
fn test_fatal_error_masks_and_fails() {
    let (_mem, hw, sink, ctx) = setup();
    ctx.start(0).unwrap();
    bring_up(&ctx, 0, 1_000);

    hw.set_reg(REG_ISR, IRQ_HW_ERROR);
    hw.set_reg(REG_HW_ERR, 0x0000_BEEF);
    assert_eq!(handle_interrupt(&ctx, 5_000), IsrOutcome::Fatal);

    assert_eq!(ctx.state(), AdapterState::Failed);
    assert_eq!(hw.reg(REG_IMR), 0);
    assert_eq!(sink.link_reports().last(), Some(&false));

    // Dead adapter: no traffic, no further interrupt claims.
    let frame = eth_frame(PEER, *MAC_A.as_bytes(), 60);
    assert_eq!(
        ctx.submit_for_transmit(0, &frame),
        Err(EngineError::NotRunning)
    );
    assert_eq!(handle_interrupt(&ctx, 6_000), IsrOutcome::NotOurs);
}

#[test]
fn test_zero_isr_is_not_ours() {
    let (_mem, hw, _sink, ctx) = setup();
    ctx.start(0).unwrap();
    hw.set_reg(REG_ISR, 0);
    assert_eq!(handle_interrupt(&ctx, 1_000), IsrOutcome::NotOurs);
}

#[test]
fn test_oversized_frame_rejected() {
    let (_mem, _hw, _sink, ctx) = setup();
    ctx.start(0).unwrap();
    let frame = eth_frame(PEER, *MAC_A.as_bytes(), 1600);
    assert_eq!(
        ctx.submit_for_transmit(0, &frame),
        Err(EngineError::FrameTooLarge)
    );
}
