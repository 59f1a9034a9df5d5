//! Interrupt dispatcher
//!
//! One call per hardware interrupt, five steps:
//!
//! 1. Read the source register; zero means shared-line noise. Mask.
//! 2. Check the fatal path: latched hardware-error bits kill the adapter.
//! 3. Fast loops: TX completions and RX frames per port, repeated while
//!    the level-triggered sources re-assert, with a pass bound.
//! 4. Special sources (link changes, timer) become events and are drained
//!    under the slow-path lock.
//! 5. One final unconditional RX drain closes the race with frames that
//!    landed after the last check, then interrupts reopen.
//!
//! The dispatcher itself holds no lock across steps; each service call
//! takes and releases what it needs in the documented order.

use crate::addr::AddressFilter;
use crate::context::{AdapterContext, AdapterState, FrameSink};
use crate::event::{Event, EventCode};
use crate::hw::{
    irq_link_bit, irq_rx_bit, irq_tx_bit, HardwareIo, IRQ_FAST_MASK, IRQ_HW_ERROR, IRQ_TIMER,
    LINK_STATUS_ANEG_DONE, LINK_STATUS_UP,
};
use crate::{log_error, log_warn};

/// Passes over the fast sources before giving up and re-enabling the
/// interrupt (the next assertion picks up the remainder)
const MAX_SERVICE_PASSES: usize = 8;

/// What one interrupt amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsrOutcome {
    /// Source register was zero; interrupt belongs to another device
    NotOurs,
    /// Work done, interrupts re-enabled
    Serviced,
    /// Unrecoverable error; adapter failed, interrupts stay masked
    Fatal,
}

/// Handle one hardware interrupt.
pub fn handle_interrupt<H, S, F>(ctx: &AdapterContext<H, S, F>, now: u64) -> IsrOutcome
where
    H: HardwareIo,
    S: FrameSink,
    F: AddressFilter,
{
    // Step 1: claim or reject the interrupt.
    let isr = ctx.read_isr();
    if isr == 0 {
        return IsrOutcome::NotOurs;
    }
    if ctx.state() == AdapterState::Failed {
        ctx.mask_irqs();
        return IsrOutcome::NotOurs;
    }
    ctx.mask_irqs();

    // Step 2: fatal path first; nothing else matters if the adapter died.
    if isr & IRQ_HW_ERROR != 0 {
        let detail = ctx.hw_error_detail();
        if detail != 0 {
            log_error!("hardware error latched", detail);
            ctx.enter_failed(detail);
            return IsrOutcome::Fatal;
        }
        log_warn!("hardware error bit without detail", isr);
    }

    // Step 3: fast loops. The sources are level-triggered, so re-read
    // after each pass and keep going while work re-asserts.
    let mut pending = isr & IRQ_FAST_MASK;
    let mut passes = 0;
    while pending != 0 && passes < MAX_SERVICE_PASSES {
        passes += 1;
        if ctx.chip().uses_list_elements() {
            ctx.drain_status(now);
        }
        for port in 0..ctx.num_ports() as u8 {
            if pending & irq_tx_bit(port as usize) != 0 {
                ctx.service_tx(port);
            }
            if pending & irq_rx_bit(port as usize) != 0 {
                ctx.service_rx(port, now);
            }
        }
        pending = ctx.read_isr() & IRQ_FAST_MASK;
    }
    if pending != 0 {
        log_warn!("fast sources still pending after bounded service", pending);
    }

    // Step 4: special sources, deferred into events and drained under the
    // slow-path lock. Link bits only say "changed"; the current state
    // comes from the status register.
    for port in 0..ctx.num_ports() as u8 {
        if isr & irq_link_bit(port as usize) != 0 {
            let status = ctx.link_status(port);
            ctx.set_autoneg(port, status & LINK_STATUS_ANEG_DONE != 0);
            let code = if status & LINK_STATUS_UP != 0 {
                EventCode::LinkUp
            } else {
                EventCode::LinkDown
            };
            ctx.post_event(Event::new(code, port, 0));
        }
    }
    if isr & IRQ_TIMER != 0 {
        ctx.post_event(Event::new(EventCode::Timer, 0, 0));
    }
    ctx.process_events(now);

    // Step 5: a frame may have landed between the last RX pass and here;
    // drain once more before reopening interrupts.
    if ctx.chip().uses_list_elements() {
        ctx.drain_status(now);
    }
    for port in 0..ctx.num_ports() as u8 {
        ctx.service_rx(port, now);
    }
    ctx.unmask_irqs();

    IsrOutcome::Serviced
}
