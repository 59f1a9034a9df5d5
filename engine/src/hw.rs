//! Hardware access seam
//!
//! Everything the engine needs from the device is behind [`HardwareIo`]:
//! register access, ring doorbells and the interrupt mask. Production code
//! implements it over MMIO; tests implement it over plain arrays.

/// Interrupt source register
pub const REG_ISR: u32 = 0x0008;
/// Interrupt mask register
pub const REG_IMR: u32 = 0x000C;
/// Hardware error detail register
pub const REG_HW_ERR: u32 = 0x0010;
/// Per-port link status base (one u32 per port)
pub const REG_LINK_STATUS_BASE: u32 = 0x0020;
/// Carrier present bit in the link status register
pub const LINK_STATUS_UP: u32 = 1 << 0;
/// Autonegotiation complete bit in the link status register
pub const LINK_STATUS_ANEG_DONE: u32 = 1 << 1;
/// Per-queue put-index doorbell base (one u32 per ring id)
pub const REG_PUT_IDX_BASE: u32 = 0x0040;

// Interrupt source bits. One RX and one TX completion bit per port,
// one link-change bit per port, plus the slow sources.
pub const IRQ_RX_PORT0: u32 = 1 << 0;
pub const IRQ_TX_PORT0: u32 = 1 << 1;
pub const IRQ_RX_PORT1: u32 = 1 << 2;
pub const IRQ_TX_PORT1: u32 = 1 << 3;
pub const IRQ_LINK_PORT0: u32 = 1 << 4;
pub const IRQ_LINK_PORT1: u32 = 1 << 5;
pub const IRQ_TIMER: u32 = 1 << 6;
pub const IRQ_HW_ERROR: u32 = 1 << 7;

/// Sources handled by the fast per-port loops
pub const IRQ_FAST_MASK: u32 =
    IRQ_RX_PORT0 | IRQ_TX_PORT0 | IRQ_RX_PORT1 | IRQ_TX_PORT1;

/// Sources handled under the slow-path lock
pub const IRQ_SPECIAL_MASK: u32 = IRQ_LINK_PORT0 | IRQ_LINK_PORT1 | IRQ_TIMER | IRQ_HW_ERROR;

/// All sources the driver ever unmasks
pub const IRQ_ALL_MASK: u32 = IRQ_FAST_MASK | IRQ_SPECIAL_MASK;

pub const fn irq_rx_bit(port: usize) -> u32 {
    if port == 0 {
        IRQ_RX_PORT0
    } else {
        IRQ_RX_PORT1
    }
}

pub const fn irq_tx_bit(port: usize) -> u32 {
    if port == 0 {
        IRQ_TX_PORT0
    } else {
        IRQ_TX_PORT1
    }
}

pub const fn irq_link_bit(port: usize) -> u32 {
    if port == 0 {
        IRQ_LINK_PORT0
    } else {
        IRQ_LINK_PORT1
    }
}

/// Queue direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingKind {
    Rx,
    Tx,
}

/// Identifies one hardware queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingId {
    pub port: u8,
    pub kind: RingKind,
}

impl RingId {
    pub const fn rx(port: u8) -> Self {
        Self {
            port,
            kind: RingKind::Rx,
        }
    }

    pub const fn tx(port: u8) -> Self {
        Self {
            port,
            kind: RingKind::Tx,
        }
    }

    /// Flat index used for doorbell register addressing
    pub const fn index(&self) -> u32 {
        let dir = match self.kind {
            RingKind::Rx => 0,
            RingKind::Tx => 1,
        };
        (self.port as u32) * 2 + dir
    }
}

/// Commands accepted by a queue's control doorbell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingCommand {
    /// Start fetching descriptors
    Start,
    /// Stop the queue and abandon fetched descriptors
    Stop,
    /// Acknowledge the queue's completion interrupt
    ClearIrq,
}

/// Register and doorbell access to one adapter.
///
/// Implementations must tolerate calls from interrupt context; nothing here
/// may sleep or allocate.
pub trait HardwareIo {
    /// Read a 32-bit register
    fn read_register(&self, offset: u32) -> u32;

    /// Write a 32-bit register
    fn write_register(&mut self, offset: u32, value: u32);

    /// Issue a control command to one queue
    fn issue_ring_command(&mut self, ring: RingId, cmd: RingCommand);

    /// Tell hardware about new producer work on a queue (put index for
    /// list-element tables, poll request for descriptor rings)
    fn ring_doorbell(&mut self, ring: RingId, put: u16) {
        self.write_register(REG_PUT_IDX_BASE + ring.index() * 4, put as u32);
    }

    /// Mask all interrupt sources
    fn mask_all(&mut self) {
        self.write_register(REG_IMR, 0);
    }

    /// Unmask the driver's interrupt sources
    fn unmask(&mut self, sources: u32) {
        self.write_register(REG_IMR, sources);
    }
}
