//! Second-generation list-element tables
//!
//! Instead of self-describing descriptors, the later chips consume a flat
//! table of 8-byte list elements (LEs) driven by a software *put* index and
//! a hardware-reported *done* index. A data transfer is a run of LEs:
//! optionally an ADDR64 element switching the upper address half, then one
//! element per fragment, the last one flagged end-of-packet.
//!
//! Completions do not come back through the table itself; hardware writes
//! them into a separate status table ([`StatusRing`]) that software drains
//! in order.

use core::ptr;

use dma_pool::{MemoryRegion, DESC_ALIGN};

use crate::error::{EngineError, Result};

/// Size of one list element in bytes
pub const LE_SIZE: usize = 8;

// LE opcodes. The top bit is the ownership flag: software sets it when
// handing the element to hardware, hardware sets it on status elements it
// wrote.
pub const OP_OWN: u8 = 0x80;
/// Continuation fragment of a packet
pub const OP_BUFFER: u8 = 0x40;
/// First fragment of a packet
pub const OP_PACKET: u8 = 0x41;
/// Replace the table's upper 32 address bits
pub const OP_ADDR64: u8 = 0x21;
/// Checksum offload parameters for the following packet
pub const OP_TCPSUM: u8 = 0x22;
/// Status: a received frame is complete
pub const OP_RXSTAT: u8 = 0x60;
/// Status: transmit done up to the reported index
pub const OP_TXIDX: u8 = 0x68;

/// Control flags
pub const LE_CTRL_EOP: u8 = 0x80;
/// Queue number mask within the control byte (port * 2 + direction)
pub const LE_CTRL_QUEUE_MASK: u8 = 0x0F;

/// RX status word: frame received without error
pub const RX_STATUS_OK: u32 = 1;

/// Worst-case extra elements one commit may emit before the data element
/// (the ADDR64 switch). Callers add this to their `reserve` count.
pub const ADDR64_OVERHEAD: u16 = 1;

/// Forward distance from `from` to `to` on a ring of `size` slots.
///
/// Both indices must already be reduced modulo `size`; the sum is computed
/// in u32 so arbitrary (non-power-of-two) sizes stay exact.
pub(crate) const fn ring_distance(from: u16, to: u16, size: u16) -> u16 {
    ((to as u32 + size as u32 - from as u32) % size as u32) as u16
}

/// One list element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ListElement {
    /// Buffer address low half, or opcode-specific payload
    pub addr: u32,
    /// Buffer length, or opcode-specific index
    pub len: u16,
    /// EOP flag and queue number
    pub ctrl: u8,
    /// Operation and ownership
    pub opcode: u8,
}

impl ListElement {
    pub const fn zeroed() -> Self {
        Self {
            addr: 0,
            len: 0,
            ctrl: 0,
            opcode: 0,
        }
    }

    pub const fn hw_owned(&self) -> bool {
        self.opcode & OP_OWN != 0
    }
}

/// A transmit or receive list-element table.
///
/// Occupancy is `(put - done) mod size`; the table is full one element
/// early so `put == done` always means empty.
pub struct LeTable {
    base: *mut ListElement,
    size: u16,
    put: u16,
    done: u16,
    /// Upper address half hardware currently applies to this table
    addr_hi: u32,
}

unsafe impl Send for LeTable {}

impl LeTable {
    /// Lay out a table of `size` elements in `region`, all zeroed.
    ///
    /// # Safety
    ///
    /// `region` must be valid, CPU-addressable memory for the lifetime of
    /// the table, shared only with the device.
    pub unsafe fn setup(region: MemoryRegion, size: u16) -> Result<Self> {
        if size < 2 || region.size < size as usize * LE_SIZE {
            return Err(EngineError::BadRingSize);
        }
        if region.base == 0 || region.base % DESC_ALIGN != 0 {
            return Err(EngineError::Memory(dma_pool::DmaError::InvalidRegion));
        }

        let base = region.base as *mut ListElement;
        for i in 0..size {
            ptr::write_volatile(base.add(i as usize), ListElement::zeroed());
        }

        Ok(Self {
            base,
            size,
            put: 0,
            done: 0,
            addr_hi: 0,
        })
    }

    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Elements handed to hardware and not yet completed.
    pub const fn occupancy(&self) -> u16 {
        ring_distance(self.done, self.put, self.size)
    }

    /// Elements still available; capacity is `size - 1` so that
    /// `put == done` is unambiguously empty.
    pub const fn free_count(&self) -> u16 {
        self.size - 1 - self.occupancy()
    }

    /// Current put index, for the hardware doorbell.
    pub const fn put_index(&self) -> u16 {
        self.put
    }

    pub const fn done_index(&self) -> u16 {
        self.done
    }

    /// Raw pointer to one element, for hardware models and diagnostics.
    pub fn element_ptr(&self, idx: u16) -> *mut ListElement {
        debug_assert!(idx < self.size);
        unsafe { self.base.add(idx as usize) }
    }

    /// Check that `count` elements can be committed without wrapping onto
    /// unconsumed ones. Returns the starting put index.
    ///
    /// Callers that may trigger an ADDR64 switch include [`ADDR64_OVERHEAD`]
    /// in `count`.
    pub fn reserve(&self, count: u16) -> Result<u16> {
        if count > self.free_count() {
            return Err(EngineError::TableFull);
        }
        Ok(self.put)
    }

    fn push(&mut self, le: ListElement) -> Result<()> {
        if self.free_count() == 0 {
            return Err(EngineError::TableFull);
        }
        unsafe { ptr::write_volatile(self.base.add(self.put as usize), le) };
        self.put = (self.put + 1) % self.size;
        Ok(())
    }

    /// Commit one data element describing `len` bytes at `addr`.
    ///
    /// If the upper 32 address bits differ from the table's cached value an
    /// ADDR64 element is emitted first and the cache updated; hardware
    /// applies the new upper half to every following element.
    pub fn commit(&mut self, opcode: u8, addr: u64, len: u16, eop: bool) -> Result<()> {
        let hi = (addr >> 32) as u32;
        if hi != self.addr_hi {
            self.push(ListElement {
                addr: hi,
                len: 0,
                ctrl: 0,
                opcode: OP_ADDR64 | OP_OWN,
            })?;
            self.addr_hi = hi;
        }

        self.push(ListElement {
            addr: addr as u32,
            len,
            ctrl: if eop { LE_CTRL_EOP } else { 0 },
            opcode: opcode | OP_OWN,
        })
    }

    /// Record hardware progress up to (excluding) `new_done`.
    ///
    /// The index must lie inside the outstanding window; anything else is a
    /// corrupted status report.
    pub fn mark_done(&mut self, new_done: u16) -> Result<()> {
        if new_done >= self.size {
            return Err(EngineError::BadDoneIndex);
        }
        let advance = ring_distance(self.done, new_done, self.size);
        if advance > self.occupancy() {
            return Err(EngineError::BadDoneIndex);
        }
        self.done = new_done;
        Ok(())
    }
}

// ============================================================================
// Status table
// ============================================================================

/// Decoded status element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Transmit queue of `port` completed up to LE index `done`
    TxDone { port: u8, done: u16 },
    /// One frame of `len` bytes landed in the next posted RX buffer of `port`
    RxFrame { port: u8, len: u16, ok: bool },
    /// Opcode this driver does not know; consumed and reported
    Unknown { opcode: u8 },
}

/// Hardware-to-software status table.
///
/// Hardware writes elements in order with the ownership bit set; software
/// consumes them in order, clearing the bit so the slot can be reused on
/// the next lap.
pub struct StatusRing {
    base: *mut ListElement,
    size: u16,
    next: u16,
}

unsafe impl Send for StatusRing {}

impl StatusRing {
    /// # Safety
    ///
    /// Same contract as [`LeTable::setup`].
    pub unsafe fn setup(region: MemoryRegion, size: u16) -> Result<Self> {
        if size < 2 || region.size < size as usize * LE_SIZE {
            return Err(EngineError::BadRingSize);
        }
        if region.base == 0 || region.base % DESC_ALIGN != 0 {
            return Err(EngineError::Memory(dma_pool::DmaError::InvalidRegion));
        }

        let base = region.base as *mut ListElement;
        for i in 0..size {
            ptr::write_volatile(base.add(i as usize), ListElement::zeroed());
        }

        Ok(Self {
            base,
            size,
            next: 0,
        })
    }

    /// Raw pointer to one element, for hardware models.
    pub fn element_ptr(&self, idx: u16) -> *mut ListElement {
        debug_assert!(idx < self.size);
        unsafe { self.base.add(idx as usize) }
    }

    /// Index hardware will write next.
    pub const fn next_index(&self) -> u16 {
        self.next
    }

    /// Consume the next status element, if hardware has written one.
    pub fn poll(&mut self) -> Option<StatusEvent> {
        let slot = self.next;
        let le = unsafe { ptr::read_volatile(self.base.add(slot as usize)) };
        if !le.hw_owned() {
            return None;
        }

        let port = (le.ctrl & LE_CTRL_QUEUE_MASK) >> 1;
        let event = match le.opcode & !OP_OWN {
            OP_TXIDX => StatusEvent::TxDone { port, done: le.len },
            OP_RXSTAT => StatusEvent::RxFrame {
                port,
                len: le.len,
                ok: le.addr & RX_STATUS_OK != 0,
            },
            other => StatusEvent::Unknown { opcode: other },
        };

        let mut cleared = le;
        cleared.opcode &= !OP_OWN;
        unsafe { ptr::write_volatile(self.base.add(slot as usize), cleared) };
        self.next = (self.next + 1) % self.size;
        Some(event)
    }
}
