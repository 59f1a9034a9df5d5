//! First-generation descriptor ring
//!
//! A circular array of [`Descriptor`] slots inside the DMA region. Software
//! produces at `tail`, hardware consumes in order and clears the ownership
//! bit, software reclaims at `head`. Slots never move; only the ownership
//! bit and the attached buffer index cycle.
//!
//! The same type serves both directions: TX posts filled buffers and
//! reclaims them empty, RX posts empty buffers and reclaims them filled.

use core::ptr;

use dma_pool::{MemoryRegion, DESC_ALIGN};

use crate::error::{EngineError, Result};
use crate::ring::descriptor::{
    Descriptor, CTRL_EOF, CTRL_LEN_MASK, CTRL_OWN, CTRL_SOF, CTRL_USED, DESC_SIZE,
};

/// A buffer handed to the ring for one descriptor slot
#[derive(Debug, Clone, Copy)]
pub struct BufferRef {
    /// Bus address of the buffer
    pub addr: u64,
    /// Usable length in bytes
    pub len: u16,
    /// Pool index, returned verbatim on reclaim
    pub cookie: u16,
}

/// A buffer returned by the ring after hardware finished with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimed {
    /// Pool index from the matching [`BufferRef`]
    pub cookie: u16,
    /// Length reported by hardware (actual frame length on RX)
    pub len: u16,
    /// Start-of-frame flag as hardware left it
    pub sof: bool,
    /// End-of-frame flag as hardware left it
    pub eof: bool,
}

impl Reclaimed {
    /// A whole frame in one buffer. Anything else on RX is malformed and
    /// gets discarded by the service layer.
    pub const fn is_complete_frame(&self) -> bool {
        self.sof && self.eof
    }
}

/// One descriptor ring
pub struct DescRing {
    base: *mut Descriptor,
    count: u16,
    /// Next slot to reclaim (oldest outstanding)
    head: u16,
    /// Next slot to post
    tail: u16,
    /// Slots with no buffer attached
    free: u16,
}

// The raw base pointer targets the DMA region, which the owning context
// keeps alive and never aliases across rings.
unsafe impl Send for DescRing {}

impl DescRing {
    /// Lay out and initialize a ring of `count` descriptors in `region`.
    ///
    /// Every slot starts software-owned and linked to its successor, the
    /// last one back to slot 0.
    ///
    /// # Safety
    ///
    /// `region` must be valid, CPU-addressable memory for the lifetime of
    /// the ring, and nothing else may write to it except the device.
    pub unsafe fn setup(region: MemoryRegion, count: u16) -> Result<Self> {
        if count == 0 || region.size < count as usize * DESC_SIZE {
            return Err(EngineError::BadRingSize);
        }
        if region.base == 0 || region.base % DESC_ALIGN != 0 {
            return Err(EngineError::Memory(dma_pool::DmaError::InvalidRegion));
        }

        let base = region.base as *mut Descriptor;
        for i in 0..count {
            let next = if i + 1 == count { 0 } else { i + 1 };
            ptr::write_volatile(base.add(i as usize), Descriptor::empty(next));
        }

        Ok(Self {
            base,
            count,
            head: 0,
            tail: 0,
            free: count,
        })
    }

    /// Total slot count.
    pub const fn capacity(&self) -> u16 {
        self.count
    }

    /// Slots available for posting.
    pub const fn free_slots(&self) -> u16 {
        self.free
    }

    /// Slots currently holding a buffer.
    pub const fn in_flight(&self) -> u16 {
        self.count - self.free
    }

    /// Raw pointer to one descriptor slot, for hardware models and
    /// diagnostics. Slot contents change under hardware ownership.
    pub fn descriptor_ptr(&self, idx: u16) -> *mut Descriptor {
        debug_assert!(idx < self.count);
        unsafe { self.base.add(idx as usize) }
    }

    /// Attach a buffer to the next free slot and hand it to hardware.
    ///
    /// The slot gets the buffer address and length, the framing flags and
    /// finally the ownership bit. Returns [`EngineError::RingFull`] when no
    /// slot is free; the caller treats that as backpressure, not an error
    /// worth logging.
    pub fn post_to_hardware(&mut self, buf: BufferRef) -> Result<()> {
        if self.free == 0 {
            return Err(EngineError::RingFull);
        }

        let slot = self.tail;
        let next = unsafe { ptr::read_volatile(self.base.add(slot as usize)) }.next;
        let desc = Descriptor {
            control: CTRL_OWN | CTRL_SOF | CTRL_EOF | CTRL_USED | buf.len as u32,
            addr_lo: buf.addr as u32,
            addr_hi: (buf.addr >> 32) as u32,
            next,
            cookie: buf.cookie,
        };
        unsafe { ptr::write_volatile(self.base.add(slot as usize), desc) };

        self.tail = next;
        self.free -= 1;
        Ok(())
    }

    /// Reclaim buffers hardware has finished with, oldest first.
    ///
    /// The iterator stops at the first slot still owned by hardware or at
    /// the first slot with no buffer attached (ring drained). Completion
    /// order is the posting order; hardware never skips a slot.
    pub fn reclaim_completed(&mut self) -> Reclaim<'_> {
        Reclaim { ring: self }
    }
}

/// Iterator over completed descriptor slots. Each step detaches the slot's
/// buffer and frees the slot.
pub struct Reclaim<'a> {
    ring: &'a mut DescRing,
}

impl Iterator for Reclaim<'_> {
    type Item = Reclaimed;

    fn next(&mut self) -> Option<Reclaimed> {
        let ring = &mut *self.ring;
        if ring.free == ring.count {
            return None;
        }

        let slot = ring.head;
        let desc = unsafe { ptr::read_volatile(ring.base.add(slot as usize)) };
        if desc.hw_owned() || !desc.in_use() {
            return None;
        }

        let out = Reclaimed {
            cookie: desc.cookie,
            len: (desc.control & CTRL_LEN_MASK) as u16,
            sof: desc.control & CTRL_SOF != 0,
            eof: desc.control & CTRL_EOF != 0,
        };

        let mut cleared = desc;
        cleared.control = 0;
        cleared.cookie = 0;
        unsafe { ptr::write_volatile(ring.base.add(slot as usize), cleared) };

        ring.head = desc.next;
        ring.free += 1;
        Some(out)
    }
}
