//! Packet and fragment pools
//!
//! Every buffer the engine ever touches is pre-allocated: a fixed slab of
//! [`Packet`] records, a fixed slab of [`Fragment`] records and four queues
//! threading through the packet slab:
//!
//! - `free`: available for allocation
//! - `waiting`: accepted for transmit, no ring/table slot yet
//! - `working_tx`: handed to hardware for transmit
//! - `working_rx`: handed to hardware as receive buffers
//!
//! A packet is always on exactly one queue, so the sum of the four queue
//! lengths is constant. An empty free queue on the transmit path is
//! backpressure (`None`), never an error.
//!
//! [`PacketPool`] methods assume the caller already holds the owning port's
//! lock; [`LockedPool`] wraps the same pool in a `spin::Mutex` for callers
//! outside that fast path.

pub mod packet;
pub mod queues;

pub use packet::{Fragment, Packet, NIL, POOL_FRAGMENTS, POOL_PACKETS};
pub use queues::{IndexQueue, Linked};

use spin::{Mutex, MutexGuard};

/// The four packet queues plus the fragment free list
pub struct PacketPool {
    packets: [Packet; POOL_PACKETS],
    fragments: [Fragment; POOL_FRAGMENTS],
    /// Packets available for allocation
    pub free: IndexQueue,
    /// Transmit packets waiting for a hardware slot
    pub waiting: IndexQueue,
    /// Packets owned by hardware for transmit
    pub working_tx: IndexQueue,
    /// Buffers owned by hardware for receive
    pub working_rx: IndexQueue,
    frag_free: IndexQueue,
}

impl PacketPool {
    /// A pool with every packet and fragment on its free list.
    pub fn new() -> Self {
        let mut pool = Self {
            packets: [Packet::empty(); POOL_PACKETS],
            fragments: [Fragment::empty(); POOL_FRAGMENTS],
            free: IndexQueue::new(),
            waiting: IndexQueue::new(),
            working_tx: IndexQueue::new(),
            working_rx: IndexQueue::new(),
            frag_free: IndexQueue::new(),
        };
        for i in 0..POOL_PACKETS as u16 {
            pool.free.push_back(&mut pool.packets, i);
        }
        for i in 0..POOL_FRAGMENTS as u16 {
            pool.frag_free.push_back(&mut pool.fragments, i);
        }
        pool
    }

    pub fn packet(&self, idx: u16) -> &Packet {
        &self.packets[idx as usize]
    }

    pub fn packet_mut(&mut self, idx: u16) -> &mut Packet {
        &mut self.packets[idx as usize]
    }

    pub fn fragment(&self, idx: u16) -> &Fragment {
        &self.fragments[idx as usize]
    }

    /// Take a packet off the free queue. `None` is backpressure.
    pub fn alloc(&mut self) -> Option<u16> {
        let idx = self.free.pop_front(&mut self.packets)?;
        self.packets[idx as usize] = Packet {
            next: NIL,
            ..Packet::empty()
        };
        Some(idx)
    }

    /// Attach one fragment to `pkt`. On exhaustion the caller is expected
    /// to release the whole packet.
    pub fn add_fragment(&mut self, pkt: u16, phys: u64, len: u16) -> Option<u16> {
        let frag = self.frag_free.pop_front(&mut self.fragments)?;
        self.fragments[frag as usize] = Fragment {
            phys,
            len,
            next: NIL,
        };

        let p = &mut self.packets[pkt as usize];
        if p.frag_head == NIL {
            p.frag_head = frag;
        } else {
            let mut cur = p.frag_head;
            while self.fragments[cur as usize].next != NIL {
                cur = self.fragments[cur as usize].next;
            }
            self.fragments[cur as usize].next = frag;
        }
        let p = &mut self.packets[pkt as usize];
        p.frag_count += 1;
        p.len += len;
        Some(frag)
    }

    /// Return a packet and all its fragments to the free lists.
    ///
    /// The caller must have removed it from whichever queue held it.
    pub fn release(&mut self, pkt: u16) {
        let mut frag = self.packets[pkt as usize].frag_head;
        while frag != NIL {
            let next = self.fragments[frag as usize].next;
            self.frag_free.push_back(&mut self.fragments, frag);
            frag = next;
        }
        self.packets[pkt as usize] = Packet::empty();
        self.free.push_back(&mut self.packets, pkt);
    }

    /// Pop the oldest packet from one of the non-free queues.
    pub fn pop_waiting(&mut self) -> Option<u16> {
        self.waiting.pop_front(&mut self.packets)
    }

    pub fn pop_working_tx(&mut self) -> Option<u16> {
        self.working_tx.pop_front(&mut self.packets)
    }

    pub fn pop_working_rx(&mut self) -> Option<u16> {
        self.working_rx.pop_front(&mut self.packets)
    }

    /// Queue a packet at the back of one of the non-free queues.
    pub fn push_waiting(&mut self, pkt: u16) {
        self.waiting.push_back(&mut self.packets, pkt);
    }

    /// Put a packet back at the front of the waiting queue (slot race lost).
    pub fn unpush_waiting(&mut self, pkt: u16) {
        self.waiting.push_front(&mut self.packets, pkt);
    }

    pub fn push_working_tx(&mut self, pkt: u16) {
        self.working_tx.push_back(&mut self.packets, pkt);
    }

    pub fn push_working_rx(&mut self, pkt: u16) {
        self.working_rx.push_back(&mut self.packets, pkt);
    }

    /// Move every waiting packet to the back of working TX in one splice.
    pub fn waiting_to_working_tx(&mut self) {
        let mut waiting = self.waiting;
        self.working_tx.append(&mut self.packets, &mut waiting);
        self.waiting = waiting;
    }

    /// Packets accounted for across all four queues.
    pub fn total_tracked(&self) -> usize {
        self.free.len() + self.waiting.len() + self.working_tx.len() + self.working_rx.len()
    }

    pub fn free_fragments(&self) -> usize {
        self.frag_free.len()
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`PacketPool`] behind its own spinlock.
///
/// [`AdapterContext`](crate::context::AdapterContext) keeps its pools inside
/// the per-port lock and never needs this wrapper; it exists for embedders
/// driving a standalone pool (a software loopback queue, a diagnostic
/// injector) without that surrounding structure.
pub struct LockedPool {
    inner: Mutex<PacketPool>,
}

impl LockedPool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PacketPool::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, PacketPool> {
        self.inner.lock()
    }

    pub fn alloc(&self) -> Option<u16> {
        self.inner.lock().alloc()
    }

    pub fn release(&self, pkt: u16) {
        self.inner.lock().release(pkt)
    }

    pub fn push_waiting(&self, pkt: u16) {
        self.inner.lock().push_waiting(pkt)
    }
}

impl Default for LockedPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = PacketPool::new();
        for _ in 0..POOL_PACKETS {
            assert!(pool.alloc().is_some());
        }
        assert_eq!(pool.alloc(), None);
    }

    #[test]
    fn test_conservation_across_moves() {
        let mut pool = PacketPool::new();
        assert_eq!(pool.total_tracked(), POOL_PACKETS);

        // Walk packets through the whole transmit lifecycle.
        for _ in 0..10 {
            let pkt = pool.alloc().unwrap();
            pool.add_fragment(pkt, 0x10_0000, 1514).unwrap();
            pool.push_waiting(pkt);
        }
        pool.waiting_to_working_tx();
        assert_eq!(pool.total_tracked(), POOL_PACKETS);

        while let Some(pkt) = pool.pop_working_tx() {
            pool.release(pkt);
        }
        assert_eq!(pool.total_tracked(), POOL_PACKETS);
        assert_eq!(pool.free.len(), POOL_PACKETS);
        assert_eq!(pool.free_fragments(), POOL_FRAGMENTS);
    }

    #[test]
    fn test_release_returns_fragment_chain() {
        let mut pool = PacketPool::new();
        let pkt = pool.alloc().unwrap();
        pool.add_fragment(pkt, 0x1000, 512).unwrap();
        pool.add_fragment(pkt, 0x2000, 512).unwrap();
        pool.add_fragment(pkt, 0x3000, 490).unwrap();
        assert_eq!(pool.packet(pkt).frag_count, 3);
        assert_eq!(pool.packet(pkt).len, 1514);
        assert_eq!(pool.free_fragments(), POOL_FRAGMENTS - 3);

        pool.release(pkt);
        assert_eq!(pool.free_fragments(), POOL_FRAGMENTS);
    }

    #[test]
    fn test_unpush_waiting_restores_order() {
        let mut pool = PacketPool::new();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.push_waiting(a);
        pool.push_waiting(b);

        let got = pool.pop_waiting().unwrap();
        assert_eq!(got, a);
        pool.unpush_waiting(got);
        assert_eq!(pool.pop_waiting(), Some(a));
        assert_eq!(pool.pop_waiting(), Some(b));
    }

    #[test]
    fn test_locked_pool_round_trip() {
        let pool = LockedPool::new();
        let pkt = pool.alloc().unwrap();
        {
            let mut inner = pool.lock();
            inner.add_fragment(pkt, 0x4000, 64).unwrap();
            inner.push_waiting(pkt);
        }
        let pkt2 = pool.lock().pop_waiting().unwrap();
        assert_eq!(pkt2, pkt);
        pool.release(pkt2);
        assert_eq!(pool.lock().total_tracked(), POOL_PACKETS);
    }
}
