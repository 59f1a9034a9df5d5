//! Packet and fragment records
//!
//! Both live in fixed arrays inside the pool and link to each other by
//! index, never by pointer, so the whole pool is `Copy`-free, movable and
//! trivially shareable with a lock around it.

/// Sentinel index meaning "no element"
pub const NIL: u16 = u16::MAX;

/// Number of packets per pool
pub const POOL_PACKETS: usize = 64;

/// Number of fragments per pool
pub const POOL_FRAGMENTS: usize = 128;

/// One scatter/gather piece of a packet
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    /// Bus address of this piece
    pub phys: u64,
    /// Length in bytes
    pub len: u16,
    /// Next fragment of the same packet, or free-list link
    pub next: u16,
}

impl Fragment {
    pub const fn empty() -> Self {
        Self {
            phys: 0,
            len: 0,
            next: NIL,
        }
    }
}

/// One packet in flight through the engine
#[derive(Debug, Clone, Copy)]
pub struct Packet {
    /// Total frame length
    pub len: u16,
    /// First fragment, or [`NIL`]
    pub frag_head: u16,
    /// Number of fragments
    pub frag_count: u8,
    /// For the list-element path: table index one past this packet's last
    /// element, so a TxDone report frees every packet up to it
    pub next_le: u16,
    /// Queue link
    pub next: u16,
}

impl Packet {
    pub const fn empty() -> Self {
        Self {
            len: 0,
            frag_head: NIL,
            frag_count: 0,
            next_le: 0,
            next: NIL,
        }
    }
}
