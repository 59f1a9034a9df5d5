//! Hardware descriptor layout
//!
//! One descriptor describes one buffer to the BMU. The layout is fixed by
//! hardware: the control word, the 64-bit buffer address split into two
//! 32-bit halves, and the link to the next descriptor. The final u16 is
//! never read by hardware; software parks the buffer index there so reclaim
//! can hand the buffer back without a side table.

/// Size of one descriptor in bytes
pub const DESC_SIZE: usize = 16;

/// Hardware owns the descriptor (set on post, cleared by hardware on completion)
pub const CTRL_OWN: u32 = 1 << 31;
/// Start of frame
pub const CTRL_SOF: u32 = 1 << 30;
/// End of frame
pub const CTRL_EOF: u32 = 1 << 29;
/// Software-only marker: a buffer is attached to this slot
pub const CTRL_USED: u32 = 1 << 28;
/// Request hardware checksum insertion (TX) / validation (RX)
pub const CTRL_CSUM: u32 = 1 << 27;
/// Buffer length field
pub const CTRL_LEN_MASK: u32 = 0xFFFF;

/// One BMU descriptor.
///
/// Lives inside the DMA region, never on the Rust heap or stack; all access
/// goes through volatile reads/writes because hardware mutates the control
/// word concurrently.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Descriptor {
    /// Ownership, framing flags and buffer length
    pub control: u32,
    /// Buffer bus address, low half
    pub addr_lo: u32,
    /// Buffer bus address, high half
    pub addr_hi: u32,
    /// Ring index of the next descriptor
    pub next: u16,
    /// Software-only: pool index of the attached buffer
    pub cookie: u16,
}

impl Descriptor {
    /// An empty, software-owned descriptor linking to `next`.
    pub const fn empty(next: u16) -> Self {
        Self {
            control: 0,
            addr_lo: 0,
            addr_hi: 0,
            next,
            cookie: 0,
        }
    }

    /// Length field of the control word.
    pub const fn len(&self) -> u16 {
        (self.control & CTRL_LEN_MASK) as u16
    }

    /// Does hardware still own this slot?
    pub const fn hw_owned(&self) -> bool {
        self.control & CTRL_OWN != 0
    }

    /// Is a buffer attached?
    pub const fn in_use(&self) -> bool {
        self.control & CTRL_USED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_hardware_sized() {
        assert_eq!(core::mem::size_of::<Descriptor>(), DESC_SIZE);
    }

    #[test]
    fn test_control_field_decode() {
        let mut desc = Descriptor::empty(3);
        desc.control = CTRL_OWN | CTRL_SOF | CTRL_EOF | CTRL_USED | 1514;
        assert!(desc.hw_owned());
        assert!(desc.in_use());
        assert_eq!(desc.len(), 1514);
        assert_eq!(desc.next, 3);
    }
}
