//! Unicast and multicast address filtering
//!
//! The engine never programs filter registers directly; it talks to an
//! [`AddressFilter`] and calls [`AddressFilter::update_hardware_filters`]
//! after every change, before traffic resumes. [`SoftFilter`] is the
//! software implementation used for tests and for chips whose filter is
//! managed elsewhere.

use redlink_rlmt::MacAddress;

/// Multicast slots per port
pub const MAX_MULTICAST: usize = 16;

/// Per-port address filter state
pub trait AddressFilter {
    /// Drop every non-permanent multicast entry of `port`.
    fn clear_multicast(&mut self, port: usize);

    /// Add one multicast address. Permanent entries (the link supervisor's
    /// own group) survive `clear_multicast`. Returns false when the filter
    /// is full.
    fn add_multicast(&mut self, port: usize, addr: MacAddress, permanent: bool) -> bool;

    /// Replace the unicast address traffic is accepted on.
    fn override_unicast(&mut self, port: usize, addr: MacAddress);

    /// Exchange the unicast addresses of two ports (active-port switch).
    fn swap(&mut self, a: usize, b: usize);

    /// Push the accumulated state to hardware. Called after every change,
    /// before traffic resumes.
    fn update_hardware_filters(&mut self, port: usize);
}

#[derive(Debug, Clone, Copy)]
struct McEntry {
    addr: MacAddress,
    permanent: bool,
}

#[derive(Debug, Clone, Copy)]
struct PortFilter {
    unicast: MacAddress,
    multicast: [Option<McEntry>; MAX_MULTICAST],
    /// Bumped by `update_hardware_filters`; tests assert on it
    updates: u32,
}

impl PortFilter {
    const fn new() -> Self {
        Self {
            unicast: MacAddress::ZERO,
            multicast: [None; MAX_MULTICAST],
            updates: 0,
        }
    }
}

/// Software filter state, one entry set per port
pub struct SoftFilter {
    ports: [PortFilter; 2],
}

impl SoftFilter {
    pub const fn new() -> Self {
        Self {
            ports: [PortFilter::new(), PortFilter::new()],
        }
    }

    /// Current unicast address of `port`.
    pub fn unicast(&self, port: usize) -> MacAddress {
        self.ports[port].unicast
    }

    /// Number of programmed multicast entries of `port`.
    pub fn multicast_count(&self, port: usize) -> usize {
        self.ports[port].multicast.iter().flatten().count()
    }

    pub fn has_multicast(&self, port: usize, addr: MacAddress) -> bool {
        self.ports[port]
            .multicast
            .iter()
            .flatten()
            .any(|e| e.addr == addr)
    }

    /// How often hardware state was pushed for `port`.
    pub fn update_count(&self, port: usize) -> u32 {
        self.ports[port].updates
    }
}

impl Default for SoftFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressFilter for SoftFilter {
    fn clear_multicast(&mut self, port: usize) {
        for slot in self.ports[port].multicast.iter_mut() {
            if !matches!(slot, Some(e) if e.permanent) {
                *slot = None;
            }
        }
    }

    fn add_multicast(&mut self, port: usize, addr: MacAddress, permanent: bool) -> bool {
        let filter = &mut self.ports[port];
        if filter
            .multicast
            .iter()
            .flatten()
            .any(|e| e.addr == addr)
        {
            return true;
        }
        for slot in filter.multicast.iter_mut() {
            if slot.is_none() {
                *slot = Some(McEntry { addr, permanent });
                return true;
            }
        }
        false
    }

    fn override_unicast(&mut self, port: usize, addr: MacAddress) {
        self.ports[port].unicast = addr;
    }

    fn swap(&mut self, a: usize, b: usize) {
        let tmp = self.ports[a].unicast;
        self.ports[a].unicast = self.ports[b].unicast;
        self.ports[b].unicast = tmp;
    }

    fn update_hardware_filters(&mut self, port: usize) {
        self.ports[port].updates += 1;
    }
}
