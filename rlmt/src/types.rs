//! Core types for redundant link management

use core::fmt;

/// Maximum number of physical ports per adapter.
pub const MAX_PORTS: usize = 2;

/// Periodic health-check interval (milliseconds).
pub const CHECK_INTERVAL_MS: u64 = 1000;

/// Settle time before a link-up port is declared usable (milliseconds).
pub const PORT_UP_SETTLE_MS: u64 = 2500;

/// A port with no receive traffic for this long is put under suspicion
/// (milliseconds).
pub const DOWN_RX_TIMEOUT_MS: u64 = 4500;

/// Deadline for a suspect port to answer the directed line-check probe
/// (milliseconds).
pub const DOWN_TX_TIMEOUT_MS: u64 = 1000;

/// Segmentation-check observation window (milliseconds).
pub const SEG_WINDOW_MS: u64 = CHECK_INTERVAL_MS;

/// Broadcast timestamps closer together than this are an ambiguous tie
/// for the selection algorithm (~1/128 second, milliseconds).
pub const BC_TIE_WINDOW_MS: u64 = 8;

/// MAC address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// Zero MAC address
    pub const ZERO: Self = Self([0x00; 6]);

    /// RLMT probe multicast address
    pub const RLMT_MCAST: Self = Self([0x01, 0x00, 0x5A, 0x52, 0x4C, 0x4D]);

    /// Spanning-tree bridge group address
    pub const BRIDGE_MCAST: Self = Self([0x01, 0x80, 0xC2, 0x00, 0x00, 0x00]);

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Check for the all-ones broadcast address
    pub const fn is_broadcast(&self) -> bool {
        self.0[0] == 0xFF
            && self.0[1] == 0xFF
            && self.0[2] == 0xFF
            && self.0[3] == 0xFF
            && self.0[4] == 0xFF
            && self.0[5] == 0xFF
    }

    /// Check the multicast bit
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Physical port index on the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortNum(pub u8);

impl PortNum {
    /// Port A
    pub const A: Self = Self(0);
    /// Port B
    pub const B: Self = Self(1);

    /// Array index
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "A"),
            1 => write!(f, "B"),
            n => write!(f, "{}", n),
        }
    }
}

/// Spanning-tree bridge identifier (priority + MAC, 8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeId(pub [u8; 8]);

impl BridgeId {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}.{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

/// Per-port state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Not started
    Init,
    /// No carrier
    LinkDown,
    /// Carrier present but the port failed its health checks
    Down,
    /// Carrier present, settle timer running
    GoingUp,
    /// Fully usable
    Up,
}

/// Per-net aggregate states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetState {
    /// Not started
    Init,
    /// No port is up
    NetDown,
    /// At least one port is up
    NetUp,
}

/// RLMT operating mode
///
/// Each mode is a superset of the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlmtMode {
    /// Only watch the carrier signal
    CheckLinkState,
    /// Also probe the local port for receive/transmit health
    CheckLocalPort,
    /// Also run the spanning-tree segmentation check
    CheckSegmentation,
}

impl RlmtMode {
    /// Local-port probing active?
    pub const fn checks_local_port(&self) -> bool {
        !matches!(self, RlmtMode::CheckLinkState)
    }

    /// Segmentation checking active?
    pub const fn checks_segmentation(&self) -> bool {
        matches!(self, RlmtMode::CheckSegmentation)
    }
}

/// Preferred-port selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredPort {
    /// No preference, selection decides freely
    #[default]
    Auto,
    /// Pin preference to one port
    Port(PortNum),
}

/// RLMT configuration
///
/// Consumed at start; mode and preference never change while running.
#[derive(Debug, Clone, Copy)]
pub struct RlmtConfig {
    /// Operating mode
    pub mode: RlmtMode,
    /// Preferred port
    pub preferred: PreferredPort,
}

impl RlmtConfig {
    /// Config with automatic port preference
    pub const fn new(mode: RlmtMode) -> Self {
        Self {
            mode,
            preferred: PreferredPort::Auto,
        }
    }

    /// Config with a pinned preferred port
    pub const fn with_preferred(mode: RlmtMode, port: PortNum) -> Self {
        Self {
            mode,
            preferred: PreferredPort::Port(port),
        }
    }

    /// Preferred port, if pinned
    pub const fn preferred_port(&self) -> Option<PortNum> {
        match self.preferred {
            PreferredPort::Auto => None,
            PreferredPort::Port(p) => Some(p),
        }
    }
}

impl Default for RlmtConfig {
    fn default() -> Self {
        Self::new(RlmtMode::CheckLocalPort)
    }
}

/// Random nonce used for duplicate-address detection.
///
/// Seeded from the current time XORed with the port's MAC address bytes,
/// then mixed so two ports of one adapter never collide.
pub fn generate_nonce(now: u64, mac: &MacAddress) -> u32 {
    let mut seed = now ^ ((now >> 17) | (now << 47));
    for (i, b) in mac.0.iter().enumerate() {
        seed ^= (*b as u64) << (8 * (i % 4));
        seed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    (seed >> 16) as u32
}
