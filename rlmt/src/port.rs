//! Per-port state and bookkeeping.
//!
//! A `Port` holds everything RLMT tracks about one physical MAC/PHY: the
//! state machine position, the carrier and readiness flags, the three
//! single-shot timers and the receive-side observations the selection
//! algorithm consumes.
//!
//! Transitions that touch cross-port state (net counters, active-port
//! selection) live in [`crate::instance`]; this module only owns what a
//! single port can decide by itself.

use crate::timer::Timer;
use crate::types::{BridgeId, MacAddress, PortNum, PortState};

/// Counters kept per port, reported to management
#[derive(Debug, Clone, Copy, Default)]
pub struct PortStats {
    /// Probes transmitted
    pub probes_tx: u64,
    /// Peer probes received
    pub probes_rx: u64,
    /// Times the port was declared down by the health check
    pub health_failures: u64,
    /// Own probes seen looped back
    pub loopbacks: u64,
}

/// One physical port under RLMT supervision
#[derive(Debug, Clone, Copy)]
pub struct Port {
    /// Port index on the adapter
    pub num: PortNum,
    /// This port's MAC address
    pub mac: MacAddress,
    /// State machine position
    pub state: PortState,
    /// Carrier present on the physical link
    pub link_up: bool,
    /// Driver readiness: false only after the settle timer confirmed stability
    pub port_down: bool,
    /// Autonegotiation finished successfully
    pub autoneg_ok: bool,
    /// Failed the receive health check and has not recovered yet
    pub suspect_rx: bool,
    /// Duplicate-detection nonce, regenerated at RLMT start
    pub nonce: u32,
    /// Timestamp of the last broadcast received on this port
    pub bc_timestamp: u64,
    /// Timestamp of the last frame of any kind received on this port
    pub last_rx: u64,
    /// When the port entered GoingUp (for selection rules 5/6)
    pub going_up_since: u64,
    /// Root bridge reported on this port in the current segmentation window
    pub root_id: Option<BridgeId>,
    /// Settle timer: GoingUp -> Up
    pub up_timer: Timer,
    /// No-receive watchdog
    pub down_rx_timer: Timer,
    /// Line-check answer deadline
    pub down_tx_timer: Timer,
    /// Counters
    pub stats: PortStats,
}

impl Port {
    /// A port in its pre-start state.
    pub const fn new(num: PortNum, mac: MacAddress) -> Self {
        Self {
            num,
            mac,
            state: PortState::Init,
            link_up: false,
            port_down: true,
            autoneg_ok: false,
            suspect_rx: false,
            nonce: 0,
            bc_timestamp: 0,
            last_rx: 0,
            going_up_since: 0,
            root_id: None,
            up_timer: Timer::new(),
            down_rx_timer: Timer::new(),
            down_tx_timer: Timer::new(),
            stats: PortStats {
                probes_tx: 0,
                probes_rx: 0,
                health_failures: 0,
                loopbacks: 0,
            },
        }
    }

    /// Is this port usable for traffic right now?
    pub fn is_up(&self) -> bool {
        self.state == PortState::Up
    }

    /// Stop every timer this port owns.
    ///
    /// Called on any transition that invalidates their meaning; a timer must
    /// never outlive the state that armed it.
    pub fn stop_all_timers(&mut self) {
        self.up_timer.stop();
        self.down_rx_timer.stop();
        self.down_tx_timer.stop();
    }

    /// Record a received frame for the health check and selection rules.
    pub fn note_rx(&mut self, now: u64, broadcast: bool) {
        self.last_rx = now;
        if broadcast {
            self.bc_timestamp = now;
        }
        // Any receive proves the line; call off a pending down verdict.
        self.suspect_rx = false;
        self.down_tx_timer.stop();
    }

    /// Reset per-start fields while keeping identity (num, mac).
    pub fn reset(&mut self) {
        self.state = PortState::Init;
        self.link_up = false;
        self.port_down = true;
        self.suspect_rx = false;
        self.bc_timestamp = 0;
        self.last_rx = 0;
        self.going_up_since = 0;
        self.root_id = None;
        self.stop_all_timers();
    }
}
