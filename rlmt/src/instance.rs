//! The RLMT instance: per-port transitions, net aggregation, failover.
//!
//! Event entry points (`link_up`, `link_down`, `rx_frame`, `tick`) mutate the
//! state machine and append [`RlmtAction`] values for the embedding driver to
//! apply. The instance never touches hardware and never blocks; everything is
//! bounded work suitable for the slow-path lock.

use crate::frames::{self, FrameKind, ProbeKind};
use crate::port::Port;
use crate::select::{select_active, PortSnapshot};
use crate::timer::Timer;
use crate::types::{
    generate_nonce, MacAddress, NetState, PortNum, PortState, RlmtConfig, RlmtMode,
    CHECK_INTERVAL_MS, DOWN_RX_TIMEOUT_MS, DOWN_TX_TIMEOUT_MS, MAX_PORTS, PORT_UP_SETTLE_MS,
    SEG_WINDOW_MS,
};

/// Hard or soft failover.
///
/// Chosen solely by whether the outgoing active port still has link: a hard
/// switch fully re-initializes the new port, a soft switch keeps the
/// negotiated link on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Full re-init, previous active port lost its link
    Hard,
    /// Both ports still have link
    Soft,
}

/// Work the embedding driver must perform on RLMT's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlmtAction {
    /// Transmit a multicast alive probe on `port`
    SendProbe {
        /// Transmitting port
        port: PortNum,
    },
    /// Transmit a directed line-check probe to `to` on behalf of `suspect`
    SendLineCheck {
        /// Port to transmit on
        port: PortNum,
        /// Destination address (the suspect port)
        to: MacAddress,
    },
    /// Answer a received line check
    SendLineCheckAck {
        /// Port to transmit on
        port: PortNum,
        /// Requester's address
        to: MacAddress,
    },
    /// Transmit a bridge probe (segmentation check) on `port`
    SendBridgeProbe {
        /// Transmitting port
        port: PortNum,
    },
    /// Move traffic to a new active port
    Switch {
        /// Outgoing active port, if any
        from: Option<PortNum>,
        /// New active port
        to: PortNum,
        /// Hard or soft
        kind: SwitchKind,
    },
    /// First port came up, the net is usable
    NetUp,
    /// Last link went away, the net is dead
    NetDown,
    /// Two up ports see different root bridges (diagnostic only)
    SegmentationDetected,
    /// Another station uses our address with a foreign nonce
    DuplicateMac {
        /// Port that observed the duplicate
        port: PortNum,
    },
    /// Selection found no usable port although a link event triggered it
    ConsistencyError,
}

/// Maximum actions one event can produce.
pub const MAX_ACTIONS: usize = 16;

/// Fixed-capacity action buffer filled by the event entry points.
#[derive(Debug, Clone, Copy)]
pub struct ActionList {
    items: [Option<RlmtAction>; MAX_ACTIONS],
    len: usize,
}

impl ActionList {
    /// Empty list.
    pub const fn new() -> Self {
        Self {
            items: [None; MAX_ACTIONS],
            len: 0,
        }
    }

    /// Append an action. Silently drops on overflow (callers drain per event,
    /// no single event produces more than a handful).
    pub fn push(&mut self, action: RlmtAction) {
        debug_assert!(self.len < MAX_ACTIONS, "action list overflow");
        if self.len < MAX_ACTIONS {
            self.items[self.len] = Some(action);
            self.len += 1;
        }
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// No pending actions?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all actions.
    pub fn clear(&mut self) {
        self.items = [None; MAX_ACTIONS];
        self.len = 0;
    }

    /// Iterate over pending actions.
    pub fn iter(&self) -> impl Iterator<Item = &RlmtAction> {
        self.items[..self.len].iter().filter_map(|a| a.as_ref())
    }

    /// Check for one specific action (test helper, O(n)).
    pub fn contains(&self, action: &RlmtAction) -> bool {
        self.iter().any(|a| a == action)
    }
}

impl Default for ActionList {
    fn default() -> Self {
        Self::new()
    }
}

/// The redundant-link management state machine for one adapter.
pub struct Rlmt {
    config: RlmtConfig,
    ports: [Port; MAX_PORTS],
    num_ports: usize,
    net_state: NetState,
    /// Ports with carrier
    links_up: usize,
    /// Ports in state Up
    ports_up: usize,
    active: Option<PortNum>,
    /// Periodic health check, re-armed after every firing
    check_timer: Timer,
    /// Segmentation observation window
    seg_timer: Timer,
    /// One report per window
    seg_reported: bool,
    running: bool,
}

impl Rlmt {
    /// Create an instance for `macs.len()` ports (at most [`MAX_PORTS`]).
    pub fn new(config: RlmtConfig, macs: &[MacAddress]) -> Self {
        let num_ports = macs.len().min(MAX_PORTS);
        let mut ports = [
            Port::new(PortNum(0), MacAddress::ZERO),
            Port::new(PortNum(1), MacAddress::ZERO),
        ];
        for i in 0..num_ports {
            ports[i] = Port::new(PortNum(i as u8), macs[i]);
        }
        Self {
            config,
            ports,
            num_ports,
            net_state: NetState::Init,
            links_up: 0,
            ports_up: 0,
            active: None,
            check_timer: Timer::new(),
            seg_timer: Timer::new(),
            seg_reported: false,
            running: false,
        }
    }

    /// Start supervision: every port to LinkDown, nonces regenerated,
    /// net to NetDown, periodic check armed.
    pub fn start(&mut self, now: u64, _actions: &mut ActionList) {
        for i in 0..self.num_ports {
            let port = &mut self.ports[i];
            port.reset();
            port.state = PortState::LinkDown;
            port.nonce = generate_nonce(now, &port.mac);
        }
        self.net_state = NetState::NetDown;
        self.links_up = 0;
        self.ports_up = 0;
        self.active = None;
        self.seg_reported = false;
        self.check_timer.start(now, CHECK_INTERVAL_MS);
        self.seg_timer.stop();
        self.running = true;
    }

    /// Stop supervision: every port back to Init, all timers off.
    pub fn stop(&mut self, _actions: &mut ActionList) {
        for i in 0..self.num_ports {
            self.ports[i].reset();
        }
        self.net_state = NetState::Init;
        self.links_up = 0;
        self.ports_up = 0;
        self.active = None;
        self.check_timer.stop();
        self.seg_timer.stop();
        self.running = false;
    }

    /// Hardware reported carrier on `port`.
    pub fn link_up(&mut self, port: PortNum, now: u64, _actions: &mut ActionList) {
        if !self.running || port.index() >= self.num_ports {
            return;
        }
        let p = &mut self.ports[port.index()];
        if p.link_up {
            return;
        }
        p.link_up = true;
        self.links_up += 1;

        match p.state {
            PortState::LinkDown | PortState::Down => {
                // Leaving a down state: stop whatever watched it first.
                p.stop_all_timers();
                p.state = PortState::GoingUp;
                p.going_up_since = now;
                p.up_timer.start(now, PORT_UP_SETTLE_MS);
            }
            _ => {}
        }
    }

    /// Hardware reported loss of carrier on `port`.
    ///
    /// Highest-priority transition: preempts every other state.
    pub fn link_down(&mut self, port: PortNum, now: u64, actions: &mut ActionList) {
        if !self.running || port.index() >= self.num_ports {
            return;
        }
        let p = &mut self.ports[port.index()];
        if !p.link_up && p.state == PortState::LinkDown {
            return;
        }
        let was_up = p.state == PortState::Up;
        if p.link_up {
            p.link_up = false;
            self.links_up -= 1;
        }
        p.stop_all_timers();
        p.state = PortState::LinkDown;
        p.port_down = true;
        p.suspect_rx = false;
        if was_up {
            self.ports_up -= 1;
        }

        if self.links_up == 0 {
            self.active = None;
            if self.net_state == NetState::NetUp {
                self.net_state = NetState::NetDown;
                actions.push(RlmtAction::NetDown);
            }
            return;
        }

        if self.active == Some(port) {
            self.check_switch(now, actions);
        }
    }

    /// Record the autonegotiation outcome for `port`.
    pub fn set_autoneg(&mut self, port: PortNum, ok: bool) {
        if port.index() < self.num_ports {
            self.ports[port.index()].autoneg_ok = ok;
        }
    }

    /// A frame arrived on `port`. Feeds the health check, duplicate-MAC
    /// detection and the segmentation check.
    pub fn rx_frame(&mut self, port: PortNum, frame: &[u8], now: u64, actions: &mut ActionList) {
        if !self.running || port.index() >= self.num_ports {
            return;
        }
        let parsed = match frames::parse(frame) {
            Ok(p) => p,
            Err(_) => return,
        };

        let own_mac = self.ports[port.index()].mac;
        if parsed.sa == own_mac {
            if let FrameKind::Probe { nonce, .. } = parsed.kind {
                let p = &mut self.ports[port.index()];
                if nonce == p.nonce {
                    // Our own probe looped back, expected on bridged setups.
                    p.stats.loopbacks += 1;
                } else {
                    // Same address, foreign nonce: genuine duplicate.
                    actions.push(RlmtAction::DuplicateMac { port });
                }
                return;
            }
        }

        {
            let p = &mut self.ports[port.index()];
            p.note_rx(now, parsed.da.is_broadcast());
            if p.state == PortState::Up && self.config.mode.checks_local_port() {
                // Receive watchdog re-armed by every frame.
                p.down_rx_timer.start(now, DOWN_RX_TIMEOUT_MS);
            }
        }

        match parsed.kind {
            FrameKind::Probe { kind, .. } => match kind {
                ProbeKind::Alive => {
                    self.ports[port.index()].stats.probes_rx += 1;
                }
                ProbeKind::LineCheck => {
                    actions.push(RlmtAction::SendLineCheckAck {
                        port,
                        to: parsed.sa,
                    });
                }
                ProbeKind::LineCheckAck => {
                    // The ack proves the suspect's line; clear its suspicion.
                    for i in 0..self.num_ports {
                        if self.ports[i].mac == parsed.sa {
                            self.ports[i].suspect_rx = false;
                            self.ports[i].down_tx_timer.stop();
                        }
                    }
                }
            },
            FrameKind::Bpdu { root } => {
                if self.seg_timer.is_running() {
                    self.ports[port.index()].root_id = Some(root);
                }
            }
            FrameKind::Other => {}
        }

        // A receive on a recovering Down port restarts its way up.
        let p = &mut self.ports[port.index()];
        if p.state == PortState::Down && p.link_up {
            p.stop_all_timers();
            p.state = PortState::GoingUp;
            p.going_up_since = now;
            p.up_timer.start(now, PORT_UP_SETTLE_MS);
        }
    }

    /// Advance time: fires settle timers, watchdogs, the periodic health
    /// check and the segmentation window.
    pub fn tick(&mut self, now: u64, actions: &mut ActionList) {
        if !self.running {
            return;
        }

        for i in 0..self.num_ports {
            if self.ports[i].up_timer.fire(now) {
                self.port_up(PortNum(i as u8), now, actions);
            }
        }

        for i in 0..self.num_ports {
            if self.ports[i].down_rx_timer.fire(now) {
                self.rx_watchdog_expired(PortNum(i as u8), now, actions);
            }
        }

        for i in 0..self.num_ports {
            if self.ports[i].down_tx_timer.fire(now) {
                self.health_check_failed(PortNum(i as u8), now, actions);
            }
        }

        if self.seg_timer.fire(now) {
            self.close_segmentation_window(actions);
        }

        if self.check_timer.fire(now) {
            self.periodic_check(now, actions);
            self.check_timer.start(now, CHECK_INTERVAL_MS);
        }
    }

    /// Settle timer expired without an intervening link-down: the port is Up.
    fn port_up(&mut self, port: PortNum, now: u64, actions: &mut ActionList) {
        {
            let p = &mut self.ports[port.index()];
            debug_assert_eq!(p.state, PortState::GoingUp);
            p.stop_all_timers();
            p.state = PortState::Up;
            p.port_down = false;
            p.suspect_rx = false;
            p.last_rx = now;
            if self.config.mode.checks_local_port() {
                p.down_rx_timer.start(now, DOWN_RX_TIMEOUT_MS);
            }
        }
        self.ports_up += 1;

        if self.net_state == NetState::NetDown {
            self.net_state = NetState::NetUp;
            actions.push(RlmtAction::NetUp);
        }
        self.check_switch(now, actions);
    }

    /// No receive traffic for a whole watchdog period.
    fn rx_watchdog_expired(&mut self, port: PortNum, now: u64, actions: &mut ActionList) {
        if self.ports[port.index()].state != PortState::Up {
            return;
        }
        self.ports[port.index()].suspect_rx = true;

        // Only a second port can prove the wire; single-port setups stay
        // suspect until traffic returns.
        let helper = (0..self.num_ports)
            .map(|i| PortNum(i as u8))
            .find(|p| *p != port && self.ports[p.index()].is_up());
        if let Some(helper) = helper {
            let suspect_mac = self.ports[port.index()].mac;
            actions.push(RlmtAction::SendLineCheck {
                port: helper,
                to: suspect_mac,
            });
            self.ports[port.index()]
                .down_tx_timer
                .start(now, DOWN_TX_TIMEOUT_MS);
        }

        // Selection may already prefer a healthy port.
        if self.active == Some(port) {
            self.check_switch(now, actions);
        }
    }

    /// The directed line check went unanswered: Up -> Down.
    fn health_check_failed(&mut self, port: PortNum, now: u64, actions: &mut ActionList) {
        {
            let p = &mut self.ports[port.index()];
            if p.state != PortState::Up {
                return;
            }
            p.stop_all_timers();
            p.state = PortState::Down;
            p.port_down = true;
            p.stats.health_failures += 1;
        }
        self.ports_up -= 1;

        if self.active == Some(port) {
            self.check_switch(now, actions);
        }
    }

    /// Periodic work: alive probes and the segmentation check.
    fn periodic_check(&mut self, now: u64, actions: &mut ActionList) {
        if self.config.mode.checks_local_port() {
            for i in 0..self.num_ports {
                if self.ports[i].is_up() {
                    actions.push(RlmtAction::SendProbe {
                        port: PortNum(i as u8),
                    });
                    self.ports[i].stats.probes_tx += 1;
                }
            }
        }

        if self.config.mode.checks_segmentation()
            && self.links_up > 1
            && !self.seg_timer.is_running()
        {
            for i in 0..self.num_ports {
                let p = &mut self.ports[i];
                p.root_id = None;
                if p.is_up() {
                    actions.push(RlmtAction::SendBridgeProbe {
                        port: PortNum(i as u8),
                    });
                }
            }
            self.seg_reported = false;
            self.seg_timer.start(now, SEG_WINDOW_MS);
        }
    }

    /// End of a segmentation window: differing root bridges across up ports
    /// flag segmentation. Diagnostic only, never a switch by itself.
    fn close_segmentation_window(&mut self, actions: &mut ActionList) {
        let mut first_root = None;
        let mut segmented = false;
        for i in 0..self.num_ports {
            let p = &self.ports[i];
            if !p.is_up() {
                continue;
            }
            if let Some(root) = p.root_id {
                match first_root {
                    None => first_root = Some(root),
                    Some(seen) if seen != root => segmented = true,
                    Some(_) => {}
                }
            }
        }
        if segmented && !self.seg_reported {
            self.seg_reported = true;
            actions.push(RlmtAction::SegmentationDetected);
        }
        for i in 0..self.num_ports {
            self.ports[i].root_id = None;
        }
    }

    /// Re-run selection and emit a switch if the winner changed.
    fn check_switch(&mut self, _now: u64, actions: &mut ActionList) {
        let mut snapshots = [PortSnapshot {
            num: PortNum(0),
            state: PortState::Init,
            suspect_rx: false,
            autoneg_ok: false,
            bc_timestamp: 0,
            going_up_since: 0,
        }; MAX_PORTS];
        for i in 0..self.num_ports {
            let p = &self.ports[i];
            snapshots[i] = PortSnapshot {
                num: p.num,
                state: p.state,
                suspect_rx: p.suspect_rx,
                autoneg_ok: p.autoneg_ok,
                bc_timestamp: p.bc_timestamp,
                going_up_since: p.going_up_since,
            };
        }

        let winner = select_active(
            &snapshots[..self.num_ports],
            self.active,
            self.config.preferred_port(),
            self.config.mode,
        );

        match winner {
            Some(to) if self.active != Some(to) => {
                let from = self.active;
                let kind = match from {
                    Some(f) if self.ports[f.index()].link_up => SwitchKind::Soft,
                    _ => SwitchKind::Hard,
                };
                self.active = Some(to);
                actions.push(RlmtAction::Switch { from, to, kind });
            }
            Some(_) => {}
            None => {
                // Unreachable given a link event triggered the call.
                actions.push(RlmtAction::ConsistencyError);
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Currently active port.
    pub fn active(&self) -> Option<PortNum> {
        self.active
    }

    /// Configured operating mode.
    pub fn mode(&self) -> RlmtMode {
        self.config.mode
    }

    /// Aggregate net state.
    pub fn net_state(&self) -> NetState {
        self.net_state
    }

    /// Ports with carrier.
    pub fn links_up(&self) -> usize {
        self.links_up
    }

    /// Ports in state Up.
    pub fn ports_up(&self) -> usize {
        self.ports_up
    }

    /// Per-port view.
    pub fn port(&self, port: PortNum) -> Option<&Port> {
        self.ports.get(port.index()).filter(|_| port.index() < self.num_ports)
    }

    /// Number of supervised ports.
    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// Running?
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{build_bridge_probe, build_probe};
    use crate::types::{BridgeId, RlmtMode};

    const MAC_A: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x00, 0x00, 0x0A]);
    const MAC_B: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x00, 0x00, 0x0B]);

    fn two_port(mode: RlmtMode) -> (Rlmt, ActionList) {
        let config = RlmtConfig::with_preferred(mode, PortNum::A);
        let mut rlmt = Rlmt::new(config, &[MAC_A, MAC_B]);
        let mut actions = ActionList::new();
        rlmt.start(0, &mut actions);
        rlmt.set_autoneg(PortNum::A, true);
        rlmt.set_autoneg(PortNum::B, true);
        (rlmt, actions)
    }

    fn bring_up(rlmt: &mut Rlmt, port: PortNum, now: u64) -> ActionList {
        let mut actions = ActionList::new();
        rlmt.link_up(port, now, &mut actions);
        rlmt.tick(now + PORT_UP_SETTLE_MS, &mut actions);
        actions
    }

    #[test]
    fn test_start_states() {
        let (rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        assert_eq!(rlmt.net_state(), NetState::NetDown);
        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::LinkDown);
        assert_eq!(rlmt.port(PortNum::B).unwrap().state, PortState::LinkDown);
        assert!(rlmt.active().is_none());
    }

    #[test]
    fn test_link_up_starts_settle() {
        let (mut rlmt, mut actions) = two_port(RlmtMode::CheckLocalPort);
        rlmt.link_up(PortNum::A, 100, &mut actions);

        let a = rlmt.port(PortNum::A).unwrap();
        assert_eq!(a.state, PortState::GoingUp);
        assert!(a.up_timer.is_running());
        // Not yet up, net still down.
        assert_eq!(rlmt.net_state(), NetState::NetDown);
    }

    #[test]
    fn test_settle_expiry_brings_port_and_net_up() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        let actions = bring_up(&mut rlmt, PortNum::A, 100);

        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::Up);
        assert_eq!(rlmt.net_state(), NetState::NetUp);
        assert_eq!(rlmt.active(), Some(PortNum::A));
        assert!(actions.contains(&RlmtAction::NetUp));
        assert!(actions.contains(&RlmtAction::Switch {
            from: None,
            to: PortNum::A,
            kind: SwitchKind::Hard,
        }));
    }

    #[test]
    fn test_link_down_preempts_settle() {
        let (mut rlmt, mut actions) = two_port(RlmtMode::CheckLocalPort);
        rlmt.link_up(PortNum::A, 100, &mut actions);
        rlmt.link_down(PortNum::A, 200, &mut actions);

        let a = rlmt.port(PortNum::A).unwrap();
        assert_eq!(a.state, PortState::LinkDown);
        assert!(!a.up_timer.is_running());

        // The settle timer must not fire after the state changed.
        let mut late = ActionList::new();
        rlmt.tick(100 + PORT_UP_SETTLE_MS, &mut late);
        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::LinkDown);
        assert_eq!(rlmt.ports_up(), 0);
    }

    #[test]
    fn test_failover_scenario() {
        // Scenario: A preferred, both down. A up -> active. B up -> no
        // switch. A loses link -> hard switch to B, net stays up.
        // Link-check mode isolates the carrier-driven transitions.
        let (mut rlmt, _) = two_port(RlmtMode::CheckLinkState);

        bring_up(&mut rlmt, PortNum::A, 0);
        assert_eq!(rlmt.active(), Some(PortNum::A));
        assert_eq!(rlmt.net_state(), NetState::NetUp);

        let actions = bring_up(&mut rlmt, PortNum::B, 10_000);
        assert_eq!(rlmt.active(), Some(PortNum::A), "A preferred and healthy");
        assert!(!actions.iter().any(|a| matches!(a, RlmtAction::Switch { .. })));

        let mut actions = ActionList::new();
        rlmt.link_down(PortNum::A, 20_000, &mut actions);
        assert_eq!(rlmt.active(), Some(PortNum::B));
        assert!(actions.contains(&RlmtAction::Switch {
            from: Some(PortNum::A),
            to: PortNum::B,
            kind: SwitchKind::Hard,
        }));
        // LinksUp never reached zero.
        assert_eq!(rlmt.net_state(), NetState::NetUp);
        assert!(!actions.contains(&RlmtAction::NetDown));
    }

    #[test]
    fn test_soft_switch_when_old_active_keeps_link() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);

        // While B settles, A's receive watchdog (armed when A came up)
        // expires: A becomes suspect although its carrier stays on.
        let actions = bring_up(&mut rlmt, PortNum::B, 10_000);

        let a = rlmt.port(PortNum::A).unwrap();
        assert!(a.suspect_rx);
        assert!(a.link_up);
        assert!(actions.contains(&RlmtAction::SendLineCheck {
            port: PortNum::B,
            to: MAC_A,
        }));
        // Selection moved to the healthy port without tearing A's link down.
        assert_eq!(rlmt.active(), Some(PortNum::B));
        assert!(actions.contains(&RlmtAction::Switch {
            from: Some(PortNum::A),
            to: PortNum::B,
            kind: SwitchKind::Soft,
        }));

        // The unanswered line check finally downs the port.
        let mut actions = ActionList::new();
        rlmt.tick(10_000 + PORT_UP_SETTLE_MS + DOWN_TX_TIMEOUT_MS + 1, &mut actions);
        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::Down);
        assert_eq!(rlmt.port(PortNum::A).unwrap().stats.health_failures, 1);
    }

    #[test]
    fn test_net_down_when_last_link_lost() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);

        let mut actions = ActionList::new();
        rlmt.link_down(PortNum::A, 5_000, &mut actions);

        assert_eq!(rlmt.net_state(), NetState::NetDown);
        assert!(actions.contains(&RlmtAction::NetDown));
        assert!(rlmt.active().is_none());
    }

    #[test]
    fn test_periodic_probe_on_up_ports() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);

        let mut actions = ActionList::new();
        rlmt.tick(PORT_UP_SETTLE_MS + CHECK_INTERVAL_MS + 1, &mut actions);
        assert!(actions.contains(&RlmtAction::SendProbe { port: PortNum::A }));
        // One probe from the check that fired during bring-up, one now.
        assert_eq!(rlmt.port(PortNum::A).unwrap().stats.probes_tx, 2);
    }

    #[test]
    fn test_own_probe_loopback_is_silent() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);
        let nonce = rlmt.port(PortNum::A).unwrap().nonce;

        let mut frame = [0u8; 64];
        let len = build_probe(&mut frame, MacAddress::RLMT_MCAST, MAC_A, ProbeKind::Alive, nonce).unwrap();

        let mut actions = ActionList::new();
        rlmt.rx_frame(PortNum::A, &frame[..len], 5_000, &mut actions);

        assert!(actions.is_empty());
        assert_eq!(rlmt.port(PortNum::A).unwrap().stats.loopbacks, 1);
    }

    #[test]
    fn test_foreign_nonce_is_duplicate_mac() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);
        let nonce = rlmt.port(PortNum::A).unwrap().nonce;

        let mut frame = [0u8; 64];
        let len =
            build_probe(&mut frame, MacAddress::RLMT_MCAST, MAC_A, ProbeKind::Alive, !nonce).unwrap();

        let mut actions = ActionList::new();
        rlmt.rx_frame(PortNum::A, &frame[..len], 5_000, &mut actions);

        assert!(actions.contains(&RlmtAction::DuplicateMac { port: PortNum::A }));
    }

    #[test]
    fn test_segmentation_detected_once_per_window() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckSegmentation);
        bring_up(&mut rlmt, PortNum::A, 0);
        bring_up(&mut rlmt, PortNum::B, 0);

        // Open the segmentation window.
        let mut actions = ActionList::new();
        let t0 = PORT_UP_SETTLE_MS + CHECK_INTERVAL_MS + 1;
        rlmt.tick(t0, &mut actions);
        assert!(actions.contains(&RlmtAction::SendBridgeProbe { port: PortNum::A }));
        assert!(actions.contains(&RlmtAction::SendBridgeProbe { port: PortNum::B }));

        // Different root bridges on the two ports.
        let root_x = BridgeId::new([0x80, 0, 1, 1, 1, 1, 1, 1]);
        let root_y = BridgeId::new([0x80, 0, 2, 2, 2, 2, 2, 2]);
        let mut frame = [0u8; 64];
        let len = build_bridge_probe(&mut frame, MacAddress::new([2; 6]), root_x).unwrap();
        rlmt.rx_frame(PortNum::A, &frame[..len], t0 + 10, &mut actions);
        let len = build_bridge_probe(&mut frame, MacAddress::new([4; 6]), root_y).unwrap();
        rlmt.rx_frame(PortNum::B, &frame[..len], t0 + 20, &mut actions);

        // Close the window.
        let mut actions = ActionList::new();
        rlmt.tick(t0 + SEG_WINDOW_MS, &mut actions);
        let count = actions
            .iter()
            .filter(|a| matches!(a, RlmtAction::SegmentationDetected))
            .count();
        assert_eq!(count, 1);
        // Diagnostic only: no switch.
        assert!(!actions.iter().any(|a| matches!(a, RlmtAction::Switch { .. })));
        assert_eq!(rlmt.active(), Some(PortNum::A));
    }

    #[test]
    fn test_matching_roots_no_report() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckSegmentation);
        bring_up(&mut rlmt, PortNum::A, 0);
        bring_up(&mut rlmt, PortNum::B, 0);

        let mut actions = ActionList::new();
        let t0 = PORT_UP_SETTLE_MS + CHECK_INTERVAL_MS + 1;
        rlmt.tick(t0, &mut actions);

        let root = BridgeId::new([0x80, 0, 1, 1, 1, 1, 1, 1]);
        let mut frame = [0u8; 64];
        let len = build_bridge_probe(&mut frame, MacAddress::new([2; 6]), root).unwrap();
        rlmt.rx_frame(PortNum::A, &frame[..len], t0 + 10, &mut actions);
        let len = build_bridge_probe(&mut frame, MacAddress::new([4; 6]), root).unwrap();
        rlmt.rx_frame(PortNum::B, &frame[..len], t0 + 20, &mut actions);

        let mut actions = ActionList::new();
        rlmt.tick(t0 + SEG_WINDOW_MS, &mut actions);
        assert!(!actions.contains(&RlmtAction::SegmentationDetected));
    }

    #[test]
    fn test_stop_returns_everything_to_init() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);

        let mut actions = ActionList::new();
        rlmt.stop(&mut actions);

        assert_eq!(rlmt.net_state(), NetState::Init);
        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::Init);
        assert!(!rlmt.is_running());

        // Events while stopped are ignored.
        rlmt.link_up(PortNum::A, 99_999, &mut actions);
        assert_eq!(rlmt.port(PortNum::A).unwrap().state, PortState::Init);
    }

    #[test]
    fn test_line_check_answered() {
        let (mut rlmt, _) = two_port(RlmtMode::CheckLocalPort);
        bring_up(&mut rlmt, PortNum::A, 0);
        bring_up(&mut rlmt, PortNum::B, 0);

        // A line-check probe addressed to us gets acknowledged.
        let mut frame = [0u8; 64];
        let peer = MacAddress::new([0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
        let len = build_probe(&mut frame, MAC_A, peer, ProbeKind::LineCheck, 7).unwrap();

        let mut actions = ActionList::new();
        rlmt.rx_frame(PortNum::A, &frame[..len], 9_000, &mut actions);
        assert!(actions.contains(&RlmtAction::SendLineCheckAck {
            port: PortNum::A,
            to: peer,
        }));
    }
}
