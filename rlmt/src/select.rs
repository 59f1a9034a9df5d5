//! Active-port selection.
//!
//! A pure function over a snapshot of all ports: same snapshot, same answer.
//! The rules run in strict priority order and the first match wins. Rules
//! that rely on receive observations (1, 2) or that would activate a port
//! without carrier confidence (7, 8) are skipped in pure link-check mode.

use crate::types::{PortNum, PortState, RlmtMode, BC_TIE_WINDOW_MS};

/// Everything the selection algorithm is allowed to look at for one port.
#[derive(Debug, Clone, Copy)]
pub struct PortSnapshot {
    /// Port index
    pub num: PortNum,
    /// State machine position
    pub state: PortState,
    /// Under receive suspicion
    pub suspect_rx: bool,
    /// Autonegotiation succeeded
    pub autoneg_ok: bool,
    /// Last broadcast receive timestamp
    pub bc_timestamp: u64,
    /// When the port entered GoingUp
    pub going_up_since: u64,
}

/// Prefer the active port, then the preferred port, then the lowest index.
fn prefer<'a, F>(
    ports: &'a [PortSnapshot],
    active: Option<PortNum>,
    preferred: Option<PortNum>,
    qualifies: F,
) -> Option<PortNum>
where
    F: Fn(&PortSnapshot) -> bool,
{
    let find = |wanted: Option<PortNum>| -> Option<PortNum> {
        let wanted = wanted?;
        ports
            .iter()
            .find(|p| p.num == wanted && qualifies(p))
            .map(|p| p.num)
    };

    find(active)
        .or_else(|| find(preferred))
        .or_else(|| ports.iter().find(|p| qualifies(p)).map(|p| p.num))
}

/// Rule 1: the port that heard a broadcast substantially later than every
/// other up port. Ambiguous timestamps (any other port within the tie
/// window) reject the rule entirely.
fn select_by_broadcast(ports: &[PortSnapshot]) -> Option<PortNum> {
    let mut up = ports.iter().filter(|p| p.state == PortState::Up);
    let first = up.next()?;
    let mut latest = first;
    for p in up {
        if p.bc_timestamp > latest.bc_timestamp {
            latest = p;
        }
    }
    if latest.bc_timestamp == 0 {
        return None;
    }

    for p in ports.iter().filter(|p| p.state == PortState::Up) {
        if p.num == latest.num {
            continue;
        }
        // Not "substantially later" than this one: ambiguous, reject.
        if latest.bc_timestamp.saturating_sub(p.bc_timestamp) <= BC_TIE_WINDOW_MS {
            return None;
        }
    }
    Some(latest.num)
}

/// Select the port that should carry traffic.
///
/// Returns `None` only if no port qualifies under any rule; the caller is
/// expected to treat that as an internal consistency error (the function is
/// only invoked after some port reported a link event).
pub fn select_active(
    ports: &[PortSnapshot],
    active: Option<PortNum>,
    preferred: Option<PortNum>,
    mode: RlmtMode,
) -> Option<PortNum> {
    // 1. Broadcast-recency discrimination.
    if mode.checks_local_port() {
        if let Some(winner) = select_by_broadcast(ports) {
            return Some(winner);
        }
    }

    // 2. Up and not under receive suspicion.
    if mode.checks_local_port() {
        if let Some(winner) = prefer(ports, active, preferred, |p| {
            p.state == PortState::Up && !p.suspect_rx
        }) {
            return Some(winner);
        }
    }

    // 3. Up with successful autonegotiation.
    if let Some(winner) = prefer(ports, active, preferred, |p| {
        p.state == PortState::Up && p.autoneg_ok
    }) {
        return Some(winner);
    }

    // 4. Up, autonegotiation outcome no longer required.
    if let Some(winner) = prefer(ports, active, preferred, |p| p.state == PortState::Up) {
        return Some(winner);
    }

    // 5./6. Longest-waiting GoingUp port, autoneg success first.
    for require_autoneg in [true, false] {
        let winner = ports
            .iter()
            .filter(|p| p.state == PortState::GoingUp && (p.autoneg_ok || !require_autoneg))
            .min_by_key(|p| p.going_up_since)
            .map(|p| p.num);
        if winner.is_some() {
            return winner;
        }
    }

    // 7./8. Last resort: a Down port, autoneg success first.
    if mode.checks_local_port() {
        for require_autoneg in [true, false] {
            if let Some(winner) = prefer(ports, active, preferred, |p| {
                p.state == PortState::Down && (p.autoneg_ok || !require_autoneg)
            }) {
                return Some(winner);
            }
        }
    }

    None
}
