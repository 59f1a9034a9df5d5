//! Single-shot software timers.
//!
//! RLMT never receives timer callbacks from the host; it keeps one deadline
//! cell per concern and fires them from `tick()`. A timer that is superseded
//! by a contrary event is stopped before the owning state changes, so a stale
//! deadline can never fire with a new meaning.

/// One single-shot deadline cell.
///
/// Not auto-repeating; periodic checks re-arm themselves after firing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline: Option<u64>,
}

impl Timer {
    /// Stopped timer.
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer `duration` milliseconds from `now`.
    ///
    /// Re-arming an armed timer replaces the old deadline.
    pub fn start(&mut self, now: u64, duration: u64) {
        self.deadline = Some(now.saturating_add(duration));
    }

    /// Disarm.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    /// Is the timer armed?
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire if expired.
    ///
    /// Returns true at most once per arming; firing disarms the timer.
    pub fn fire(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Remaining time, if armed.
    pub fn remaining(&self, now: u64) -> Option<u64> {
        self.deadline.map(|d| d.saturating_sub(now))
    }
}
