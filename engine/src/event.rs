//! Deferred event queue
//!
//! Work that must not run inside the fast interrupt loops (link changes,
//! timer expiry, filter updates) is queued here and drained under the
//! slow-path lock. The queue is a fixed ring; posting to a full queue drops
//! the event and counts the drop, it never blocks.

/// Queue capacity. Events are coalesced at the source, so the queue stays
/// nearly empty in practice.
pub const EVENT_QUEUE_SIZE: usize = 32;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// Carrier appeared on a port
    LinkUp,
    /// Carrier vanished from a port
    LinkDown,
    /// Periodic timer fired; run the link supervisor's tick
    Timer,
    /// A transmit queue should be re-kicked after backpressure
    QueueKick,
    /// The unicast address of a port changed; reprogram filters
    AddressOverride,
    /// Hardware error bits latched; param carries the error register
    HardwareError,
}

/// One queued event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub code: EventCode,
    /// Port the event concerns, if any
    pub port: u8,
    /// Event-specific detail (error bits, queue id)
    pub param: u32,
}

impl Event {
    pub const fn new(code: EventCode, port: u8, param: u32) -> Self {
        Self { code, port, param }
    }
}

/// Fixed-capacity FIFO of events.
///
/// Not internally locked; the owner wraps it in the slow-path mutex.
pub struct EventQueue {
    slots: [Option<Event>; EVENT_QUEUE_SIZE],
    head: usize,
    tail: usize,
    len: usize,
    /// Events lost to a full queue since attach
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            slots: [None; EVENT_QUEUE_SIZE],
            head: 0,
            tail: 0,
            len: 0,
            dropped: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Queue an event; a full queue drops it and counts the drop.
    pub fn post(&mut self, event: Event) {
        if self.len == EVENT_QUEUE_SIZE {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        self.slots[self.tail] = Some(event);
        self.tail = (self.tail + 1) % EVENT_QUEUE_SIZE;
        self.len += 1;
    }

    /// Dequeue the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        if self.len == 0 {
            return None;
        }
        let event = self.slots[self.head].take();
        self.head = (self.head + 1) % EVENT_QUEUE_SIZE;
        self.len -= 1;
        event
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = EventQueue::new();
        q.post(Event::new(EventCode::LinkUp, 0, 0));
        q.post(Event::new(EventCode::LinkDown, 1, 0));

        assert_eq!(q.pop().map(|e| e.code), Some(EventCode::LinkUp));
        assert_eq!(q.pop().map(|e| e.code), Some(EventCode::LinkDown));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let mut q = EventQueue::new();
        for i in 0..EVENT_QUEUE_SIZE + 3 {
            q.post(Event::new(EventCode::Timer, 0, i as u32));
        }
        assert_eq!(q.len(), EVENT_QUEUE_SIZE);
        assert_eq!(q.dropped(), 3);

        // Oldest events survived.
        assert_eq!(q.pop().map(|e| e.param), Some(0));
    }
}
