//! Index-linked queues
//!
//! A queue is just a head/tail pair of indices into a slab the caller
//! passes in; the links live inside the slab elements. Every operation is
//! O(1), including moving one whole queue onto the back of another.

use crate::pool::packet::{Fragment, Packet, NIL};

/// Slab elements that can be chained by index
pub trait Linked {
    fn next_index(&self) -> u16;
    fn set_next_index(&mut self, next: u16);
}

impl Linked for Packet {
    fn next_index(&self) -> u16 {
        self.next
    }

    fn set_next_index(&mut self, next: u16) {
        self.next = next;
    }
}

impl Linked for Fragment {
    fn next_index(&self) -> u16 {
        self.next
    }

    fn set_next_index(&mut self, next: u16) {
        self.next = next;
    }
}

/// FIFO queue of slab indices
#[derive(Debug, Clone, Copy)]
pub struct IndexQueue {
    head: u16,
    tail: u16,
    len: usize,
}

impl IndexQueue {
    pub const fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest element without removing it.
    pub const fn peek_front(&self) -> Option<u16> {
        if self.head == NIL {
            None
        } else {
            Some(self.head)
        }
    }

    /// Remove and return the oldest element.
    pub fn pop_front<T: Linked>(&mut self, slab: &mut [T]) -> Option<u16> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.head = slab[idx as usize].next_index();
        if self.head == NIL {
            self.tail = NIL;
        }
        slab[idx as usize].set_next_index(NIL);
        self.len -= 1;
        Some(idx)
    }

    /// Put an element back at the front (undo of `pop_front`).
    pub fn push_front<T: Linked>(&mut self, slab: &mut [T], idx: u16) {
        slab[idx as usize].set_next_index(self.head);
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
        self.len += 1;
    }

    /// Append an element at the back.
    pub fn push_back<T: Linked>(&mut self, slab: &mut [T], idx: u16) {
        slab[idx as usize].set_next_index(NIL);
        if self.tail == NIL {
            self.head = idx;
        } else {
            slab[self.tail as usize].set_next_index(idx);
        }
        self.tail = idx;
        self.len += 1;
    }

    /// Splice every element of `other` onto the back of `self`, leaving
    /// `other` empty. O(1).
    pub fn append<T: Linked>(&mut self, slab: &mut [T], other: &mut IndexQueue) {
        if other.head == NIL {
            return;
        }
        if self.tail == NIL {
            self.head = other.head;
        } else {
            slab[self.tail as usize].set_next_index(other.head);
        }
        self.tail = other.tail;
        self.len += other.len;
        *other = IndexQueue::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab() -> [Packet; 8] {
        [Packet::empty(); 8]
    }

    #[test]
    fn test_fifo_order() {
        let mut slab = slab();
        let mut q = IndexQueue::new();
        q.push_back(&mut slab, 3);
        q.push_back(&mut slab, 1);
        q.push_back(&mut slab, 7);

        assert_eq!(q.len(), 3);
        assert_eq!(q.pop_front(&mut slab), Some(3));
        assert_eq!(q.pop_front(&mut slab), Some(1));
        assert_eq!(q.pop_front(&mut slab), Some(7));
        assert_eq!(q.pop_front(&mut slab), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_front_undoes_pop() {
        let mut slab = slab();
        let mut q = IndexQueue::new();
        q.push_back(&mut slab, 2);
        q.push_back(&mut slab, 4);

        let got = q.pop_front(&mut slab).unwrap();
        q.push_front(&mut slab, got);
        assert_eq!(q.pop_front(&mut slab), Some(2));
        assert_eq!(q.pop_front(&mut slab), Some(4));
    }

    #[test]
    fn test_append_splices_whole_queue() {
        let mut slab = slab();
        let mut a = IndexQueue::new();
        let mut b = IndexQueue::new();
        a.push_back(&mut slab, 0);
        b.push_back(&mut slab, 5);
        b.push_back(&mut slab, 6);

        a.append(&mut slab, &mut b);
        assert_eq!(a.len(), 3);
        assert!(b.is_empty());
        assert_eq!(a.pop_front(&mut slab), Some(0));
        assert_eq!(a.pop_front(&mut slab), Some(5));
        assert_eq!(a.pop_front(&mut slab), Some(6));

        // Appending onto an empty queue adopts the other queue wholesale.
        let mut c = IndexQueue::new();
        let mut d = IndexQueue::new();
        d.push_back(&mut slab, 1);
        c.append(&mut slab, &mut d);
        assert_eq!(c.pop_front(&mut slab), Some(1));
    }
}
