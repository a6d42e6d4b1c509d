// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The bounded per-nexthop FIFO of packets awaiting resolution.
//!
//! The source threads held packets through a linked list stitched
//! across packet metadata slots, with the nexthop owning the chain.
//! That list is replaced here with a per-nexthop small-vector whose
//! bound is fixed at compile time (spec §9: "replace hold-queue linked
//! list... with a per-nexthop small-vector of packet handles; bound is
//! compile-time"), backed by [`arrayvec::ArrayVec`] so there is no heap
//! allocation on the hold/flush path.

use crate::config::NH_MAX_HELD_PKTS;
use arrayvec::ArrayVec;

/// A bounded FIFO of held packets, touched only from the control loop.
#[derive(Debug)]
pub struct HeldQueue<T> {
    items: ArrayVec<T, NH_MAX_HELD_PKTS>,
}

impl<T> Default for HeldQueue<T> {
    fn default() -> Self {
        Self { items: ArrayVec::new() }
    }
}

impl<T> HeldQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Enqueue at the tail. Returns the packet back to the caller if the
    /// queue is already at [`NH_MAX_HELD_PKTS`] (the caller drops it and
    /// increments an overflow counter, per spec §5 backpressure policy).
    pub fn enqueue(&mut self, pkt: T) -> Result<(), T> {
        self.items.try_push(pkt).map_err(|e| e.element())
    }

    /// Dequeue from the head, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Drain every held packet in enqueue order, for a hold-queue flush
    /// (resolution) or a bulk discard (promotion to `FAILED`).
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enqueue_respects_capacity() {
        let mut q: HeldQueue<u32> = HeldQueue::new();
        for i in 0..NH_MAX_HELD_PKTS as u32 {
            assert!(q.enqueue(i).is_ok());
        }
        assert!(q.is_full());
        assert_eq!(q.enqueue(999), Err(999));
    }

    #[test]
    fn dequeue_is_fifo() {
        let mut q: HeldQueue<u32> = HeldQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn drain_empties_the_queue_in_order() {
        let mut q: HeldQueue<u32> = HeldQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        let drained: Vec<u32> = q.drain().collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(q.is_empty());
    }
}
