// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-packet metadata carried alongside a buffer as it moves through
//! the graph runtime: which interface/VRF it arrived on or is destined
//! for, and — when the graph drops it — why.

use bitflags::bitflags;

/// An interface index, as assigned by the interface table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfaceId(pub u32);

/// A VRF (routing instance) index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VrfId(pub u32);

bitflags! {
    /// Flags describing how a packet has been handled so far.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetaFlags: u8 {
        /// The packet has already traversed a resolution lookup.
        const RESOLVED = 0b0000_0001;
        /// The packet is being replayed out of a held-packet queue.
        const REPLAYED = 0b0000_0010;
    }
}

/// Why the graph stopped processing a packet, recorded for
/// diagnostics/counters before the buffer is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// Delivered to its destination.
    Delivered,
    /// No nexthop could be resolved and the packet could not be held
    /// (queue full, or no free nexthop slot).
    MissL2Resolution,
    /// Dropped by an upstream node before reaching this subsystem.
    Dropped,
}

/// Metadata that accompanies a packet buffer through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMeta {
    /// Interface the packet arrived on, if any (absent for
    /// locally-originated solicitations).
    pub iif: Option<IfaceId>,
    /// Interface the packet should be emitted on.
    pub oif: Option<IfaceId>,
    pub vrf: VrfId,
    pub flags: MetaFlags,
    pub done: Option<DoneReason>,
}

impl PacketMeta {
    /// A fresh, unprocessed metadata record for a packet in `vrf`.
    #[must_use]
    pub fn new(vrf: VrfId) -> Self {
        Self {
            iif: None,
            oif: None,
            vrf,
            flags: MetaFlags::empty(),
            done: None,
        }
    }

    /// Mark this packet as terminated for `reason`.
    pub fn finish(&mut self, reason: DoneReason) {
        self.done = Some(reason);
    }

    /// True once a terminal [`DoneReason`] has been recorded.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_meta_is_not_done() {
        let meta = PacketMeta::new(VrfId(0));
        assert!(!meta.is_done());
    }

    #[test]
    fn finish_records_reason() {
        let mut meta = PacketMeta::new(VrfId(1));
        meta.finish(DoneReason::MissL2Resolution);
        assert_eq!(meta.done, Some(DoneReason::MissL2Resolution));
        assert!(meta.is_done());
    }
}
