// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flag set a nexthop's macro-state is composed from.

use bitflags::bitflags;

bitflags! {
    /// Bits composing a nexthop's resolution state (spec data model §3,
    /// state machine §4.C). Macro-states are derived combinations of
    /// these bits via [`crate::nexthop::State::from_flags`]; the bits
    /// themselves are also the protection/provenance markers
    /// (`STATIC`, `LOCAL`, `LINK`, `GATEWAY`) that never participate in
    /// the REACHABLE/STALE/PENDING/FAILED state transitions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NhFlags: u16 {
        /// Operator-configured; never mutated by probe receipt.
        const STATIC = 0b0000_0001;
        /// Address belongs to an interface on this router.
        const LOCAL = 0b0000_0010;
        /// Describes a directly-connected subnet, not a host.
        const LINK = 0b0000_0100;
        /// Resolution is indirect, via another nexthop.
        const GATEWAY = 0b0000_1000;
        /// `lladdr` is current.
        const REACHABLE = 0b0001_0000;
        /// `REACHABLE` but past its reachability window.
        const STALE = 0b0010_0000;
        /// A solicit is outstanding, not yet replied to.
        const PENDING = 0b0100_0000;
        /// Probes exhausted without a reply.
        const FAILED = 0b1000_0000;
    }
}

impl NhFlags {
    /// True if this nexthop may not be explicitly deleted by an
    /// operator (spec invariant 7): provenance flags or a shared
    /// reference count protect it.
    #[must_use]
    pub fn is_protected(self) -> bool {
        self.intersects(NhFlags::LOCAL | NhFlags::LINK | NhFlags::GATEWAY)
    }
}
