// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The cross-thread nexthop handle and lookup key.
//!
//! The source this subsystem is modeled on hands a raw pointer to a
//! nexthop across the control/data bridge. A generational slab handle
//! replaces that: an index into the pool plus a generation counter
//! bumped every time the slot is reused, so a handle captured before a
//! nexthop was freed and reallocated is detected as stale rather than
//! dereferenced into the wrong entry.

use net::packet::{IfaceId, VrfId};
use std::net::IpAddr;

/// An opaque, copyable reference to a nexthop pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NhHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NhHandle {
    #[must_use]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// The index key a nexthop is looked up by: `(vrf, iface, addr)`. An
/// `iface` of `None` during lookup matches any interface (spec §4.A:
/// "`iface_id = UNDEF` means match on `(vrf, addr)` ignoring iface").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NhKey {
    pub vrf: VrfId,
    pub iface: Option<IfaceId>,
    pub addr: IpAddr,
}

impl NhKey {
    #[must_use]
    pub fn new(vrf: VrfId, iface: Option<IfaceId>, addr: IpAddr) -> Self {
        Self { vrf, iface, addr }
    }
}
