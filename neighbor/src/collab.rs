// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contracts for the external collaborators this subsystem reads from
//! or drives, but does not itself implement (spec §6): the route
//! table, the interface table, and the packet graph runtime. Only
//! in-memory test doubles live in this crate; real implementations are
//! wired in by the process embedding this subsystem.

use crate::handle::NhHandle;
use net::packet::{IfaceId, VrfId};
use net::Mac;
use std::net::IpAddr;

/// A route, as far as this subsystem needs to know about one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub nexthop: NhHandle,
    pub prefix_len: u8,
    /// True for a directly-connected subnet route (spec glossary: LINK
    /// route) whose nexthop describes the subnet rather than a host.
    pub is_link: bool,
}

/// The route lookup/insert/delete contract (spec §6).
pub trait RouteTable {
    fn route_lookup(&self, vrf: VrfId, iface: Option<IfaceId>, addr: IpAddr) -> Option<RouteEntry>;
    fn route_insert(&mut self, vrf: VrfId, iface: Option<IfaceId>, addr: IpAddr, prefix_len: u8, nexthop: NhHandle);
    fn route_delete(&mut self, vrf: VrfId, addr: IpAddr, prefix_len: u8);
}

/// An interface, as far as this subsystem needs to know about one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface {
    pub id: IfaceId,
    pub vrf_id: VrfId,
    pub lladdr: Mac,
}

/// The interface lookup contract (spec §6): identity, link-layer
/// address, and the preferred source address for a destination's
/// scope.
pub trait InterfaceTable {
    fn iface_from_id(&self, id: IfaceId) -> Option<Interface>;
    /// The address this interface would source traffic to `dst` from,
    /// or `None` if it has none matching `dst`'s scope (the solicit is
    /// then dropped to the error edge, per spec §4.C).
    fn preferred_source(&self, id: IfaceId, dst: IpAddr) -> Option<IpAddr>;
}

/// An opaque graph runtime edge a built packet is emitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Output,
    Error,
    Invalid,
    Unsupported,
    Ignore,
}

/// The packet graph driving contract (spec §6): enqueueing a built
/// packet onto a named edge of a named node.
pub trait GraphRuntime<T> {
    fn enqueue(&mut self, edge: Edge, pkt: T);
}

#[cfg(test)]
pub mod test_doubles {
    use super::*;
    use std::collections::HashMap;

    /// An in-memory route table keyed by `(vrf, prefix_len, addr)`,
    /// sufficient for scenario tests that never need longest-prefix
    /// matching across multiple prefix lengths for the same address.
    #[derive(Debug, Default)]
    pub struct FakeRouteTable {
        routes: HashMap<(VrfId, IpAddr), RouteEntry>,
    }

    impl RouteTable for FakeRouteTable {
        fn route_lookup(&self, vrf: VrfId, _iface: Option<IfaceId>, addr: IpAddr) -> Option<RouteEntry> {
            self.routes.get(&(vrf, addr)).copied()
        }

        fn route_insert(&mut self, vrf: VrfId, _iface: Option<IfaceId>, addr: IpAddr, prefix_len: u8, nexthop: NhHandle) {
            self.routes.insert(
                (vrf, addr),
                RouteEntry {
                    nexthop,
                    prefix_len,
                    is_link: false,
                },
            );
        }

        fn route_delete(&mut self, vrf: VrfId, addr: IpAddr, _prefix_len: u8) {
            self.routes.remove(&(vrf, addr));
        }
    }

    impl FakeRouteTable {
        /// Insert a LINK route for test setup, bypassing the
        /// host/subnet distinction [`RouteTable::route_insert`] doesn't
        /// model.
        pub fn insert_link(&mut self, vrf: VrfId, addr: IpAddr, prefix_len: u8, nexthop: NhHandle) {
            self.routes.insert(
                (vrf, addr),
                RouteEntry {
                    nexthop,
                    prefix_len,
                    is_link: true,
                },
            );
        }
    }

    /// An in-memory interface table for test setup.
    #[derive(Debug, Default)]
    pub struct FakeInterfaceTable {
        interfaces: HashMap<IfaceId, Interface>,
        sources: HashMap<IfaceId, IpAddr>,
    }

    impl FakeInterfaceTable {
        pub fn add(&mut self, iface: Interface, source: IpAddr) {
            self.sources.insert(iface.id, source);
            self.interfaces.insert(iface.id, iface);
        }
    }

    impl InterfaceTable for FakeInterfaceTable {
        fn iface_from_id(&self, id: IfaceId) -> Option<Interface> {
            self.interfaces.get(&id).copied()
        }

        fn preferred_source(&self, id: IfaceId, _dst: IpAddr) -> Option<IpAddr> {
            self.sources.get(&id).copied()
        }
    }

    /// A recording graph runtime double: every enqueue is appended to
    /// `sent` for the test to assert against.
    #[derive(Debug, Default)]
    pub struct FakeGraphRuntime<T> {
        pub sent: Vec<(Edge, T)>,
    }

    impl<T> GraphRuntime<T> for FakeGraphRuntime<T> {
        fn enqueue(&mut self, edge: Edge, pkt: T) {
            self.sent.push((edge, pkt));
        }
    }
}
