// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The single-threaded control loop: drains the data-plane bridge,
//! runs the unreachable-nexthop callback (spec §4.F), the control-side
//! probe-learning path (spec §4.E tail), and the per-nexthop timer tick
//! (spec §4.C).
//!
//! Packet buffers here are fixed to [`net::buffer::OwnedBuffer`] rather
//! than left generic: building an arbitrary caller-chosen buffer type
//! from freshly-encoded solicit bytes needs a factory this subsystem
//! has no reason to own, and the real packet-buffer pool is itself an
//! out-of-scope collaborator (spec §6). Call sites embedding this
//! subsystem in a real graph runtime convert at the boundary.

use crate::bridge::Inbox;
use crate::collab::{Edge, GraphRuntime, InterfaceTable, RouteTable};
use crate::config::NhConfig;
use crate::error::NhError;
use crate::flags::NhFlags;
use crate::handle::{NhHandle, NhKey};
use crate::nexthop::{MissOutcome, State};
use crate::pool::NexthopPool;
use crate::solicit;
use net::buffer::OwnedBuffer;
use net::eth::mac::Mac;
use net::packet::{IfaceId, VrfId};
use std::net::IpAddr;
use std::time::Instant;

pub type Packet = OwnedBuffer;

/// A message posted from a data-plane worker to the control loop.
pub enum ControlMsg {
    /// A packet missed resolution against `dst` (spec §4.F).
    UnreachableMiss {
        vrf: VrfId,
        iface: Option<IfaceId>,
        dst: IpAddr,
        pkt: Packet,
    },
    /// A probe reply (or an NS carrying a source-lladdr option) was
    /// copied to control for neighbor-cache learning (spec §4.E tail).
    ProbeLearn {
        vrf: VrfId,
        iface: IfaceId,
        sender_ip: IpAddr,
        sender_lladdr: Mac,
    },
}

/// Something the control loop hands back to the graph runtime.
pub enum OutboundItem {
    /// A previously-held or just-unblocked data packet, to be
    /// re-injected with its nexthop now resolved.
    Reinjected(Packet),
    /// A freshly-built solicit, addressed at the L2 layer to `dest_mac`.
    Solicit { dest_mac: Mac, packet: Packet },
}

/// The owned context driving the neighbor-resolution subsystem (spec
/// §9: "confine global state to a single owned context created at
/// startup").
pub struct NeighborController<R, I, G> {
    pub v4: NexthopPool<Packet>,
    pub v6: NexthopPool<Packet>,
    pub routes: R,
    pub ifaces: I,
    pub graph: G,
    pub config: NhConfig,
    inbox: Inbox<ControlMsg>,
}

fn is_v4(addr: IpAddr) -> bool {
    matches!(addr, IpAddr::V4(_))
}

fn host_prefix_len(addr: IpAddr) -> u8 {
    if is_v4(addr) {
        32
    } else {
        128
    }
}

impl<R, I, G> NeighborController<R, I, G>
where
    R: RouteTable,
    I: InterfaceTable,
    G: GraphRuntime<OutboundItem>,
{
    #[must_use]
    pub fn new(v4_capacity: usize, v6_capacity: usize, config: NhConfig, routes: R, ifaces: I, graph: G, inbox: Inbox<ControlMsg>) -> Self {
        Self {
            v4: NexthopPool::new(v4_capacity),
            v6: NexthopPool::new(v6_capacity),
            routes,
            ifaces,
            graph,
            config,
            inbox,
        }
    }

    pub(crate) fn pool_mut(&mut self, addr: IpAddr) -> &mut NexthopPool<Packet> {
        if is_v4(addr) {
            &mut self.v4
        } else {
            &mut self.v6
        }
    }

    pub(crate) fn pool(&self, addr: IpAddr) -> &NexthopPool<Packet> {
        if is_v4(addr) {
            &self.v4
        } else {
            &self.v6
        }
    }

    /// Drain every message currently queued on the bridge and process
    /// it. Called once per control-loop event-loop turn.
    pub fn drain_bridge(&mut self, now: Instant) {
        for msg in self.inbox.drain() {
            match msg {
                ControlMsg::UnreachableMiss { vrf, iface, dst, pkt } => self.handle_unreachable(now, vrf, iface, dst, pkt),
                ControlMsg::ProbeLearn {
                    vrf,
                    iface,
                    sender_ip,
                    sender_lladdr,
                } => self.handle_probe_learn(now, vrf, iface, sender_ip, sender_lladdr),
            }
        }
    }

    /// The unreachable-nexthop callback contract (spec §4.F).
    fn handle_unreachable(&mut self, now: Instant, vrf: VrfId, iface: Option<IfaceId>, dst: IpAddr, pkt: Packet) {
        let Some(route) = self.routes.route_lookup(vrf, iface, dst) else {
            tracing::debug!(%dst, "route withdrawn before unreachable callback ran, dropping");
            return;
        };

        let handle = if route.is_link {
            match self.pivot_to_host(vrf, route.nexthop, dst) {
                Some(h) => h,
                None => {
                    tracing::debug!(%dst, "dropping: could not pivot link route to a host nexthop");
                    return;
                }
            }
        } else {
            route.nexthop
        };

        let Some(nh) = self.pool_mut(dst).get_mut(handle) else {
            panic!("route for {dst} points at a stale nexthop handle {handle:?}");
        };

        if nh.state() == State::Reachable {
            self.graph.enqueue(Edge::Output, OutboundItem::Reinjected(pkt));
            return;
        }

        match nh.handle_miss(now, pkt, &self.config) {
            MissOutcome::Reinject(pkt) => self.graph.enqueue(Edge::Output, OutboundItem::Reinjected(pkt)),
            MissOutcome::Enqueued { solicit } => {
                if solicit {
                    self.emit_solicit(handle, dst);
                }
            }
            MissOutcome::Overflow { pkt: dropped, solicit } => {
                drop(dropped);
                tracing::debug!(%dst, "hold queue full, dropping packet");
                if solicit {
                    self.emit_solicit(handle, dst);
                }
            }
        }
    }

    /// Pivot a `LINK` route to a concrete host nexthop for `dst`,
    /// creating and indexing it (and a host route pointing at it) if
    /// this is the first packet for that destination (spec §4.F step 2).
    fn pivot_to_host(&mut self, vrf: VrfId, link_nexthop: NhHandle, dst: IpAddr) -> Option<NhHandle> {
        let link_iface = self.pool(dst).get(link_nexthop)?.key.iface;
        let host_key = NhKey::new(vrf, link_iface, dst);
        if let Some(existing) = self.pool(dst).lookup(host_key) {
            return Some(existing);
        }
        let handle = self.pool_mut(dst).allocate(host_key, NhFlags::empty()).ok()?;
        self.routes.route_insert(vrf, link_iface, dst, host_prefix_len(dst), handle);
        Some(handle)
    }

    /// Control-side neighbor-cache learning from a copied probe (spec
    /// §4.E tail).
    fn handle_probe_learn(&mut self, now: Instant, vrf: VrfId, iface: IfaceId, sender_ip: IpAddr, sender_lladdr: Mac) {
        let key = NhKey::new(vrf, Some(iface), sender_ip);
        let handle = match self.pool(sender_ip).lookup(key) {
            Some(h) => h,
            None => match self.pool_mut(sender_ip).allocate(key, NhFlags::empty()) {
                Ok(h) => {
                    self.routes.route_insert(vrf, Some(iface), sender_ip, host_prefix_len(sender_ip), h);
                    h
                }
                Err(err) => {
                    tracing::debug!(%sender_ip, %err, "could not learn neighbor: pool exhausted");
                    return;
                }
            },
        };

        let Some(nh) = self.pool_mut(sender_ip).get_mut(handle) else {
            panic!("just-resolved handle {handle:?} for {sender_ip} is stale");
        };
        if nh.is_static() {
            return;
        }
        for pkt in nh.handle_reply(now, sender_lladdr) {
            self.graph.enqueue(Edge::Output, OutboundItem::Reinjected(pkt));
        }
    }

    /// Run the probe-retransmission timer for every live nexthop in
    /// both pools. Intended to be called on a fixed tick from the
    /// control loop's event-loop timer.
    pub fn run_timers(&mut self, now: Instant) {
        let config = self.config.clone();
        Self::tick_pool(&mut self.v4, &self.ifaces, &mut self.graph, &config, now);
        Self::tick_pool(&mut self.v6, &self.ifaces, &mut self.graph, &config, now);
    }

    fn tick_pool(pool: &mut NexthopPool<Packet>, ifaces: &I, graph: &mut G, config: &NhConfig, now: Instant) {
        let handles: Vec<NhHandle> = pool.iter().map(|(h, _)| h).collect();
        for handle in handles {
            let Some(nh) = pool.get_mut(handle) else { continue };
            let addr = nh.key.addr;
            match nh.handle_timer(now, config) {
                crate::nexthop::TimerOutcome::SolicitAgain { .. } => {
                    Self::build_and_send(pool, ifaces, graph, config, handle, addr);
                }
                crate::nexthop::TimerOutcome::Failed { dropped } => {
                    drop(dropped);
                    tracing::debug!(%addr, "probes exhausted, nexthop failed");
                }
                crate::nexthop::TimerOutcome::Staled | crate::nexthop::TimerOutcome::NoAction => {}
            }
        }
    }

    fn emit_solicit(&mut self, handle: NhHandle, addr: IpAddr) {
        if is_v4(addr) {
            Self::build_and_send(&self.v4, &self.ifaces, &mut self.graph, &self.config, handle, addr);
        } else {
            Self::build_and_send(&self.v6, &self.ifaces, &mut self.graph, &self.config, handle, addr);
        }
    }

    /// Build a solicit for `handle`/`addr` and enqueue it, or drop to
    /// the error edge's equivalent (a debug log; there is no error edge
    /// in this bridge-free controller) when the interface has no
    /// usable source address, per spec §4.C/§4.D.
    fn build_and_send(pool: &NexthopPool<Packet>, ifaces: &I, graph: &mut G, config: &NhConfig, handle: NhHandle, addr: IpAddr) {
        let Some(nh) = pool.get(handle) else { return };
        let Some(iface_id) = nh.key.iface else {
            tracing::debug!(%addr, "solicit dropped: nexthop has no bound interface");
            return;
        };
        let Some(iface) = ifaces.iface_from_id(iface_id) else {
            tracing::debug!(%addr, ?iface_id, "solicit dropped: unknown interface");
            return;
        };
        let Some(src) = ifaces.preferred_source(iface_id, addr) else {
            tracing::debug!(%addr, ?iface_id, "solicit dropped: no preferred source address for scope");
            return;
        };
        let unicast = nh.next_probe_is_unicast(config);
        let last_lladdr = nh.lladdr();

        let frame = match (addr, src) {
            (IpAddr::V4(target), IpAddr::V4(source)) => solicit::arp_solicit(iface.lladdr, source, target, unicast, last_lladdr),
            (IpAddr::V6(target), IpAddr::V6(source)) => solicit::ndp_solicit(iface.lladdr, source, target, unicast, last_lladdr),
            _ => {
                tracing::warn!(%addr, "address family mismatch building solicit");
                return;
            }
        };
        graph.enqueue(
            Edge::Output,
            OutboundItem::Solicit {
                dest_mac: frame.dest_mac,
                packet: Packet::from_data(frame.payload),
            },
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bridge::bridge;
    use crate::collab::test_doubles::{FakeGraphRuntime, FakeInterfaceTable, FakeRouteTable};
    use crate::collab::Interface;
    use std::net::Ipv4Addr;
    use tracing_test::traced_test;

    fn make_controller() -> (NeighborController<FakeRouteTable, FakeInterfaceTable, FakeGraphRuntime<OutboundItem>>, crate::bridge::Poster<ControlMsg>) {
        let (poster, inbox) = bridge(16);
        let mut ifaces = FakeInterfaceTable::default();
        ifaces.add(
            Interface {
                id: IfaceId(1),
                vrf_id: VrfId(0),
                lladdr: Mac([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]),
            },
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        );
        let controller = NeighborController::new(64, 64, NhConfig::default(), FakeRouteTable::default(), ifaces, FakeGraphRuntime::default(), inbox);
        (controller, poster)
    }

    #[test]
    #[traced_test]
    fn unreachable_without_a_route_drops_silently() {
        let (mut ctrl, poster) = make_controller();
        poster
            .post_to_stack(ControlMsg::UnreachableMiss {
                vrf: VrfId(0),
                iface: Some(IfaceId(1)),
                dst: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                pkt: Packet::from_data(vec![1, 2, 3]),
            })
            .unwrap();
        ctrl.drain_bridge(Instant::now());
        assert!(ctrl.graph.sent.is_empty());
    }

    #[test]
    #[traced_test]
    fn link_route_pivots_to_host_nexthop_and_emits_a_solicit() {
        let (mut ctrl, poster) = make_controller();
        let link_key = NhKey::new(VrfId(0), Some(IfaceId(1)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)));
        let link_handle = ctrl.v4.allocate(link_key, NhFlags::LINK).unwrap();
        ctrl.routes
            .insert_link(VrfId(0), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 32, link_handle);

        poster
            .post_to_stack(ControlMsg::UnreachableMiss {
                vrf: VrfId(0),
                iface: Some(IfaceId(1)),
                dst: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                pkt: Packet::from_data(vec![9]),
            })
            .unwrap();
        ctrl.drain_bridge(Instant::now());

        let host = ctrl.v4.lookup(NhKey::new(VrfId(0), Some(IfaceId(1)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))).unwrap();
        assert_eq!(ctrl.v4.get(host).unwrap().state(), State::Pending);
        assert!(matches!(ctrl.graph.sent.first(), Some((Edge::Output, OutboundItem::Solicit { .. }))));
    }

    #[test]
    fn probe_learn_creates_and_flushes_a_reachable_nexthop() {
        let (mut ctrl, poster) = make_controller();
        let key = NhKey::new(VrfId(0), Some(IfaceId(1)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        ctrl.v4.allocate(key, NhFlags::empty()).unwrap();
        ctrl.v4
            .get_mut(ctrl.v4.lookup(key).unwrap())
            .unwrap()
            .handle_miss(Instant::now(), Packet::from_data(vec![7]), &ctrl.config);

        poster
            .post_to_stack(ControlMsg::ProbeLearn {
                vrf: VrfId(0),
                iface: IfaceId(1),
                sender_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                sender_lladdr: Mac([0xbb; 6]),
            })
            .unwrap();
        ctrl.drain_bridge(Instant::now());

        let handle = ctrl.v4.lookup(key).unwrap();
        assert_eq!(ctrl.v4.get(handle).unwrap().state(), State::Reachable);
        assert!(matches!(ctrl.graph.sent.first(), Some((Edge::Output, OutboundItem::Reinjected(_)))));
    }
}
