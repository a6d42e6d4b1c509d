// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

//! A standalone control-loop driver for the neighbor-resolution
//! subsystem: wires a [`NeighborController`] to an in-memory route and
//! interface table, spawns a worker thread simulating data-plane
//! misses, and ticks the control loop until the configured number of
//! rounds elapse. Real embeddings replace [`MemoryRouteTable`] and
//! [`MemoryInterfaceTable`] with the actual forwarding tables and wire
//! [`LoggingGraph`]'s edges to real packet-graph nodes; this binary
//! exists to exercise the crate's public surface end to end.

use neighbor::bridge::{self, Poster};
use neighbor::collab::{Edge, GraphRuntime, Interface, InterfaceTable, RouteEntry, RouteTable};
use neighbor::control::{ControlMsg, NeighborController, OutboundItem, Packet};
use neighbor::ctl::ALL_VRFS;
use neighbor::flags::NhFlags;
use neighbor::NhConfig;
use net::packet::{IfaceId, VrfId};
use net::Mac;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

fn early_init() -> color_eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_level(true)
        .with_line_number(true)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    color_eyre::install()?;
    Ok(())
}

/// An in-memory `(vrf, addr) -> nexthop` route table, keyed without
/// real longest-prefix matching: sufficient for a single-subnet demo,
/// not for production use.
#[derive(Default)]
struct MemoryRouteTable {
    routes: HashMap<(VrfId, IpAddr), RouteEntry>,
}

impl RouteTable for MemoryRouteTable {
    fn route_lookup(&self, vrf: VrfId, _iface: Option<IfaceId>, addr: IpAddr) -> Option<RouteEntry> {
        self.routes.get(&(vrf, addr)).copied()
    }

    fn route_insert(&mut self, vrf: VrfId, _iface: Option<IfaceId>, addr: IpAddr, prefix_len: u8, nexthop: neighbor::handle::NhHandle) {
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

impl MemoryRouteTable {
    fn insert_link(&mut self, vrf: VrfId, addr: IpAddr, prefix_len: u8, nexthop: neighbor::handle::NhHandle) {
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

#[derive(Default)]
struct MemoryInterfaceTable {
    interfaces: HashMap<IfaceId, Interface>,
    sources: HashMap<IfaceId, IpAddr>,
}

impl MemoryInterfaceTable {
    fn add(&mut self, iface: Interface, source: IpAddr) {
        self.sources.insert(iface.id, source);
        self.interfaces.insert(iface.id, iface);
    }
}

impl InterfaceTable for MemoryInterfaceTable {
    fn iface_from_id(&self, id: IfaceId) -> Option<Interface> {
        self.interfaces.get(&id).copied()
    }

    fn preferred_source(&self, id: IfaceId, _dst: IpAddr) -> Option<IpAddr> {
        self.sources.get(&id).copied()
    }
}

/// Emits every enqueued outbound item as a log line instead of driving
/// a real packet graph.
#[derive(Default)]
struct LoggingGraph;

impl GraphRuntime<OutboundItem> for LoggingGraph {
    fn enqueue(&mut self, edge: Edge, pkt: OutboundItem) {
        match pkt {
            OutboundItem::Reinjected(buf) => debug!(?edge, len = buf_len(&buf), "reinjecting held packet"),
            OutboundItem::Solicit { dest_mac, packet } => {
                debug!(?edge, %dest_mac, len = buf_len(&packet), "emitting solicit");
            }
        }
    }
}

fn buf_len(pkt: &Packet) -> usize {
    use net::buffer::PacketBuffer;
    pkt.data().len()
}

fn load_config() -> color_eyre::Result<NhConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("no config path given, using defaults");
        return Ok(NhConfig::default());
    };
    let text = std::fs::read_to_string(&path)?;
    Ok(serde_yaml_ng::from_str(&text)?)
}

fn main() -> color_eyre::Result<()> {
    early_init()?;
    let config = load_config()?;
    debug!(?config, "loaded neighbor configuration");

    let (poster, inbox) = bridge::bridge(1024);
    let mut ifaces = MemoryInterfaceTable::default();
    let local_mac = Mac([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]);
    ifaces.add(
        Interface {
            id: IfaceId(1),
            vrf_id: VrfId(0),
            lladdr: local_mac,
        },
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
    );

    let mut controller = NeighborController::new(
        config.pool_capacity,
        config.pool_capacity,
        config.clone(),
        MemoryRouteTable::default(),
        ifaces,
        LoggingGraph,
        inbox,
    );

    let subnet = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0));
    let link = controller.v4.allocate(neighbor::handle::NhKey::new(VrfId(0), Some(IfaceId(1)), subnet), NhFlags::LINK)?;
    controller.routes.insert_link(VrfId(0), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 32, link);

    spawn_demo_worker(poster);

    info!("starting control loop");
    for tick in 0..50u32 {
        let now = Instant::now();
        controller.drain_bridge(now);
        controller.run_timers(now);
        if tick % 10 == 0 {
            let entries = controller.nh_list(ALL_VRFS, now);
            info!(count = entries.len(), "nexthop pool snapshot");
            for entry in &entries {
                debug!(addr = %entry.addr, state = ?entry.flags, held = entry.held_count, "nexthop");
            }
        }
        thread::sleep(Duration::from_millis(20));
    }

    warn!("control loop demo finished, shutting down");
    Ok(())
}

/// Simulates a data-plane worker posting an unreachable-miss for a
/// single destination, standing in for the real graph node's call to
/// [`Poster::post_to_stack`] on a resolution miss.
fn spawn_demo_worker(poster: Poster<ControlMsg>) {
    thread::spawn(move || {
        let dst = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        for i in 0..3u8 {
            let msg = ControlMsg::UnreachableMiss {
                vrf: VrfId(0),
                iface: Some(IfaceId(1)),
                dst,
                pkt: Packet::from_data(vec![i]),
            };
            if let Err(err) = poster.post_to_stack(msg) {
                warn!(%err, "dropped simulated packet");
            }
            thread::sleep(Duration::from_millis(50));
        }
    });
}
