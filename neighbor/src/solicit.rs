// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Building ARP requests and NDP Neighbor Solicitations for a pending
//! or stale nexthop (spec §4.D).
//!
//! Destination selection follows the source's probe-output logic: a
//! unicast probe reuses the last-known link-layer address while the
//! unicast probe budget remains, otherwise it falls back to the
//! broadcast (ARP) or solicited-node multicast (NDP) destination.

use net::arp::ArpPacket;
use net::eth::mac::Mac;
use net::ipv6::{Ipv6Header, NDP_HOP_LIMIT, NEXT_HEADER_ICMPV6};
use net::ndp::{solicited_node_multicast, NeighborSolicitation};
use std::net::{Ipv4Addr, Ipv6Addr};

/// A built solicit, ready to prepend to an Ethernet header and emit.
pub struct SolicitFrame {
    pub dest_mac: Mac,
    /// For ARP, the 28-byte ARP packet. For NDP, the IPv6 header
    /// followed by the ICMPv6 Neighbor Solicitation.
    pub payload: Vec<u8>,
}

/// Build an ARP request for `target_ip`, addressed unicast to
/// `last_lladdr` when `unicast` is set and known, else broadcast.
#[must_use]
pub fn arp_solicit(local_mac: Mac, local_ip: Ipv4Addr, target_ip: Ipv4Addr, unicast: bool, last_lladdr: Option<Mac>) -> SolicitFrame {
    let dest_mac = match (unicast, last_lladdr) {
        (true, Some(mac)) => mac,
        _ => Mac::BROADCAST,
    };
    let pkt = ArpPacket::request(local_mac, local_ip, target_ip);
    SolicitFrame {
        dest_mac,
        payload: pkt.to_bytes().to_vec(),
    }
}

/// Build an ICMPv6 Neighbor Solicitation (with a source-lladdr option)
/// wrapped in an IPv6 header, addressed unicast to `target_ip` using
/// `last_lladdr` when `unicast` is set and known, else to the
/// solicited-node multicast group derived from `target_ip`.
#[must_use]
pub fn ndp_solicit(local_mac: Mac, local_ip: Ipv6Addr, target_ip: Ipv6Addr, unicast: bool, last_lladdr: Option<Mac>) -> SolicitFrame {
    let (dest_ip, dest_mac) = match (unicast, last_lladdr) {
        (true, Some(mac)) => (target_ip, mac),
        _ => {
            let mcast = solicited_node_multicast(&target_ip);
            (mcast, Mac::ipv6_multicast(&mcast))
        }
    };
    let ns = NeighborSolicitation {
        target: target_ip,
        source_lladdr: Some(local_mac),
    };
    let icmp_bytes = ns.to_icmp6_bytes(&local_ip, &dest_ip);
    #[allow(clippy::cast_possible_truncation)]
    let ip_header = Ipv6Header {
        traffic_class: 0,
        flow_label: 0,
        payload_length: icmp_bytes.len() as u16,
        next_header: NEXT_HEADER_ICMPV6,
        hop_limit: NDP_HOP_LIMIT,
        source: local_ip,
        destination: dest_ip,
    };
    let mut payload = ip_header.to_bytes().to_vec();
    payload.extend_from_slice(&icmp_bytes);
    SolicitFrame { dest_mac, payload }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arp_solicit_is_broadcast_without_prior_lladdr() {
        let frame = arp_solicit(Mac([1; 6]), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), true, None);
        assert_eq!(frame.dest_mac, Mac::BROADCAST);
    }

    #[test]
    fn arp_solicit_is_unicast_with_known_lladdr() {
        let known = Mac([2; 6]);
        let frame = arp_solicit(Mac([1; 6]), Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), true, Some(known));
        assert_eq!(frame.dest_mac, known);
    }

    #[test]
    fn ndp_solicit_falls_back_to_multicast() {
        let frame = ndp_solicit(Mac([1; 6]), "fe80::1".parse().unwrap(), "fe80::2".parse().unwrap(), false, None);
        assert!(frame.dest_mac.is_multicast());
    }

    #[test]
    fn ndp_solicit_hop_limit_is_255() {
        let frame = ndp_solicit(Mac([1; 6]), "fe80::1".parse().unwrap(), "fe80::2".parse().unwrap(), false, None);
        assert_eq!(frame.payload[7], NDP_HOP_LIMIT);
    }
}
