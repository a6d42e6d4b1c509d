// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Validating incoming ARP/NDP probes and replies, and building the
//! replies this router sends back (spec §4.E).
//!
//! This module is pure packet-level logic: it does not touch the
//! nexthop pool or route table. The data-plane graph node calls into
//! here to decide what to emit and what (if anything) to copy to the
//! control loop for neighbor-cache learning; the control-side learning
//! itself lives in [`crate::control`].

use crate::error::NhError;
use net::arp::{ArpOp, ArpPacket};
use net::eth::mac::Mac;
use net::ipv6::NDP_HOP_LIMIT;
use net::ndp::{solicited_node_multicast, NeighborAdvertisement, NeighborSolicitation, ALL_NODES_LINK_LOCAL};
use std::net::{Ipv4Addr, Ipv6Addr};

/// What the data plane should do with a validated incoming NS.
pub enum NsDisposition {
    /// Reply unicast to `dest` with the given `Solicited` flag. If a
    /// source-lladdr option was present, the caller should additionally
    /// post a copy to the control loop for neighbor-cache learning.
    Reply { dest: Ipv6Addr, solicited: bool, learn: Option<Mac> },
    /// The target does not resolve to a LOCAL nexthop on the receiving
    /// interface; the data plane silently ignores the packet.
    Ignore,
}

/// Validate an incoming Neighbor Solicitation per RFC 4861 §7.1.1 and
/// decide how to answer it. `ip_hop_limit` is the IPv6 header's hop
/// limit (validated here since NDP integrity requires hop-limit 255,
/// not something the ICMPv6 payload itself carries). Code and minimum
/// length are already enforced by [`NeighborSolicitation::from_icmp6_bytes`].
/// Whether the target is actually `LOCAL` on the receiving interface is
/// the caller's concern (it owns the nexthop pool); pass `target_is_local`.
///
/// # Errors
/// `ProtocolViolation` for a bad hop limit, a multicast target, or a
/// source-lladdr option accompanying an unspecified source (RFC 4861
/// §7.1.1 explicitly forbids the combination).
pub fn validate_ns(
    ip_hop_limit: u8,
    ip_src: Ipv6Addr,
    ip_dst: Ipv6Addr,
    ns: &NeighborSolicitation,
    target_is_local: bool,
) -> Result<NsDisposition, NhError> {
    if ip_hop_limit != NDP_HOP_LIMIT {
        return Err(NhError::protocol_violation(format!("ns hop limit {ip_hop_limit} != 255")));
    }
    if ns.target.is_multicast() {
        return Err(NhError::protocol_violation("ns target address is multicast"));
    }
    if !target_is_local {
        return Ok(NsDisposition::Ignore);
    }
    if ip_src.is_unspecified() {
        let expected_dst = solicited_node_multicast(&ns.target);
        if ip_dst != expected_dst {
            return Err(NhError::protocol_violation("ns from unspecified source not sent to solicited-node multicast"));
        }
        if ns.source_lladdr.is_some() {
            return Err(NhError::protocol_violation("ns from unspecified source carries a source-lladdr option"));
        }
        Ok(NsDisposition::Reply {
            dest: ALL_NODES_LINK_LOCAL,
            solicited: false,
            learn: None,
        })
    } else {
        Ok(NsDisposition::Reply {
            dest: ip_src,
            solicited: true,
            learn: ns.source_lladdr,
        })
    }
}

/// Build the Neighbor Advertisement reply bytes (IPv6 header + ICMPv6
/// NA), source-addressed as `target` (the address being confirmed),
/// with `Router` and `Override` set per spec §4.E.
#[must_use]
pub fn build_na_reply(local_mac: Mac, target: Ipv6Addr, dest: Ipv6Addr, solicited: bool) -> Vec<u8> {
    let na = NeighborAdvertisement {
        router: true,
        solicited,
        override_flag: true,
        target,
        target_lladdr: Some(local_mac),
    };
    let icmp_bytes = na.to_icmp6_bytes(&target, &dest);
    #[allow(clippy::cast_possible_truncation)]
    let ip_header = net::ipv6::Ipv6Header {
        traffic_class: 0,
        flow_label: 0,
        payload_length: icmp_bytes.len() as u16,
        next_header: net::ipv6::NEXT_HEADER_ICMPV6,
        hop_limit: NDP_HOP_LIMIT,
        source: target,
        destination: dest,
    };
    let mut out = ip_header.to_bytes().to_vec();
    out.extend_from_slice(&icmp_bytes);
    out
}

/// What the data plane should do with a validated incoming ARP frame.
pub enum ArpDisposition {
    /// Reply to the sender with our link-layer address.
    Reply,
    /// Nothing to answer (a reply packet, or a request for an address
    /// we don't own), but the sender's `(IP, MAC)` should still be
    /// learned (spec §4.E: "learn sender's (IP, MAC) on reception").
    LearnOnly,
    Ignore,
}

/// Decide how to handle an incoming ARP packet. `target_is_local` is
/// whether `pkt.target_ip` is assigned to the receiving interface.
#[must_use]
pub fn classify_arp(pkt: &ArpPacket, target_is_local: bool) -> ArpDisposition {
    match pkt.op {
        ArpOp::Request if target_is_local => ArpDisposition::Reply,
        ArpOp::Request | ArpOp::Reply => ArpDisposition::LearnOnly,
        ArpOp::Other(_) => ArpDisposition::Ignore,
    }
}

/// Build an ARP reply to `pkt`, a request for `local_ip`/`local_mac`.
#[must_use]
pub fn build_arp_reply(local_mac: Mac, local_ip: Ipv4Addr, pkt: &ArpPacket) -> [u8; net::arp::ARP_PACKET_LEN] {
    ArpPacket::reply(local_mac, local_ip, pkt.sender_mac, pkt.sender_ip).to_bytes()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ns_with_bad_hop_limit_is_protocol_violation() {
        let ns = NeighborSolicitation {
            target: "fe80::1".parse().unwrap(),
            source_lladdr: None,
        };
        let err = validate_ns(64, "fe80::2".parse().unwrap(), "fe80::1".parse().unwrap(), &ns, true).unwrap_err();
        assert_eq!(err.kind, errno::ErrorKind::ProtocolViolation);
    }

    #[test]
    fn ns_from_unspecified_source_replies_multicast_unsolicited() {
        let target: Ipv6Addr = "fe80::1".parse().unwrap();
        let mcast = solicited_node_multicast(&target);
        let ns = NeighborSolicitation {
            target,
            source_lladdr: None,
        };
        let disposition = validate_ns(NDP_HOP_LIMIT, "::".parse().unwrap(), mcast, &ns, true).unwrap();
        match disposition {
            NsDisposition::Reply { dest, solicited, learn } => {
                assert_eq!(dest, ALL_NODES_LINK_LOCAL);
                assert!(!solicited);
                assert!(learn.is_none());
            }
            NsDisposition::Ignore => panic!("expected a reply"),
        }
    }

    #[test]
    fn ns_from_unspecified_source_with_lladdr_option_is_rejected() {
        let target: Ipv6Addr = "fe80::1".parse().unwrap();
        let mcast = solicited_node_multicast(&target);
        let ns = NeighborSolicitation {
            target,
            source_lladdr: Some(Mac([1; 6])),
        };
        let err = validate_ns(NDP_HOP_LIMIT, "::".parse().unwrap(), mcast, &ns, true).unwrap_err();
        assert_eq!(err.kind, errno::ErrorKind::ProtocolViolation);
    }

    #[test]
    fn ns_unicast_reply_surfaces_lladdr_for_learning() {
        let ns = NeighborSolicitation {
            target: "fe80::1".parse().unwrap(),
            source_lladdr: Some(Mac([2; 6])),
        };
        let disposition = validate_ns(NDP_HOP_LIMIT, "fe80::2".parse().unwrap(), "fe80::1".parse().unwrap(), &ns, true).unwrap();
        match disposition {
            NsDisposition::Reply { dest, solicited, learn } => {
                assert_eq!(dest, "fe80::2".parse::<Ipv6Addr>().unwrap());
                assert!(solicited);
                assert_eq!(learn, Some(Mac([2; 6])));
            }
            NsDisposition::Ignore => panic!("expected a reply"),
        }
    }

    #[test]
    fn ns_for_non_local_target_is_ignored() {
        let ns = NeighborSolicitation {
            target: "fe80::1".parse().unwrap(),
            source_lladdr: None,
        };
        let disposition = validate_ns(NDP_HOP_LIMIT, "fe80::2".parse().unwrap(), "fe80::1".parse().unwrap(), &ns, false).unwrap();
        assert!(matches!(disposition, NsDisposition::Ignore));
    }

    #[test]
    fn arp_request_for_local_target_replies() {
        let pkt = ArpPacket::request(Mac([1; 6]), Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1));
        assert!(matches!(classify_arp(&pkt, true), ArpDisposition::Reply));
    }

    #[test]
    fn arp_request_for_foreign_target_is_learn_only() {
        let pkt = ArpPacket::request(Mac([1; 6]), Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 9));
        assert!(matches!(classify_arp(&pkt, false), ArpDisposition::LearnOnly));
    }
}
