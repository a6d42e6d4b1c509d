// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ICMPv6 Neighbor Discovery (RFC 4861) Neighbor Solicitation and
//! Neighbor Advertisement messages, including the source/target
//! link-layer address options.
//!
//! The base ICMPv6 header (type/code/checksum) is not routed through a
//! generic multi-type ICMPv6 abstraction: NS/NA bodies (the
//! reserved/flags word, the target address, and options) live below
//! the layer the teacher's own ICMPv6 wrapper stops at (see
//! `net/src/icmp6/mod.rs` in the teacher repo: "We don't currently
//! support parsing below the Icmp6 layer"), so they are encoded here
//! directly.

use crate::checksum::icmpv6_checksum;
use crate::eth::mac::Mac;
use std::net::Ipv6Addr;

/// ICMPv6 type for a Neighbor Solicitation.
pub const ICMP6_TYPE_NEIGHBOR_SOLICITATION: u8 = 135;
/// ICMPv6 type for a Neighbor Advertisement.
pub const ICMP6_TYPE_NEIGHBOR_ADVERTISEMENT: u8 = 136;

const OPT_SOURCE_LLADDR: u8 = 1;
const OPT_TARGET_LLADDR: u8 = 2;

/// Minimum valid NS message length per RFC 4861 §7.1.1: ICMP header (4)
/// + reserved (4) + target address (16) = 24 octets, before options.
pub const NS_MIN_LEN: usize = 24;
/// Minimum valid NA message length: identical layout to NS.
pub const NA_MIN_LEN: usize = 24;

/// A Neighbor Solicitation body (the ICMPv6 base header is carried
/// alongside, not inside, this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSolicitation {
    pub target: Ipv6Addr,
    pub source_lladdr: Option<Mac>,
}

/// A Neighbor Advertisement body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborAdvertisement {
    pub router: bool,
    pub solicited: bool,
    pub override_flag: bool,
    pub target: Ipv6Addr,
    pub target_lladdr: Option<Mac>,
}

/// Error returned decoding a malformed Neighbor Discovery message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NdpError {
    #[error("icmp6 payload too short for a neighbor discovery message: need at least {min}, got {got}")]
    Truncated { min: usize, got: usize },
    #[error("icmp6 type {0} is not a neighbor solicitation/advertisement")]
    WrongType(u8),
    #[error("icmp6 code must be 0, got {0}")]
    WrongCode(u8),
    #[error("option has a declared length of zero octets")]
    ZeroLengthOption,
    #[error("option is truncated")]
    TruncatedOption,
}

/// Append one lladdr option (8 bytes: type, length=1, then the MAC).
fn push_lladdr_option(buf: &mut Vec<u8>, opt_type: u8, mac: Mac) {
    buf.push(opt_type);
    buf.push(1); // length in units of 8 octets
    buf.extend_from_slice(mac.as_ref());
}

/// Scan the options area of an NS/NA payload (starting at byte 24) for
/// the lladdr option of type `opt_type`. Returns `Ok(None)` if absent.
fn find_lladdr_option(opts: &[u8], opt_type: u8) -> Result<Option<Mac>, NdpError> {
    let mut i = 0;
    while i + 1 < opts.len() {
        let t = opts[i];
        let len_units = opts[i + 1];
        if len_units == 0 {
            return Err(NdpError::ZeroLengthOption);
        }
        let len_bytes = usize::from(len_units) * 8;
        if i + len_bytes > opts.len() {
            return Err(NdpError::TruncatedOption);
        }
        if t == opt_type && len_bytes >= 8 {
            return Ok(Some(Mac([
                opts[i + 2],
                opts[i + 3],
                opts[i + 4],
                opts[i + 5],
                opts[i + 6],
                opts[i + 7],
            ])));
        }
        i += len_bytes;
    }
    Ok(None)
}

impl NeighborSolicitation {
    /// Encode the full ICMPv6 message (header + body + options), with
    /// the checksum computed over the supplied IPv6 pseudo-header.
    #[must_use]
    pub fn to_icmp6_bytes(&self, src: &Ipv6Addr, dst: &Ipv6Addr) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&[ICMP6_TYPE_NEIGHBOR_SOLICITATION, 0, 0, 0]); // type, code, checksum placeholder
        buf.extend_from_slice(&[0, 0, 0, 0]); // reserved
        buf.extend_from_slice(&self.target.octets());
        if let Some(mac) = self.source_lladdr {
            push_lladdr_option(&mut buf, OPT_SOURCE_LLADDR, mac);
        }
        let checksum = icmpv6_checksum(src, dst, &buf);
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decode an ICMPv6 message (including the 4-byte base header) into
    /// a Neighbor Solicitation, per the validation steps of RFC 4861
    /// §7.1.1. Does not check the IP hop limit; that is the caller's
    /// responsibility since it lives in the IPv6 header, not here.
    ///
    /// # Errors
    /// See [`NdpError`].
    pub fn from_icmp6_bytes(buf: &[u8]) -> Result<Self, NdpError> {
        if buf.len() < NS_MIN_LEN {
            return Err(NdpError::Truncated {
                min: NS_MIN_LEN,
                got: buf.len(),
            });
        }
        if buf[0] != ICMP6_TYPE_NEIGHBOR_SOLICITATION {
            return Err(NdpError::WrongType(buf[0]));
        }
        if buf[1] != 0 {
            return Err(NdpError::WrongCode(buf[1]));
        }
        let mut target = [0u8; 16];
        target.copy_from_slice(&buf[8..24]);
        let source_lladdr = find_lladdr_option(&buf[24..], OPT_SOURCE_LLADDR)?;
        Ok(Self {
            target: Ipv6Addr::from(target),
            source_lladdr,
        })
    }
}

impl NeighborAdvertisement {
    /// Encode the full ICMPv6 message (header + body + options).
    #[must_use]
    pub fn to_icmp6_bytes(&self, src: &Ipv6Addr, dst: &Ipv6Addr) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&[ICMP6_TYPE_NEIGHBOR_ADVERTISEMENT, 0, 0, 0]);
        let mut flags = 0u8;
        if self.router {
            flags |= 0x80;
        }
        if self.solicited {
            flags |= 0x40;
        }
        if self.override_flag {
            flags |= 0x20;
        }
        buf.extend_from_slice(&[flags, 0, 0, 0]);
        buf.extend_from_slice(&self.target.octets());
        if let Some(mac) = self.target_lladdr {
            push_lladdr_option(&mut buf, OPT_TARGET_LLADDR, mac);
        }
        let checksum = icmpv6_checksum(src, dst, &buf);
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decode an ICMPv6 message into a Neighbor Advertisement.
    ///
    /// # Errors
    /// See [`NdpError`].
    pub fn from_icmp6_bytes(buf: &[u8]) -> Result<Self, NdpError> {
        if buf.len() < NA_MIN_LEN {
            return Err(NdpError::Truncated {
                min: NA_MIN_LEN,
                got: buf.len(),
            });
        }
        if buf[0] != ICMP6_TYPE_NEIGHBOR_ADVERTISEMENT {
            return Err(NdpError::WrongType(buf[0]));
        }
        if buf[1] != 0 {
            return Err(NdpError::WrongCode(buf[1]));
        }
        let flags = buf[4];
        let mut target = [0u8; 16];
        target.copy_from_slice(&buf[8..24]);
        let target_lladdr = find_lladdr_option(&buf[24..], OPT_TARGET_LLADDR)?;
        Ok(Self {
            router: flags & 0x80 != 0,
            solicited: flags & 0x40 != 0,
            override_flag: flags & 0x20 != 0,
            target: Ipv6Addr::from(target),
            target_lladdr,
        })
    }
}

/// The solicited-node multicast address derived from a unicast/anycast
/// target address (RFC 4291 §2.7.1): `ff02::1:ffXX:XXXX` where the low
/// 24 bits come from `target`.
#[must_use]
pub fn solicited_node_multicast(target: &Ipv6Addr) -> Ipv6Addr {
    let o = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | u16::from(o[13]),
        (u16::from(o[14]) << 8) | u16::from(o[15]),
    )
}

/// The all-nodes link-local multicast address, used when replying to an
/// NS from the unspecified address.
pub const ALL_NODES_LINK_LOCAL: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ns_round_trips_with_option() {
        let ns = NeighborSolicitation {
            target: "fe80::2".parse().unwrap(),
            source_lladdr: Some(Mac([0xaa; 6])),
        };
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst = solicited_node_multicast(&ns.target);
        let bytes = ns.to_icmp6_bytes(&src, &dst);
        let decoded = NeighborSolicitation::from_icmp6_bytes(&bytes).unwrap();
        assert_eq!(decoded, ns);
    }

    #[test]
    fn ns_round_trips_without_option() {
        let ns = NeighborSolicitation {
            target: "fe80::2".parse().unwrap(),
            source_lladdr: None,
        };
        let src: Ipv6Addr = "::".parse().unwrap();
        let dst = ALL_NODES_LINK_LOCAL;
        let bytes = ns.to_icmp6_bytes(&src, &dst);
        let decoded = NeighborSolicitation::from_icmp6_bytes(&bytes).unwrap();
        assert_eq!(decoded, ns);
    }

    #[test]
    fn na_round_trips() {
        let na = NeighborAdvertisement {
            router: true,
            solicited: true,
            override_flag: true,
            target: "fe80::1".parse().unwrap(),
            target_lladdr: Some(Mac([0xbb; 6])),
        };
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();
        let bytes = na.to_icmp6_bytes(&src, &dst);
        let decoded = NeighborAdvertisement::from_icmp6_bytes(&bytes).unwrap();
        assert_eq!(decoded, na);
    }

    #[test]
    fn rejects_short_payload() {
        assert!(matches!(
            NeighborSolicitation::from_icmp6_bytes(&[135, 0, 0, 0]),
            Err(NdpError::Truncated { .. })
        ));
    }

    #[test]
    fn solicited_node_multicast_matches_rfc_example() {
        let target: Ipv6Addr = "fe80::1:2".parse().unwrap();
        assert_eq!(solicited_node_multicast(&target), "ff02::1:ff01:2".parse::<Ipv6Addr>().unwrap());
    }
}
