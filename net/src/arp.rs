// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ARP (RFC 826) request/reply encoding for Ethernet/IPv4.

use crate::eth::mac::Mac;
use std::net::Ipv4Addr;

/// Hardware type for Ethernet.
pub const HTYPE_ETHERNET: u16 = 1;
/// Protocol type for IPv4.
pub const PTYPE_IPV4: u16 = 0x0800;
/// Wire length of an ARP packet for Ethernet/IPv4.
pub const ARP_PACKET_LEN: usize = 28;

/// ARP operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
    /// Any opcode this implementation does not act on.
    Other(u16),
}

impl From<u16> for ArpOp {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }
}

impl From<ArpOp> for u16 {
    fn from(op: ArpOp) -> Self {
        match op {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
            ArpOp::Other(v) => v,
        }
    }
}

/// A parsed or to-be-built Ethernet/IPv4 ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: Mac,
    pub sender_ip: Ipv4Addr,
    pub target_mac: Mac,
    pub target_ip: Ipv4Addr,
}

/// Error returned when decoding a malformed ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArpError {
    #[error("buffer too short for an arp packet: need {ARP_PACKET_LEN}, got {0}")]
    Truncated(usize),
    #[error("unsupported hardware/protocol type combination (htype={0}, ptype={1:#x})")]
    UnsupportedAddressFamily(u16, u16),
    #[error("hardware/protocol address length mismatch (hlen={0}, plen={1})")]
    BadAddressLength(u8, u8),
}

impl ArpPacket {
    /// Encode to the fixed 28-byte Ethernet/IPv4 ARP wire format.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ARP_PACKET_LEN] {
        let mut buf = [0u8; ARP_PACKET_LEN];
        buf[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        buf[4] = 6; // hardware address length
        buf[5] = 4; // protocol address length
        buf[6..8].copy_from_slice(&u16::from(self.op).to_be_bytes());
        buf[8..14].copy_from_slice(self.sender_mac.as_ref());
        buf[14..18].copy_from_slice(&self.sender_ip.octets());
        buf[18..24].copy_from_slice(self.target_mac.as_ref());
        buf[24..28].copy_from_slice(&self.target_ip.octets());
        buf
    }

    /// Decode a packet from the front of `buf`.
    ///
    /// # Errors
    /// Returns [`ArpError`] for a truncated buffer, an address family
    /// other than Ethernet/IPv4, or an inconsistent address length.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ArpError> {
        if buf.len() < ARP_PACKET_LEN {
            return Err(ArpError::Truncated(buf.len()));
        }
        let htype = u16::from_be_bytes([buf[0], buf[1]]);
        let ptype = u16::from_be_bytes([buf[2], buf[3]]);
        if htype != HTYPE_ETHERNET || ptype != PTYPE_IPV4 {
            return Err(ArpError::UnsupportedAddressFamily(htype, ptype));
        }
        let (hlen, plen) = (buf[4], buf[5]);
        if hlen != 6 || plen != 4 {
            return Err(ArpError::BadAddressLength(hlen, plen));
        }
        let op = ArpOp::from(u16::from_be_bytes([buf[6], buf[7]]));
        let sender_mac = Mac([buf[8], buf[9], buf[10], buf[11], buf[12], buf[13]]);
        let sender_ip = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
        let target_mac = Mac([buf[18], buf[19], buf[20], buf[21], buf[22], buf[23]]);
        let target_ip = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);
        Ok(Self {
            op,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    /// Build a request soliciting the link-layer address of `target_ip`.
    #[must_use]
    pub fn request(sender_mac: Mac, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: Mac::ZERO,
            target_ip,
        }
    }

    /// Build a reply to a request whose sender is `req_sender_{mac,ip}`.
    #[must_use]
    pub fn reply(local_mac: Mac, local_ip: Ipv4Addr, req_sender_mac: Mac, req_sender_ip: Ipv4Addr) -> Self {
        Self {
            op: ArpOp::Reply,
            sender_mac: local_mac,
            sender_ip: local_ip,
            target_mac: req_sender_mac,
            target_ip: req_sender_ip,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips() {
        let pkt = ArpPacket::request(
            Mac([0xaa; 6]),
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let bytes = pkt.to_bytes();
        assert_eq!(ArpPacket::from_bytes(&bytes).unwrap(), pkt);
    }

    #[test]
    fn rejects_non_ethernet_ipv4() {
        let mut buf = [0u8; ARP_PACKET_LEN];
        buf[0..2].copy_from_slice(&6u16.to_be_bytes());
        buf[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        assert!(matches!(
            ArpPacket::from_bytes(&buf),
            Err(ArpError::UnsupportedAddressFamily(6, _))
        ));
    }
}
