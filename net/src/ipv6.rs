// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A minimal IPv6 base header, sufficient to wrap ICMPv6 Neighbor
//! Discovery traffic. General extension-header chaining is out of
//! scope for this subsystem.

use std::net::Ipv6Addr;

/// Next-header value for ICMPv6.
pub const NEXT_HEADER_ICMPV6: u8 = 58;
/// Hop limit NDP mandates for all Neighbor Discovery traffic (RFC 4861 §7.1.1/§7.1.2).
pub const NDP_HOP_LIMIT: u8 = 255;

/// Length of the fixed IPv6 header in bytes.
pub const IPV6_HEADER_LEN: usize = 40;

/// A fixed (no extension headers) IPv6 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

/// Error returned when decoding a truncated or malformed IPv6 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Ipv6HeaderError {
    #[error("buffer too short for an ipv6 header: need {IPV6_HEADER_LEN}, got {0}")]
    Truncated(usize),
    #[error("not an ipv6 packet: version field was {0}, expected 6")]
    WrongVersion(u8),
}

impl Ipv6Header {
    /// Encode this header to exactly [`IPV6_HEADER_LEN`] bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; IPV6_HEADER_LEN] {
        let mut buf = [0u8; IPV6_HEADER_LEN];
        let vtc_fl: u32 = (6u32 << 28) | (u32::from(self.traffic_class) << 20) | (self.flow_label & 0x000f_ffff);
        buf[0..4].copy_from_slice(&vtc_fl.to_be_bytes());
        buf[4..6].copy_from_slice(&self.payload_length.to_be_bytes());
        buf[6] = self.next_header;
        buf[7] = self.hop_limit;
        buf[8..24].copy_from_slice(&self.source.octets());
        buf[24..40].copy_from_slice(&self.destination.octets());
        buf
    }

    /// Decode a header from the front of `buf`.
    ///
    /// # Errors
    /// Returns [`Ipv6HeaderError`] if `buf` is shorter than
    /// [`IPV6_HEADER_LEN`] or the version nibble is not 6.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Ipv6HeaderError> {
        if buf.len() < IPV6_HEADER_LEN {
            return Err(Ipv6HeaderError::Truncated(buf.len()));
        }
        let vtc_fl = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let version = (vtc_fl >> 28) as u8;
        if version != 6 {
            return Err(Ipv6HeaderError::WrongVersion(version));
        }
        let traffic_class = ((vtc_fl >> 20) & 0xff) as u8;
        let flow_label = vtc_fl & 0x000f_ffff;
        let payload_length = u16::from_be_bytes([buf[4], buf[5]]);
        let next_header = buf[6];
        let hop_limit = buf[7];
        let mut src = [0u8; 16];
        src.copy_from_slice(&buf[8..24]);
        let mut dst = [0u8; 16];
        dst.copy_from_slice(&buf[24..40]);
        Ok(Self {
            traffic_class,
            flow_label,
            payload_length,
            next_header,
            hop_limit,
            source: Ipv6Addr::from(src),
            destination: Ipv6Addr::from(dst),
        })
    }
}
