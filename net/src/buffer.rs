// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet buffer traits abstracting over a mutable, headroom/tailroom
//! aware byte buffer, so the rest of this crate does not need to know
//! whether it is writing into mbuf-backed memory from the packet graph
//! runtime or a plain `Vec<u8>` in tests.

/// Read-only access to a packet buffer's occupied region.
pub trait PacketBuffer {
    /// The occupied bytes, headroom and tailroom excluded.
    fn data(&self) -> &[u8];

    /// Bytes currently available for [`PacketBufferMut::prepend`] without
    /// reallocating.
    fn headroom(&self) -> usize;

    /// Bytes currently available for [`PacketBufferMut::append`] without
    /// reallocating.
    fn tailroom(&self) -> usize;
}

/// Mutable access, allowing data to be grown at either end.
pub trait PacketBufferMut: PacketBuffer {
    /// Mutable view of the occupied region.
    fn data_mut(&mut self) -> &mut [u8];

    /// Write `bytes` immediately before the current data, consuming
    /// headroom. Returns `false` without modifying the buffer if
    /// `bytes.len() > self.headroom()`.
    #[must_use]
    fn prepend(&mut self, bytes: &[u8]) -> bool;

    /// Write `bytes` immediately after the current data, consuming
    /// tailroom. Returns `false` without modifying the buffer if
    /// `bytes.len() > self.tailroom()`.
    #[must_use]
    fn append(&mut self, bytes: &[u8]) -> bool;
}

/// A fixed-capacity, `Vec`-backed buffer with headroom/tailroom, used by
/// this crate's own tests and suitable for any caller without an mbuf
/// pool of its own.
#[derive(Debug, Clone)]
pub struct OwnedBuffer {
    storage: Vec<u8>,
    start: usize,
    end: usize,
}

impl OwnedBuffer {
    /// Build an empty buffer with `headroom` bytes reserved before the
    /// data and `tailroom` bytes reserved after it.
    #[must_use]
    pub fn new(headroom: usize, tailroom: usize) -> Self {
        Self {
            storage: vec![0u8; headroom + tailroom],
            start: headroom,
            end: headroom,
        }
    }

    /// Wrap `data` with no spare headroom/tailroom.
    #[must_use]
    pub fn from_data(data: Vec<u8>) -> Self {
        let end = data.len();
        Self {
            storage: data,
            start: 0,
            end,
        }
    }
}

impl PacketBuffer for OwnedBuffer {
    fn data(&self) -> &[u8] {
        &self.storage[self.start..self.end]
    }

    fn headroom(&self) -> usize {
        self.start
    }

    fn tailroom(&self) -> usize {
        self.storage.len() - self.end
    }
}

impl PacketBufferMut for OwnedBuffer {
    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.end]
    }

    fn prepend(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.headroom() {
            return false;
        }
        self.start -= bytes.len();
        self.storage[self.start..self.start + bytes.len()].copy_from_slice(bytes);
        true
    }

    fn append(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.tailroom() {
            return false;
        }
        self.storage[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prepend_then_append_respects_room() {
        let mut buf = OwnedBuffer::new(8, 8);
        assert!(buf.append(&[1, 2, 3]));
        assert!(buf.prepend(&[9, 9]));
        assert_eq!(buf.data(), &[9, 9, 1, 2, 3]);
        assert_eq!(buf.headroom(), 6);
        assert_eq!(buf.tailroom(), 5);
    }

    #[test]
    fn prepend_fails_without_headroom() {
        let mut buf = OwnedBuffer::new(1, 0);
        assert!(!buf.prepend(&[1, 2]));
        assert!(buf.data().is_empty());
    }

    #[test]
    fn from_data_has_no_spare_room() {
        let buf = OwnedBuffer::from_data(vec![1, 2, 3]);
        assert_eq!(buf.headroom(), 0);
        assert_eq!(buf.tailroom(), 0);
        assert_eq!(buf.data(), &[1, 2, 3]);
    }
}
