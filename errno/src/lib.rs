// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(clippy::all)]

//! A small, POSIX-errno-flavored kind enum shared by every fallible
//! operation in the neighbor-resolution subsystem, so that operator RPC
//! responses can map a [`ErrorKind`] straight onto the numeric error
//! codes a CLI client expects.

/// The kind of failure behind a [`crate::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An argument was structurally invalid (bad prefix length, wrong
    /// address family for the interface, zero/multicast address, ...).
    InvalidArg,
    /// The referenced object (nexthop, interface, route) does not exist.
    NotFound,
    /// An object with the same key already exists.
    Exists,
    /// The object cannot be modified or removed right now (e.g. still
    /// referenced, or a conflicting operation is in flight).
    Busy,
    /// A fixed-size pool or queue is full.
    NoCapacity,
    /// The named interface does not exist on this device.
    NoDevice,
    /// A received packet violated the protocol it claimed to carry.
    ProtocolViolation,
    /// A condition that is expected to clear on its own (channel full,
    /// would block); the caller should retry.
    Transient,
}

impl ErrorKind {
    /// The nearest POSIX errno number, for operator RPC responses.
    #[must_use]
    pub fn as_errno(self) -> i32 {
        match self {
            ErrorKind::InvalidArg => libc_errno::EINVAL,
            ErrorKind::NotFound => libc_errno::ENOENT,
            ErrorKind::Exists => libc_errno::EEXIST,
            ErrorKind::Busy => libc_errno::EBUSY,
            ErrorKind::NoCapacity => libc_errno::ENOSPC,
            ErrorKind::NoDevice => libc_errno::ENODEV,
            ErrorKind::ProtocolViolation => libc_errno::EPROTO,
            ErrorKind::Transient => libc_errno::EAGAIN,
        }
    }
}

/// Numeric errno constants, kept local so this crate does not need a
/// dependency on `libc` for eight integers.
mod libc_errno {
    pub const EINVAL: i32 = 22;
    pub const ENOENT: i32 = 2;
    pub const EEXIST: i32 = 17;
    pub const EBUSY: i32 = 16;
    pub const ENOSPC: i32 = 28;
    pub const ENODEV: i32 = 19;
    pub const EPROTO: i32 = 71;
    pub const EAGAIN: i32 = 11;
}

/// A classified, displayable error carrying both a [`ErrorKind`] and a
/// human-readable context message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    /// Build an error, capturing `message` lazily via `Into<String>`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn errno_mapping_is_stable() {
        assert_eq!(ErrorKind::NotFound.as_errno(), 2);
        assert_eq!(ErrorKind::Exists.as_errno(), 17);
        assert_eq!(ErrorKind::NoCapacity.as_errno(), 28);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::new(ErrorKind::Busy, "nexthop still referenced");
        assert_eq!(err.to_string(), "Busy: nexthop still referenced");
    }
}
