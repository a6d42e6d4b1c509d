// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(clippy::all)]

//! Lock-free publication of small, frequently-read, infrequently-written
//! snapshots from a single control-plane writer to many data-plane
//! readers.
//!
//! A [`Published`] cell is built on [`arc_swap::ArcSwap`]: a writer
//! swaps in a new `Arc<T>` under a lock, while readers load a fresh
//! `Arc<T>` with a single atomic operation and no contention with each
//! other or with the writer. This gives every reader a consistent,
//! wholly-written snapshot of `T` — never a torn mix of an old and a
//! new write — which matters for data such as a nexthop's resolved
//! flags and link-layer address, where a reader must never observe a
//! new address paired with a stale set of flags or vice versa.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// A single-writer, multi-reader published snapshot of `T`.
pub struct Published<T> {
    inner: ArcSwap<T>,
}

impl<T> Published<T> {
    /// Publish an initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Load the most recently published snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Publish a new snapshot, making it immediately visible to
    /// subsequent loads on any thread.
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Publish a snapshot derived from the current one, without
    /// allowing a concurrent writer's update to be lost: `f` is applied
    /// to a freshly-loaded value and the result is stored back as one
    /// atomic swap. Since there is at most one writer by construction
    /// (the control-plane thread owning this nexthop), this is not a
    /// compare-and-swap retry loop — it simply saves callers from
    /// loading and storing by hand.
    pub fn rcu(&self, f: impl FnOnce(&T) -> T) {
        let current = self.load();
        self.store(f(&current));
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Published").field("inner", &*self.load()).finish()
    }
}
