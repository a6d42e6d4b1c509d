// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The one-way, non-blocking hand-off between data-plane workers and
//! the single-threaded control loop (spec §4.F), and the reverse
//! control-to-data re-injection path.
//!
//! The source dispatches by a runtime-registered handler name string.
//! That lookup is replaced with a plain typed channel per direction
//! (spec §9: "model as a typed message channel per target node;
//! eliminates name-string lookups at runtime"), backed by a bounded
//! `kanal` channel: `try_send` never blocks a data-plane worker, and a
//! full channel is reported to the caller as [`crate::error::NhError`]
//! of kind `Transient` rather than ever waiting.

use crate::error::NhError;

/// The data-plane-facing half of a bridge: cheap to clone, one per
/// worker thread.
#[derive(Clone)]
pub struct Poster<M> {
    tx: kanal::Sender<M>,
}

impl<M> Poster<M> {
    /// Enqueue `msg` for the control loop. Never blocks: a full channel
    /// returns `Transient` and the caller drops the packet, bumping its
    /// own overflow counter (spec §5 backpressure policy).
    pub fn post_to_stack(&self, msg: M) -> Result<(), NhError> {
        match self.tx.try_send(msg) {
            Ok(true) => Ok(()),
            Ok(false) => Err(NhError::transient("post_to_stack: bridge ring full")),
            Err(_) => Err(NhError::transient("post_to_stack: control loop gone")),
        }
    }
}

/// The control-loop-facing half: owned by the single consumer.
pub struct Inbox<M> {
    rx: kanal::Receiver<M>,
}

impl<M> Inbox<M> {
    /// Drain everything currently queued without blocking. Posts from a
    /// given worker to this inbox are observed in issue order; there is
    /// no ordering guarantee across workers (spec §5).
    pub fn drain(&self) -> Vec<M> {
        let mut out = Vec::new();
        while let Ok(Some(msg)) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}

/// Build a bounded data-plane-to-control-loop bridge of `capacity`
/// slots.
#[must_use]
pub fn bridge<M>(capacity: usize) -> (Poster<M>, Inbox<M>) {
    let (tx, rx) = kanal::bounded(capacity);
    (Poster { tx }, Inbox { rx })
}

/// A single target node's input ring for control-to-data re-injection.
/// Functionally identical to the data-to-control direction, but kept as
/// a distinct type so a node's output edge and the bridge's control
/// inbox are never accidentally swapped at a call site.
pub struct StackChannel<T> {
    tx: kanal::Sender<T>,
    rx: kanal::Receiver<T>,
}

impl<T> StackChannel<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = kanal::bounded(capacity);
        Self { tx, rx }
    }

    /// A cheap-to-clone handle the control loop hands to itself (or to
    /// another thread) to inject packets into this node.
    #[must_use]
    pub fn injector(&self) -> Poster<T> {
        Poster { tx: self.tx.clone() }
    }

    /// Drained by the node's own next burst.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(Some(msg)) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }
}
