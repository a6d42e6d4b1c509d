// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The per-nexthop resolution state machine (spec §4.C).
//!
//! Mutation happens only on the control loop; data-plane workers read
//! [`Nexthop::published`] for a release-acquire-consistent snapshot of
//! `{flags, lladdr}` — the control loop writes `lladdr` into the
//! snapshot before setting `REACHABLE` in the same store, so a reader
//! that observes `REACHABLE` always observes the matching `lladdr`.

use crate::config::NhConfig;
use crate::flags::NhFlags;
use crate::handle::NhKey;
use crate::held::HeldQueue;
use concurrency::Published;
use net::Mac;
use std::sync::Arc;
use std::time::Instant;

/// The mutually-exclusive macro-state a nexthop's flags compose into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    Pending,
    Reachable,
    Stale,
    Failed,
}

impl State {
    /// Derive the display/decision macro-state from raw flags. `FAILED`
    /// takes priority, then `REACHABLE` (with `STALE` distinguishing the
    /// aged variant even if a background re-probe has also set
    /// `PENDING`), then bare `PENDING`, else `NEW`.
    #[must_use]
    pub fn from_flags(flags: NhFlags) -> Self {
        if flags.contains(NhFlags::FAILED) {
            State::Failed
        } else if flags.contains(NhFlags::REACHABLE) {
            if flags.contains(NhFlags::STALE) {
                State::Stale
            } else {
                State::Reachable
            }
        } else if flags.contains(NhFlags::PENDING) {
            State::Pending
        } else {
            State::New
        }
    }
}

/// The cross-thread-published half of a nexthop's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub flags: NhFlags,
    pub lladdr: Option<Mac>,
}

/// The outcome of a data-plane miss against this nexthop (spec §4.C,
/// §4.F step 4). The caller (the control loop) is responsible for
/// actually emitting a solicit or re-injecting the packet; this type
/// only reports which of those the state transition calls for.
pub enum MissOutcome<T> {
    /// Already `REACHABLE`: hand `pkt` straight back for re-injection.
    Reinject(T),
    /// `pkt` was queued. Emit a solicit now iff `solicit`.
    Enqueued { solicit: bool },
    /// The hold queue was full; `pkt` is returned to drop (the caller
    /// bumps an overflow counter). Emit a solicit now iff `solicit`.
    Overflow { pkt: T, solicit: bool },
}

/// The outcome of a probe-retransmission timer firing for this nexthop.
pub enum TimerOutcome<T> {
    /// Send another solicit; `unicast` selects destination/counter.
    SolicitAgain { unicast: bool },
    /// The reachability window elapsed; now `STALE`.
    Staled,
    /// Probes exhausted; promoted to `FAILED`, held packets dropped.
    Failed { dropped: Vec<T> },
    /// Nothing to do this tick.
    NoAction,
}

/// A single forwarding answer for `(vrf, iface, addr)`, plus the
/// machinery to acquire one.
pub struct Nexthop<T> {
    pub key: NhKey,
    current: Snapshot,
    published: Published<Snapshot>,
    pub ref_count: u32,
    pub ucast_probes: u32,
    pub bcast_probes: u32,
    pub last_request: Option<Instant>,
    pub last_reply: Option<Instant>,
    held: HeldQueue<T>,
}

impl<T> Nexthop<T> {
    /// A freshly allocated, unresolved nexthop (`NEW`), carrying the
    /// supplied provenance bits (`STATIC`/`LOCAL`/`LINK`/`GATEWAY`).
    #[must_use]
    pub fn new(key: NhKey, provenance: NhFlags) -> Self {
        let current = Snapshot {
            flags: provenance,
            lladdr: None,
        };
        Self {
            key,
            current,
            published: Published::new(current),
            ref_count: 0,
            ucast_probes: 0,
            bcast_probes: 0,
            last_request: None,
            last_reply: None,
            held: HeldQueue::new(),
        }
    }

    /// An operator-added static nexthop: `REACHABLE | STATIC` with the
    /// supplied link-layer address, never mutated by probe receipt.
    #[must_use]
    pub fn new_static(key: NhKey, provenance: NhFlags, lladdr: Mac) -> Self {
        let mut nh = Self::new(key, provenance | NhFlags::STATIC);
        nh.current.lladdr = Some(lladdr);
        nh.current.flags.insert(NhFlags::REACHABLE);
        nh.publish();
        nh
    }

    fn publish(&mut self) {
        self.published.store(self.current);
    }

    #[must_use]
    pub fn state(&self) -> State {
        State::from_flags(self.current.flags)
    }

    #[must_use]
    pub fn flags(&self) -> NhFlags {
        self.current.flags
    }

    #[must_use]
    pub fn lladdr(&self) -> Option<Mac> {
        self.current.lladdr
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.current.flags.contains(NhFlags::STATIC)
    }

    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// The published snapshot, for a data-plane reader.
    #[must_use]
    pub fn published(&self) -> Arc<Snapshot> {
        self.published.load()
    }

    /// Whether an operator `NH_DEL` is currently permitted (spec
    /// invariant 7 / §4.C operator-delete transition).
    #[must_use]
    pub fn is_deletable(&self) -> bool {
        !self.current.flags.is_protected() && self.ref_count <= 1
    }

    /// Strip provenance bits `bits` from this nexthop's flags, e.g. when
    /// the route that granted them is withdrawn. Republishes the
    /// snapshot so a data-plane reader never observes a stale
    /// protection bit.
    pub fn clear_flags(&mut self, bits: NhFlags) {
        self.current.flags.remove(bits);
        self.publish();
    }

    /// Whether the *next* solicit for this nexthop should be unicast
    /// (to its last-known lladdr) rather than broadcast/multicast: the
    /// source's output logic sends unicast only once a reply has ever
    /// been seen and the unicast probe budget is not yet spent. Does
    /// not itself consume any of that budget; [`Self::handle_timer`]
    /// does that accounting for retransmits.
    #[must_use]
    pub fn next_probe_is_unicast(&self, cfg: &NhConfig) -> bool {
        self.last_reply.is_some() && self.ucast_probes < cfg.ucast_probes
    }

    /// spec §4.C "data-plane miss" event / §4.F step 4.
    pub fn handle_miss(&mut self, now: Instant, pkt: T, cfg: &NhConfig) -> MissOutcome<T> {
        match self.state() {
            State::Reachable => MissOutcome::Reinject(pkt),
            State::New | State::Failed => {
                self.current.flags.remove(NhFlags::FAILED);
                self.current.flags.insert(NhFlags::PENDING);
                self.last_request = Some(now);
                self.publish();
                self.enqueue_or_overflow(pkt, true)
            }
            State::Pending => {
                let solicit = self.last_request.is_none_or(|t| now.duration_since(t) >= cfg.retrans_time);
                if solicit {
                    self.last_request = Some(now);
                }
                self.enqueue_or_overflow(pkt, solicit)
            }
            State::Stale => {
                self.current.flags.insert(NhFlags::PENDING);
                self.publish();
                MissOutcome::Reinject(pkt)
            }
        }
    }

    fn enqueue_or_overflow(&mut self, pkt: T, solicit: bool) -> MissOutcome<T> {
        match self.held.enqueue(pkt) {
            Ok(()) => MissOutcome::Enqueued { solicit },
            Err(pkt) => MissOutcome::Overflow { pkt, solicit },
        }
    }

    /// spec §4.C "probe reply received" event. Returns the flushed hold
    /// queue in enqueue order, empty if this nexthop is `STATIC` (the
    /// reply is ignored entirely, per spec invariant 5) or nothing was
    /// held.
    pub fn handle_reply(&mut self, now: Instant, lladdr: Mac) -> Vec<T> {
        if self.is_static() {
            return Vec::new();
        }
        self.current.lladdr = Some(lladdr);
        self.current.flags.remove(NhFlags::STALE | NhFlags::PENDING | NhFlags::FAILED);
        self.current.flags.insert(NhFlags::REACHABLE);
        self.ucast_probes = 0;
        self.bcast_probes = 0;
        self.last_reply = Some(now);
        self.publish();
        self.held.drain().collect()
    }

    /// spec §4.C "probe timer expiry" event.
    pub fn handle_timer(&mut self, now: Instant, cfg: &NhConfig) -> TimerOutcome<T> {
        match self.state() {
            State::Pending => self.retry_or_fail(now, cfg),
            State::Stale if self.current.flags.contains(NhFlags::PENDING) => self.retry_or_fail(now, cfg),
            State::Reachable => {
                if self.last_reply.is_some_and(|t| now.duration_since(t) > cfg.reachable_time) {
                    self.current.flags.insert(NhFlags::STALE);
                    self.publish();
                    TimerOutcome::Staled
                } else {
                    TimerOutcome::NoAction
                }
            }
            State::New | State::Stale | State::Failed => TimerOutcome::NoAction,
        }
    }

    fn retry_or_fail(&mut self, now: Instant, cfg: &NhConfig) -> TimerOutcome<T> {
        if self.ucast_probes + self.bcast_probes < cfg.max_probes {
            let unicast = self.next_probe_is_unicast(cfg);
            if unicast {
                self.ucast_probes += 1;
            } else {
                self.bcast_probes += 1;
            }
            self.last_request = Some(now);
            self.publish();
            TimerOutcome::SolicitAgain { unicast }
        } else {
            self.current.flags.remove(NhFlags::REACHABLE | NhFlags::STALE | NhFlags::PENDING);
            self.current.flags.insert(NhFlags::FAILED);
            self.publish();
            TimerOutcome::Failed {
                dropped: self.held.drain().collect(),
            }
        }
    }
}
