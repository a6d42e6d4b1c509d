// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(clippy::all)]

//! Neighbor resolution: IPv4 ARP and IPv6 NDP state, the nexthop pool
//! backing it, and the control/data-plane bridge that drives the
//! resolution state machine from packet traffic (see each module for
//! its slice of the design).
//!
//! A typical embedding builds a [`config::NhConfig`], a
//! [`bridge::bridge`] pair, and a [`control::NeighborController`] at
//! startup, wires the data-plane graph nodes to `Poster::post_to_stack`
//! for misses and learned probes, and calls
//! [`control::NeighborController::drain_bridge`] /
//! [`control::NeighborController::run_timers`] from the control loop's
//! event cycle. Operators drive [`ctl::NeighborController::nh_add`] /
//! `nh_del` / `nh_list` directly against the same context.

pub mod bridge;
pub mod collab;
pub mod config;
pub mod control;
pub mod ctl;
pub mod error;
pub mod flags;
pub mod handle;
pub mod held;
pub mod nexthop;
pub mod pool;
pub mod receive;
pub mod solicit;

pub use config::NhConfig;
pub use control::{ControlMsg, NeighborController, OutboundItem};
pub use error::{NhError, NhResult};
pub use flags::NhFlags;
pub use handle::{NhHandle, NhKey};
