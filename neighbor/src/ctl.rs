// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The operator-facing `NH_ADD` / `NH_DEL` / `NH_LIST` request handlers
//! (spec §6), dispatched against a [`crate::control::NeighborController`].
//!
//! The source registers these as named RPC handlers returning a raw
//! `(errno, response)` pair. Here they are plain methods returning
//! [`crate::error::NhResult`]; `exist_ok`/`missing_ok` fold an
//! `Exists`/`NotFound` error into `Ok(())` at the call site rather than
//! inside the pool, so the pool's own error taxonomy stays honest.

use crate::collab::{GraphRuntime, InterfaceTable, RouteTable};
use crate::config::MAX_VRFS;
use crate::control::{NeighborController, OutboundItem, Packet};
use crate::error::{NhError, NhResult};
use crate::flags::NhFlags;
use crate::handle::NhKey;
use net::packet::{IfaceId, VrfId};
use net::Mac;
use std::net::IpAddr;
use std::time::Instant;

/// `vrf_id` value in an `NH_LIST` request meaning "every VRF".
pub const ALL_VRFS: VrfId = VrfId(u16::MAX as u32);

/// One entry of an `NH_LIST` response (spec §6 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NhListEntry {
    pub addr: IpAddr,
    pub iface: Option<IfaceId>,
    pub vrf: VrfId,
    pub lladdr: Option<Mac>,
    pub flags: NhFlags,
    pub age_seconds: u64,
    pub held_count: usize,
}

fn validate_vrf(vrf: VrfId) -> NhResult<()> {
    if vrf.0 >= MAX_VRFS {
        return Err(NhError::no_capacity(format!("vrf {} out of range (max {MAX_VRFS})", vrf.0)));
    }
    Ok(())
}

impl<R, I, G> NeighborController<R, I, G>
where
    R: RouteTable,
    I: InterfaceTable,
    G: GraphRuntime<OutboundItem>,
{
    /// `NH_ADD`: create a static, immediately `REACHABLE` nexthop with
    /// an operator-supplied link-layer address, and index a host route
    /// pointing at it.
    ///
    /// With `exist_ok`, an add that collides with an existing entry
    /// bearing the identical `(iface, lladdr)` is folded into `Ok(())`
    /// rather than `Exists` (spec §8 round-trip property).
    ///
    /// # Errors
    /// `InvalidArg` for a multicast/unspecified address, `NoCapacity`
    /// for an out-of-range vrf or an exhausted pool, `NoDevice` if
    /// `iface` is unknown, `Exists` for a genuine conflict.
    pub fn nh_add(&mut self, vrf: VrfId, iface: IfaceId, addr: IpAddr, lladdr: Mac, exist_ok: bool) -> NhResult<()> {
        validate_vrf(vrf)?;
        if self.ifaces.iface_from_id(iface).is_none() {
            return Err(NhError::no_device(format!("unknown interface {iface:?}")));
        }

        let key = NhKey::new(vrf, Some(iface), addr);
        let pool = self.pool_mut(addr);
        match pool.allocate_static(key, NhFlags::empty(), lladdr) {
            Ok(handle) => {
                self.routes.route_insert(vrf, Some(iface), addr, host_prefix_len(addr), handle);
                Ok(())
            }
            Err(err) if err.kind == errno::ErrorKind::Exists => {
                if exist_ok {
                    let existing = self.pool(addr).lookup(key).expect("Exists implies indexed");
                    let nh = self.pool(addr).get(existing).expect("just looked up");
                    if nh.lladdr() == Some(lladdr) {
                        return Ok(());
                    }
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// `NH_DEL`: remove a nexthop by `(vrf, addr)` (matching any
    /// interface, per spec §4.A `UNDEF` semantics), refusing with `Busy`
    /// if it is protected (`LOCAL`/`LINK`/`GATEWAY`) or still referenced
    /// by anything beyond this lookup itself.
    ///
    /// With `missing_ok`, a lookup miss is folded into `Ok(())`.
    ///
    /// # Errors
    /// `NoCapacity` for an out-of-range vrf, `NotFound` if no entry
    /// matches (unless `missing_ok`), `Busy` if protected or referenced.
    pub fn nh_del(&mut self, vrf: VrfId, addr: IpAddr, missing_ok: bool) -> NhResult<()> {
        validate_vrf(vrf)?;
        let key = NhKey::new(vrf, None, addr);
        let Some(handle) = self.pool(addr).lookup(key) else {
            return if missing_ok { Ok(()) } else { Err(NhError::not_found(format!("no nexthop for {addr} in vrf {}", vrf.0))) };
        };

        let nh = self.pool(addr).get(handle).expect("just looked up");
        if !nh.is_deletable() {
            return Err(NhError::busy(format!("nexthop for {addr} is protected or still referenced")));
        }

        // Deleting the host route this nexthop backs is what actually
        // drops its reference; removing it unconditionally here mirrors
        // the source's "route_delete also decrefs the nexthop" behavior
        // for the common case of a nexthop that exists solely for its
        // own host route.
        self.routes.route_delete(vrf, addr, host_prefix_len(addr));
        self.pool_mut(addr).remove_unconditionally(handle)
    }

    /// Withdraw a `LINK` route, clearing the `LINK` provenance it
    /// granted its nexthop so a subsequent `NH_DEL` is no longer refused
    /// (spec §8 S5: "remove the LINK route first, then NH_DEL returns
    /// OK"). Mirrors `NH_DEL`'s own "route_delete also decrefs the
    /// nexthop" behavior, but for the provenance bit rather than the
    /// reference count.
    ///
    /// # Errors
    /// `NotFound` if no route matches `(vrf, addr)`, `InvalidArg` if the
    /// matched route is not a `LINK` route.
    pub fn route_withdraw_link(&mut self, vrf: VrfId, addr: IpAddr, prefix_len: u8) -> NhResult<()> {
        let route = self
            .routes
            .route_lookup(vrf, None, addr)
            .ok_or_else(|| NhError::not_found(format!("no route for {addr} in vrf {}", vrf.0)))?;
        if !route.is_link {
            return Err(NhError::invalid_arg(format!("route for {addr} is not a link route")));
        }
        self.routes.route_delete(vrf, addr, prefix_len);
        if let Some(nh) = self.pool_mut(addr).get_mut(route.nexthop) {
            nh.clear_flags(NhFlags::LINK);
        }
        Ok(())
    }

    /// `NH_LIST`: a snapshot of every live nexthop in `vrf`, or every
    /// VRF when `vrf == ALL_VRFS`. Permutation-invariant (spec §8); no
    /// ordering is promised beyond pool slot order.
    #[must_use]
    pub fn nh_list(&self, vrf: VrfId, now: Instant) -> Vec<NhListEntry> {
        self.v4.iter().chain(self.v6.iter()).filter(|(_, nh)| vrf == ALL_VRFS || nh.key.vrf == vrf).map(|(_, nh)| NhListEntry {
            addr: nh.key.addr,
            iface: nh.key.iface,
            vrf: nh.key.vrf,
            lladdr: nh.lladdr(),
            flags: nh.flags(),
            age_seconds: nh.last_reply.map_or(0, |t| now.saturating_duration_since(t).as_secs()),
            held_count: nh.held_count(),
        }).collect()
    }
}

fn host_prefix_len(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}
