// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The fixed-capacity nexthop allocator and its `(vrf, iface, addr)`
//! hash index (spec §4.A).
//!
//! The source's pool is an array with an intrusive free list threaded
//! through unused slots and raw-pointer lookups. Here the free list and
//! the slot array are the same `Vec<Slot<T>>`, and external references
//! are generational [`NhHandle`]s rather than pointers: a handle
//! captured before its slot was freed and reused is rejected by
//! [`NexthopPool::get`]/`get_mut` rather than aliasing the new
//! occupant.

use crate::error::NhError;
use crate::flags::NhFlags;
use crate::handle::{NhHandle, NhKey};
use crate::nexthop::Nexthop;
use std::collections::HashMap;
use std::net::IpAddr;

enum Slot<T> {
    Occupied { nh: Nexthop<T>, generation: u32 },
    Free { next_free: Option<u32>, generation: u32 },
}

/// A fixed-capacity pool of nexthops for one address family, with a
/// `(vrf, iface, addr)` hash index over the live entries.
pub struct NexthopPool<T> {
    capacity: usize,
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    live_count: usize,
    index: HashMap<NhKey, NhHandle>,
}

impl<T> NexthopPool<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free_head: None,
            live_count: 0,
            index: HashMap::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Validate that `addr` is a legal nexthop target: not multicast,
    /// not unspecified.
    fn validate_addr(addr: IpAddr) -> Result<(), NhError> {
        let bad = match addr {
            IpAddr::V4(v4) => v4.is_multicast() || v4.is_unspecified(),
            IpAddr::V6(v6) => v6.is_multicast() || v6.is_unspecified(),
        };
        if bad {
            Err(NhError::invalid_arg(format!("{addr} is not a valid nexthop address")))
        } else {
            Ok(())
        }
    }

    fn alloc_slot(&mut self, nh: Nexthop<T>) -> Result<NhHandle, NhError> {
        if let Some(index) = self.free_head {
            let Slot::Free { next_free, generation } = self.slots[index as usize] else {
                unreachable!("free_head always points at a Free slot");
            };
            self.free_head = next_free;
            self.slots[index as usize] = Slot::Occupied { nh, generation };
            self.live_count += 1;
            Ok(NhHandle::new(index, generation))
        } else if self.slots.len() < self.capacity {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied { nh, generation: 0 });
            self.live_count += 1;
            Ok(NhHandle::new(index, 0))
        } else {
            Err(NhError::no_capacity("nexthop pool exhausted"))
        }
    }

    /// Allocate a new, unresolved nexthop for `key` and index it. Fails
    /// with `InvalidArg` for a multicast/unspecified address, or
    /// `NoCapacity` when the free list and backing array are both
    /// exhausted.
    pub fn allocate(&mut self, key: NhKey, provenance: NhFlags) -> Result<NhHandle, NhError> {
        Self::validate_addr(key.addr)?;
        if self.index.contains_key(&key) {
            return Err(NhError::exists(format!("nexthop for {key:?} already exists")));
        }
        let handle = self.alloc_slot(Nexthop::new(key, provenance))?;
        self.index.insert(key, handle);
        // The caller (route insertion, or the miss handler creating a
        // host nexthop) holds the allocation's first reference; per
        // invariant 1 a nexthop is indexed iff ref_count > 0.
        self.get_mut(handle).expect("just inserted").ref_count = 1;
        Ok(handle)
    }

    /// Allocate a `REACHABLE | STATIC` nexthop with an operator-supplied
    /// link-layer address.
    pub fn allocate_static(&mut self, key: NhKey, provenance: NhFlags, lladdr: net::Mac) -> Result<NhHandle, NhError> {
        Self::validate_addr(key.addr)?;
        if self.index.contains_key(&key) {
            return Err(NhError::exists(format!("nexthop for {key:?} already exists")));
        }
        let handle = self.alloc_slot(Nexthop::new_static(key, provenance, lladdr))?;
        self.index.insert(key, handle);
        self.get_mut(handle).expect("just inserted").ref_count = 1;
        Ok(handle)
    }

    /// Look up the live entry for `key`. `key.iface = None` matches any
    /// interface (spec §4.A `UNDEF`), returning the lowest-index match
    /// for a deterministic tie-break.
    #[must_use]
    pub fn lookup(&self, key: NhKey) -> Option<NhHandle> {
        if key.iface.is_some() {
            return self.index.get(&key).copied();
        }
        self.index
            .iter()
            .filter(|(k, _)| k.vrf == key.vrf && k.addr == key.addr)
            .min_by_key(|(_, h)| h.index)
            .map(|(_, h)| *h)
    }

    fn slot(&self, handle: NhHandle) -> Option<&Slot<T>> {
        self.slots.get(handle.index as usize)
    }

    fn slot_mut(&mut self, handle: NhHandle) -> Option<&mut Slot<T>> {
        self.slots.get_mut(handle.index as usize)
    }

    /// Dereference a handle, or `None` if it is stale or out of range.
    #[must_use]
    pub fn get(&self, handle: NhHandle) -> Option<&Nexthop<T>> {
        match self.slot(handle)? {
            Slot::Occupied { nh, generation } if *generation == handle.generation => Some(nh),
            _ => None,
        }
    }

    /// Mutable dereference of a handle.
    pub fn get_mut(&mut self, handle: NhHandle) -> Option<&mut Nexthop<T>> {
        match self.slot_mut(handle)? {
            Slot::Occupied { nh, generation } if *generation == handle.generation => Some(nh),
            _ => None,
        }
    }

    /// Increment a nexthop's reference count (spec invariant 1: a live
    /// entry is indexed iff `ref_count > 0`; this does not itself index
    /// or allocate).
    pub fn incref(&mut self, handle: NhHandle) -> Result<(), NhError> {
        let nh = self.get_mut(handle).ok_or_else(|| NhError::not_found("stale nexthop handle"))?;
        nh.ref_count += 1;
        Ok(())
    }

    /// Decrement a nexthop's reference count, freeing the slot and
    /// removing it from the index once it reaches zero.
    ///
    /// # Panics
    /// Aborts the process if asked to decref a handle whose count is
    /// already zero: that is an internal invariant violation, not a
    /// recoverable caller error (spec §7: "internal invariant
    /// violations are fatal: abort with a descriptive message").
    pub fn decref(&mut self, handle: NhHandle) -> Result<bool, NhError> {
        let key = {
            let nh = self.get_mut(handle).ok_or_else(|| NhError::not_found("stale nexthop handle"))?;
            if nh.ref_count == 0 {
                panic!("decref on nexthop {:?} with ref_count already zero", handle);
            }
            nh.ref_count -= 1;
            if nh.ref_count > 0 {
                return Ok(false);
            }
            nh.key
        };
        self.free(handle, key);
        Ok(true)
    }

    fn free(&mut self, handle: NhHandle, key: NhKey) {
        self.index.remove(&key);
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        let next_generation = handle.generation.wrapping_add(1);
        *slot = Slot::Free {
            next_free: self.free_head,
            generation: next_generation,
        };
        self.free_head = Some(handle.index);
        self.live_count -= 1;
    }

    /// Remove an entry unconditionally regardless of `ref_count`, used
    /// by the operator `NH_DEL` path after its own protection checks
    /// have already passed.
    pub fn remove_unconditionally(&mut self, handle: NhHandle) -> Result<(), NhError> {
        let key = self.get(handle).ok_or_else(|| NhError::not_found("stale nexthop handle"))?.key;
        self.free(handle, key);
        Ok(())
    }

    /// A snapshot traversal over every live handle, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NhHandle, &Nexthop<T>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied { nh, generation } => Some((NhHandle::new(i as u32, *generation), nh)),
            Slot::Free { .. } => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use net::packet::{IfaceId, VrfId};
    use std::net::{IpAddr, Ipv4Addr};

    fn key(last: u8) -> NhKey {
        NhKey::new(VrfId(0), Some(IfaceId(1)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)))
    }

    #[test]
    fn allocate_then_lookup() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(4);
        let h = pool.allocate(key(2), NhFlags::empty()).unwrap();
        assert_eq!(pool.lookup(key(2)), Some(h));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rejects_multicast_address() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(4);
        let mcast = NhKey::new(VrfId(0), Some(IfaceId(1)), IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1)));
        assert!(pool.allocate(mcast, NhFlags::empty()).is_err());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(1);
        pool.allocate(key(1), NhFlags::empty()).unwrap();
        let err = pool.allocate(key(2), NhFlags::empty()).unwrap_err();
        assert_eq!(err.kind, errno::ErrorKind::NoCapacity);
    }

    #[test]
    fn decref_to_zero_frees_and_bumps_generation() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(2);
        let h1 = pool.allocate(key(1), NhFlags::empty()).unwrap();
        pool.incref(h1).unwrap();
        assert!(!pool.decref(h1).unwrap());
        assert!(pool.decref(h1).unwrap());
        assert!(pool.get(h1).is_none());
        assert_eq!(pool.len(), 0);

        let h2 = pool.allocate(key(2), NhFlags::empty()).unwrap();
        assert_eq!(h2.index, h1.index);
        assert_ne!(h2.generation, h1.generation);
        assert!(pool.get(h1).is_none(), "stale handle must not alias the new occupant");
    }

    #[test]
    fn lookup_with_undef_iface_matches_lowest_index() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(4);
        let a = NhKey::new(VrfId(0), Some(IfaceId(5)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)));
        let b = NhKey::new(VrfId(0), Some(IfaceId(6)), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)));
        let ha = pool.allocate(a, NhFlags::empty()).unwrap();
        let _hb = pool.allocate(b, NhFlags::empty()).unwrap();
        let wildcard = NhKey::new(VrfId(0), None, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(pool.lookup(wildcard), Some(ha));
    }

    #[test]
    fn iter_visits_only_live_entries() {
        let mut pool: NexthopPool<u32> = NexthopPool::new(4);
        let h1 = pool.allocate(key(1), NhFlags::empty()).unwrap();
        pool.allocate(key(2), NhFlags::empty()).unwrap();
        pool.decref_force_for_test(h1);
        assert_eq!(pool.iter().count(), 1);
    }

    #[derive(Debug, Clone, Copy, bolero::TypeGenerator)]
    enum PoolOp {
        Allocate,
        Remove,
    }

    /// However `allocate`/`remove_unconditionally` are interleaved, a
    /// bounded pool's live count never exceeds the capacity it was
    /// constructed with.
    #[test]
    fn capacity_is_never_exceeded() {
        const CAPACITY: usize = 4;
        bolero::check!().with_type().for_each(|ops: &Vec<PoolOp>| {
            let mut pool: NexthopPool<u32> = NexthopPool::new(CAPACITY);
            let mut handles: Vec<NhHandle> = Vec::new();
            for (i, op) in ops.iter().enumerate() {
                match op {
                    PoolOp::Allocate => {
                        let last = (i % 250 + 1) as u8;
                        if let Ok(h) = pool.allocate(key(last), NhFlags::empty()) {
                            handles.push(h);
                        }
                    }
                    PoolOp::Remove => {
                        if let Some(h) = handles.pop() {
                            let _ = pool.remove_unconditionally(h);
                        }
                    }
                }
                assert!(pool.len() <= pool.capacity());
                assert!(pool.len() <= CAPACITY);
            }
        });
    }
}

#[cfg(test)]
impl<T> NexthopPool<T> {
    fn decref_force_for_test(&mut self, handle: NhHandle) {
        self.decref(handle).unwrap();
    }
}
