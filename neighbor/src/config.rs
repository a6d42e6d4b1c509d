// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tunables for the neighbor-resolution subsystem. Defaults are
//! documented and stable across releases, as required of the bit-exact
//! constants in the operator-visible surface; deployments that need
//! different values load a [`NhConfig`] from YAML at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-nexthop hold-queue capacity.
pub const NH_MAX_HELD_PKTS: usize = 4;
/// Total probes (unicast + multicast/broadcast) sent before a nexthop
/// is declared [`crate::nexthop::State::Failed`].
pub const NH_MAX_PROBES: u32 = 3;
/// Probes sent unicast (to the last-known lladdr) before falling back
/// to multicast/broadcast.
pub const NH_UCAST_PROBES: u32 = 1;

/// Highest valid VRF id, exclusive.
pub const MAX_VRFS: u32 = 4096;
/// Default IPv4 nexthop pool capacity.
pub const IP4_MAX_NEXT_HOPS: usize = 1 << 16;
/// Default IPv6 nexthop pool capacity.
pub const IP6_MAX_NEXT_HOPS: usize = 1 << 16;

/// How long a `REACHABLE` nexthop is trusted without being re-probed.
pub const DEFAULT_REACHABLE_TIME: Duration = Duration::from_secs(30);
/// Interval between retransmitted solicits for a `PENDING`/`STALE` nexthop.
pub const DEFAULT_RETRANS_TIME: Duration = Duration::from_secs(1);

/// Runtime-tunable configuration for one address family's nexthop pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NhConfig {
    pub max_held_pkts: usize,
    pub max_probes: u32,
    pub ucast_probes: u32,
    pub pool_capacity: usize,
    #[serde(with = "duration_secs")]
    pub reachable_time: Duration,
    #[serde(with = "duration_secs")]
    pub retrans_time: Duration,
}

impl Default for NhConfig {
    fn default() -> Self {
        Self {
            max_held_pkts: NH_MAX_HELD_PKTS,
            max_probes: NH_MAX_PROBES,
            ucast_probes: NH_UCAST_PROBES,
            pool_capacity: IP6_MAX_NEXT_HOPS,
            reachable_time: DEFAULT_REACHABLE_TIME,
            retrans_time: DEFAULT_RETRANS_TIME,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let cfg = NhConfig::default();
        assert_eq!(cfg.max_held_pkts, NH_MAX_HELD_PKTS);
        assert_eq!(cfg.max_probes, NH_MAX_PROBES);
        assert_eq!(cfg.ucast_probes, NH_UCAST_PROBES);
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = NhConfig::default();
        let yaml = serde_yaml_ng::to_string(&cfg).unwrap();
        let back: NhConfig = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(cfg, back);
    }
}
