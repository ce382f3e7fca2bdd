//! Per-blueprint load balancer for public regions.
//!
//! The balancer keeps the public instances of one blueprint ordered by how
//! attractive they are for a newly arriving player:
//!
//! 1. partially filled instances, fewest players first
//! 2. empty instances
//! 3. full instances
//!
//! Ties are broken by the lower instance id so the order is total and stable.
//! The key is derived from the handle's occupancy, so the owner must call
//! [`RegionLoadBalancer::update_region`] whenever a player enters or leaves.

use crate::region::{RegionHandle, RegionPlayerAccess};
use crate::registry::WorldRegistry;
use crate::types::{PrototypeRef, RegionInstanceId};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LoadTier {
    Partial,
    Empty,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LoadKey {
    tier: LoadTier,
    players: usize,
    region_id: RegionInstanceId,
}

impl LoadKey {
    fn of(region: &RegionHandle) -> Self {
        let players = region.player_count();
        let tier = if region.is_full() {
            LoadTier::Full
        } else if players == 0 {
            LoadTier::Empty
        } else {
            LoadTier::Partial
        };

        Self {
            tier,
            players,
            region_id: region.id(),
        }
    }
}

/// Occupancy-ordered set of the public instances of one blueprint.
#[derive(Debug)]
pub struct RegionLoadBalancer {
    blueprint: PrototypeRef,
    ordered: BTreeSet<LoadKey>,
    keys: HashMap<RegionInstanceId, LoadKey>,
    maintenance_interval: Duration,
    next_maintenance: Option<Instant>,
}

impl RegionLoadBalancer {
    pub fn new(blueprint: PrototypeRef, maintenance_interval: Duration) -> Self {
        Self {
            blueprint,
            ordered: BTreeSet::new(),
            keys: HashMap::new(),
            maintenance_interval,
            next_maintenance: None,
        }
    }

    pub fn blueprint(&self) -> PrototypeRef {
        self.blueprint
    }

    /// Starts balancing a region. Terminal and already tracked regions are rejected.
    pub fn add_region(&mut self, region: &RegionHandle) -> bool {
        if region.is_shutdown() {
            warn!("AddRegion(): Region [{}] is shut down and cannot be balanced", region);
            return false;
        }

        if self.keys.contains_key(&region.id()) {
            return false;
        }

        let key = LoadKey::of(region);
        self.ordered.insert(key);
        self.keys.insert(region.id(), key);
        trace!("Balancer {}: added [{}] as {:?}", self.blueprint, region, key.tier);
        true
    }

    pub fn remove_region(&mut self, region_id: RegionInstanceId) -> bool {
        match self.keys.remove(&region_id) {
            Some(key) => {
                self.ordered.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Re-keys a tracked region after its occupancy changed.
    ///
    /// Regions that turned terminal are dropped instead.
    pub fn update_region(&mut self, region: &RegionHandle) -> bool {
        if !self.remove_region(region.id()) {
            return false;
        }

        if region.is_shutdown() {
            return false;
        }

        self.add_region(region)
    }

    pub fn contains(&self, region_id: RegionInstanceId) -> bool {
        self.keys.contains_key(&region_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Tracked ids in balancing order.
    pub fn ordered_ids(&self) -> Vec<RegionInstanceId> {
        self.ordered.iter().map(|key| key.region_id).collect()
    }

    /// Picks the best existing instance for a player asking for `difficulty`.
    pub fn get_available_region(
        &mut self,
        difficulty: PrototypeRef,
        registry: &WorldRegistry,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        self.run_maintenance(registry, now);

        for key in &self.ordered {
            // Everything past the first full instance is full as well.
            if key.tier == LoadTier::Full {
                break;
            }

            let Some(region) = registry.get(key.region_id) else {
                continue;
            };

            if region.is_shutdown() || region.is_expired() || region.is_full() {
                continue;
            }

            if region.player_access() != RegionPlayerAccess::Open {
                continue;
            }

            if region.difficulty_tier() != difficulty {
                continue;
            }

            return Some(region.id());
        }

        None
    }

    /// Drops entries whose handle vanished, shut down or expired.
    ///
    /// Runs at most once per maintenance interval.
    pub fn run_maintenance(&mut self, registry: &WorldRegistry, now: Instant) -> usize {
        if let Some(next) = self.next_maintenance {
            if now < next {
                return 0;
            }
        }
        self.next_maintenance = Some(now + self.maintenance_interval);

        let stale: Vec<RegionInstanceId> = self
            .keys
            .keys()
            .copied()
            .filter(|id| {
                registry
                    .get(*id)
                    .map_or(true, |region| region.is_shutdown() || region.is_expired())
            })
            .collect();

        for id in &stale {
            self.remove_region(*id);
        }

        if !stale.is_empty() {
            debug!("Balancer {}: pruned {} stale regions", self.blueprint, stale.len());
        }

        stale.len()
    }
}
