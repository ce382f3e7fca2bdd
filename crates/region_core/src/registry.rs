//! World registry: id allocation and the authoritative region map.
//!
//! The registry owns every live [`RegionHandle`]. World views and load
//! balancers only keep [`RegionInstanceId`]s and resolve them here, which
//! makes an id that is no longer present the definition of a stale reference.

use crate::region::RegionHandle;
use crate::types::RegionInstanceId;
use std::collections::HashMap;
use tracing::warn;

const NAMESPACE_SHIFT: u32 = 56;
const COUNTER_MASK: u64 = (1 << NAMESPACE_SHIFT) - 1;

/// Id namespaces. The namespace occupies the top byte of every id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IdNamespace {
    Game = 0x01,
    Region = 0x02,
}

/// Monotonic id source for a single namespace.
#[derive(Debug)]
pub struct IdGenerator {
    namespace: IdNamespace,
    counter: u64,
}

impl IdGenerator {
    pub fn new(namespace: IdNamespace) -> Self {
        Self { namespace, counter: 0 }
    }

    /// Returns the next id. Ids start at 1 within the namespace and are never reused.
    pub fn next(&mut self) -> u64 {
        self.counter += 1;
        debug_assert!(self.counter <= COUNTER_MASK, "id namespace exhausted");
        ((self.namespace as u64) << NAMESPACE_SHIFT) | (self.counter & COUNTER_MASK)
    }

    pub fn namespace(&self) -> IdNamespace {
        self.namespace
    }
}

/// Cluster-wide map from region instance id to handle.
#[derive(Debug)]
pub struct WorldRegistry {
    ids: IdGenerator,
    regions: HashMap<RegionInstanceId, RegionHandle>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(IdNamespace::Region),
            regions: HashMap::new(),
        }
    }

    /// Hands out a fresh region instance id.
    pub fn next_id(&mut self) -> RegionInstanceId {
        RegionInstanceId(self.ids.next())
    }

    /// Registers a handle. Returns false if its id is already taken.
    pub fn add_region(&mut self, region: RegionHandle) -> bool {
        let id = region.id();
        if self.regions.contains_key(&id) {
            warn!("AddRegion(): Region {} is already registered", id);
            return false;
        }

        self.regions.insert(id, region);
        true
    }

    /// Deregisters a handle, returning it if it was present.
    pub fn remove_region(&mut self, id: RegionInstanceId) -> Option<RegionHandle> {
        let removed = self.regions.remove(&id);
        if removed.is_none() {
            warn!("RemoveRegion(): Region {} not found", id);
        }
        removed
    }

    pub fn get(&self, id: RegionInstanceId) -> Option<&RegionHandle> {
        self.regions.get(&id)
    }

    pub fn get_mut(&mut self, id: RegionInstanceId) -> Option<&mut RegionHandle> {
        self.regions.get_mut(&id)
    }

    pub fn contains(&self, id: RegionInstanceId) -> bool {
        self.regions.contains_key(&id)
    }

    /// Returns true if the id resolves to a handle that has not shut down.
    pub fn is_live(&self, id: RegionInstanceId) -> bool {
        self.regions.get(&id).is_some_and(|region| !region.is_shutdown())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionHandle> {
        self.regions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegionHandle> {
        self.regions.values_mut()
    }

    /// Ids of every registered region, in ascending order.
    pub fn ids(&self) -> Vec<RegionInstanceId> {
        let mut ids: Vec<_> = self.regions.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for WorldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{handle, public_zone};

    #[test]
    fn test_ids_are_namespaced_and_unique() {
        let mut regions = IdGenerator::new(IdNamespace::Region);
        let mut games = IdGenerator::new(IdNamespace::Game);

        let first = regions.next();
        let second = regions.next();
        assert_ne!(first, second);
        assert!(second > first);
        assert_eq!(first >> NAMESPACE_SHIFT, IdNamespace::Region as u64);
        assert_eq!(games.next() >> NAMESPACE_SHIFT, IdNamespace::Game as u64);
    }

    #[test]
    fn test_registry_add_and_remove() {
        let mut registry = WorldRegistry::new();
        let id = registry.next_id();
        let region = handle(id, public_zone(1, 4));

        assert!(registry.add_region(region.clone()));
        assert!(!registry.add_region(region));
        assert!(registry.is_live(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove_region(id).is_some());
        assert!(registry.remove_region(id).is_none());
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_next_id_never_repeats_after_removal() {
        let mut registry = WorldRegistry::new();
        let id = registry.next_id();
        registry.add_region(handle(id, public_zone(1, 4)));
        registry.remove_region(id);

        assert_ne!(registry.next_id(), id);
    }
}
