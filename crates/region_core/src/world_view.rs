//! World views.
//!
//! A world view is the set of region instances a player, or a whole party,
//! may return to. Holding a region in a view is what keeps it alive: every
//! view that contains a region owns exactly one reservation on it, and the
//! region's shutdown policy reacts when the last one is released.
//!
//! Views only store instance ids. A stored id whose region has shut down or
//! vanished is stale and is dropped the next time the view is scanned.

use crate::manager::WorldManager;
use crate::params::CreateRegionParams;
use crate::types::{PlayerId, PrototypeRef, RegionInstanceId};
use std::collections::BTreeSet;
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct WorldView {
    owners: BTreeSet<PlayerId>,
    regions: BTreeSet<RegionInstanceId>,
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a view owned by a single player.
    pub fn for_player(player: PlayerId) -> Self {
        let mut view = Self::new();
        view.owners.insert(player);
        view
    }

    pub fn owners(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.owners.iter().copied()
    }

    pub fn has_owner(&self, player: PlayerId) -> bool {
        self.owners.contains(&player)
    }

    pub fn region_ids(&self) -> Vec<RegionInstanceId> {
        self.regions.iter().copied().collect()
    }

    pub fn contains_region(&self, region_id: RegionInstanceId) -> bool {
        self.regions.contains(&region_id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn add_owner(&mut self, player: PlayerId, world: &WorldManager) -> bool {
        if !self.owners.insert(player) {
            return false;
        }

        self.sync(world);
        true
    }

    pub fn remove_owner(&mut self, player: PlayerId, world: &WorldManager) -> bool {
        if !self.owners.remove(&player) {
            return false;
        }

        self.sync(world);
        true
    }

    /// Adds a region and reserves it. Returns false if it was already present
    /// or could not be reserved.
    pub fn add_region(&mut self, region_id: RegionInstanceId, world: &mut WorldManager) -> bool {
        if self.regions.contains(&region_id) {
            return false;
        }

        if !world.reserve_region(region_id) {
            warn!("AddRegion(): Region {} could not be reserved", region_id);
            return false;
        }

        self.regions.insert(region_id);
        trace!("World view of {:?} gained {}", self.owners, region_id);
        self.sync(world);
        true
    }

    /// Removes a region and releases its reservation.
    pub fn remove_region(&mut self, region_id: RegionInstanceId, world: &mut WorldManager) -> bool {
        if !self.regions.remove(&region_id) {
            return false;
        }

        world.unreserve_region(region_id);
        trace!("World view of {:?} lost {}", self.owners, region_id);
        self.sync(world);
        true
    }

    /// Copies every region of `other` into this view.
    pub fn add_regions_from(&mut self, other: &WorldView, world: &mut WorldManager) {
        for region_id in other.regions.iter().copied() {
            self.add_region(region_id, world);
        }
    }

    /// Drops every region, releasing all reservations.
    pub fn clear(&mut self, world: &mut WorldManager) {
        if self.regions.is_empty() {
            return;
        }

        for region_id in std::mem::take(&mut self.regions) {
            world.unreserve_region(region_id);
        }

        self.sync(world);
    }

    /// Drops only the private story regions.
    pub fn clear_private_story_regions(&mut self, world: &mut WorldManager) -> usize {
        let story: Vec<RegionInstanceId> = self
            .regions
            .iter()
            .copied()
            .filter(|region_id| {
                world
                    .region(*region_id)
                    .is_some_and(|region| region.is_private_story())
            })
            .collect();

        for region_id in &story {
            self.remove_region(*region_id, world);
        }

        story.len()
    }

    /// Drops the private regions this view shares with `other`.
    ///
    /// A player leaving a party loses access to the party's private instances.
    pub fn remove_private_regions_shared_with(&mut self, other: &WorldView, world: &mut WorldManager) -> usize {
        let private: Vec<RegionInstanceId> = self
            .regions
            .iter()
            .copied()
            .filter(|region_id| other.contains_region(*region_id))
            .filter(|region_id| world.region(*region_id).is_some_and(|region| !region.is_public()))
            .collect();

        for region_id in &private {
            self.remove_region(*region_id, world);
        }

        private.len()
    }

    /// Finds a region of `blueprint` that can serve `params`.
    ///
    /// Stale ids met during the scan are evicted.
    pub fn get_matching_region(
        &mut self,
        world: &WorldManager,
        blueprint: PrototypeRef,
        params: Option<&CreateRegionParams>,
    ) -> Option<RegionInstanceId> {
        let mut found = None;
        let mut stale = Vec::new();

        for region_id in self.regions.iter().copied() {
            let Some(region) = world.region(region_id).filter(|region| !region.is_shutdown()) else {
                stale.push(region_id);
                continue;
            };

            if region.blueprint_ref() != blueprint {
                continue;
            }

            if params.is_some_and(|params| !region.matches_create_params(params)) {
                continue;
            }

            found = Some(region_id);
            break;
        }

        for region_id in stale {
            trace!("Evicting stale region {} from world view", region_id);
            self.regions.remove(&region_id);
        }

        found
    }

    fn sync(&self, world: &WorldManager) {
        let regions = self.region_ids();
        for owner in &self.owners {
            world.sessions().sync_world_view(*owner, &regions);
        }
    }
}
