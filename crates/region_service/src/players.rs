//! Per-player and per-party world views.
//!
//! Every logged-in player owns a personal [`WorldView`]. Forming a party
//! creates a shared view owned by all members and seeded from the leader's
//! personal view; while a player is in a party, routing goes through the
//! party view so the whole group lands in the same instances.

use crate::messages::PartyId;
use region_core::{CreateRegionParams, PlayerId, PrototypeRef, RegionInstanceId, WorldManager, WorldView};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Party {
    members: BTreeSet<PlayerId>,
    view: WorldView,
}

/// Owner of every world view in the service.
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    views: HashMap<PlayerId, WorldView>,
    parties: HashMap<PartyId, Party>,
    party_of: HashMap<PlayerId, PartyId>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_logged_in(&self, player: PlayerId) -> bool {
        self.views.contains_key(&player)
    }

    pub fn player_count(&self) -> usize {
        self.views.len()
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn party_of(&self, player: PlayerId) -> Option<PartyId> {
        self.party_of.get(&player).copied()
    }

    pub fn party_members(&self, party: PartyId) -> Vec<PlayerId> {
        self.parties
            .get(&party)
            .map(|party| party.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn personal_view(&self, player: PlayerId) -> Option<&WorldView> {
        self.views.get(&player)
    }

    pub fn party_view(&self, party: PartyId) -> Option<&WorldView> {
        self.parties.get(&party).map(|party| &party.view)
    }

    /// The view used to route `player`: their party's if they have one.
    fn routing_view(&mut self, player: PlayerId) -> Option<&mut WorldView> {
        if let Some(party_id) = self.party_of.get(&player) {
            if let Some(party) = self.parties.get_mut(party_id) {
                return Some(&mut party.view);
            }
        }

        self.views.get_mut(&player)
    }

    pub fn log_in(&mut self, player: PlayerId) -> bool {
        if self.views.contains_key(&player) {
            warn!("⚠️ Player {} logged in twice", player);
            return false;
        }

        info!("👋 Player {} logged in", player);
        self.views.insert(player, WorldView::for_player(player));
        true
    }

    /// Drops a player: leaves their party, releases their view and cancels
    /// whatever transfer was still pending.
    pub fn log_out(&mut self, player: PlayerId, world: &mut WorldManager) -> bool {
        if let Some(party) = self.party_of(player) {
            self.leave_party(party, player, world);
        }

        let Some(mut view) = self.views.remove(&player) else {
            warn!("⚠️ Unknown player {} logged out", player);
            world.on_player_logged_out(player);
            return false;
        };

        view.clear(world);
        world.on_player_logged_out(player);
        info!("👋 Player {} logged out", player);
        true
    }

    pub fn begin_transfer(
        &mut self,
        player: PlayerId,
        blueprint: PrototypeRef,
        params: CreateRegionParams,
        world: &mut WorldManager,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        let Some(view) = self.routing_view(player) else {
            warn!("⚠️ Transfer requested for unknown player {}", player);
            world.sessions().disconnect(player);
            return None;
        };

        world.begin_region_transfer(player, view, blueprint, params, now)
    }

    pub fn clear_private_story_regions(&mut self, player: PlayerId, world: &mut WorldManager) -> usize {
        match self.routing_view(player) {
            Some(view) => view.clear_private_story_regions(world),
            None => {
                warn!("⚠️ Cannot clear story regions of unknown player {}", player);
                0
            }
        }
    }

    // ------------------------------------------------------------------
    // Parties
    // ------------------------------------------------------------------

    pub fn form_party(&mut self, party_id: PartyId, leader: PlayerId, world: &mut WorldManager) -> bool {
        if self.parties.contains_key(&party_id) {
            warn!("⚠️ Party {} already exists", party_id);
            return false;
        }

        if let Some(existing) = self.party_of(leader) {
            warn!("⚠️ Player {} is already in party {}", leader, existing);
            return false;
        }

        let Some(personal) = self.views.get(&leader) else {
            warn!("⚠️ Cannot form party {} for unknown player {}", party_id, leader);
            return false;
        };

        let mut view = WorldView::new();
        view.add_owner(leader, world);
        view.add_regions_from(personal, world);

        self.parties.insert(
            party_id,
            Party {
                members: BTreeSet::from([leader]),
                view,
            },
        );
        self.party_of.insert(leader, party_id);

        info!("🎉 Party {} formed by {}", party_id, leader);
        true
    }

    pub fn join_party(&mut self, party_id: PartyId, player: PlayerId, world: &WorldManager) -> bool {
        if !self.views.contains_key(&player) {
            warn!("⚠️ Unknown player {} cannot join party {}", player, party_id);
            return false;
        }

        if let Some(existing) = self.party_of(player) {
            warn!("⚠️ Player {} is already in party {}", player, existing);
            return false;
        }

        let Some(party) = self.parties.get_mut(&party_id) else {
            warn!("⚠️ Party {} not found", party_id);
            return false;
        };

        party.members.insert(player);
        party.view.add_owner(player, world);
        self.party_of.insert(player, party_id);

        debug!("Player {} joined party {}", player, party_id);
        true
    }

    /// Removes a member. The member keeps no claim on the party's private
    /// instances; the last member keeps the region they are standing in.
    pub fn leave_party(&mut self, party_id: PartyId, player: PlayerId, world: &mut WorldManager) -> bool {
        let Some(party) = self.parties.get_mut(&party_id) else {
            warn!("⚠️ Party {} not found", party_id);
            return false;
        };

        if !party.members.remove(&player) {
            warn!("⚠️ Player {} is not a member of party {}", player, party_id);
            return false;
        }

        self.party_of.remove(&player);
        party.view.remove_owner(player, world);

        if let Some(personal) = self.views.get_mut(&player) {
            personal.remove_private_regions_shared_with(&party.view, world);

            if party.members.is_empty() {
                if let Some(location) = world.player_location(player) {
                    personal.add_region(location.region_id, world);
                }
            }
        }

        debug!("Player {} left party {}", player, party_id);

        if party.members.is_empty() {
            self.disband_party(party_id, world);
        }

        true
    }

    /// Dissolves a party. Every member keeps the region they are standing in.
    pub fn disband_party(&mut self, party_id: PartyId, world: &mut WorldManager) -> bool {
        let Some(mut party) = self.parties.remove(&party_id) else {
            warn!("⚠️ Party {} not found", party_id);
            return false;
        };

        for member in &party.members {
            self.party_of.remove(member);

            if let (Some(personal), Some(location)) = (self.views.get_mut(member), world.player_location(*member)) {
                personal.add_region(location.region_id, world);
            }
        }

        party.view.clear(world);
        info!("👋 Party {} disbanded", party_id);
        true
    }
}
