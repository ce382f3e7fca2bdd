//! Side-effect context handed to region handle operations.
//!
//! Handle methods never reach for global state. Everything they are allowed
//! to touch outside their own fields is borrowed through a [`RegionContext`]
//! for the duration of a single call.

use crate::messages::OutboundSink;
use crate::params::AccessPortal;
use crate::session::PlayerSessions;
use crate::types::{GameId, PlayerId, RegionInstanceId};
use std::collections::HashMap;

/// Where a player currently is, as last reported by the game instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLocation {
    pub game_id: GameId,
    pub region_id: RegionInstanceId,
}

/// Tracks the game and region each player is currently present in.
#[derive(Debug, Default)]
pub struct PlayerLocations {
    locations: HashMap<PlayerId, PlayerLocation>,
}

impl PlayerLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player: PlayerId) -> Option<PlayerLocation> {
        self.locations.get(&player).copied()
    }

    /// The game a player is currently in, if any.
    pub fn current_game(&self, player: PlayerId) -> Option<GameId> {
        self.locations.get(&player).map(|location| location.game_id)
    }

    pub fn set(&mut self, player: PlayerId, location: PlayerLocation) -> Option<PlayerLocation> {
        self.locations.insert(player, location)
    }

    /// Forgets a player, but only if they are still recorded in `region_id`.
    pub fn clear_if_in(&mut self, player: PlayerId, region_id: RegionInstanceId) -> bool {
        match self.locations.get(&player) {
            Some(location) if location.region_id == region_id => {
                self.locations.remove(&player);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, player: PlayerId) -> Option<PlayerLocation> {
        self.locations.remove(&player)
    }

    /// Forgets every player recorded in a region.
    pub fn clear_region(&mut self, region_id: RegionInstanceId) {
        self.locations.retain(|_, location| location.region_id != region_id);
    }

    /// Forgets every player recorded in a game, returning who they were.
    pub fn clear_game(&mut self, game_id: GameId) -> Vec<PlayerId> {
        let players: Vec<PlayerId> = self
            .locations
            .iter()
            .filter(|(_, location)| location.game_id == game_id)
            .map(|(player, _)| *player)
            .collect();

        for player in &players {
            self.locations.remove(player);
        }

        players
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// A region that reached its terminal state and still has to be deregistered.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredRegion {
    pub region_id: RegionInstanceId,
    pub game_id: GameId,
    /// Owner-bound portal that should be torn down with the region
    pub portal: Option<AccessPortal>,
}

/// Borrowed collaborators for a single handle operation.
pub struct RegionContext<'a> {
    outbound: &'a dyn OutboundSink,
    sessions: &'a dyn PlayerSessions,
    locations: &'a PlayerLocations,
    retired: &'a mut Vec<RetiredRegion>,
}

impl<'a> RegionContext<'a> {
    pub fn new(
        outbound: &'a dyn OutboundSink,
        sessions: &'a dyn PlayerSessions,
        locations: &'a PlayerLocations,
        retired: &'a mut Vec<RetiredRegion>,
    ) -> Self {
        Self {
            outbound,
            sessions,
            locations,
            retired,
        }
    }

    pub fn outbound(&self) -> &dyn OutboundSink {
        self.outbound
    }

    pub fn sessions(&self) -> &dyn PlayerSessions {
        self.sessions
    }

    pub fn locations(&self) -> &PlayerLocations {
        self.locations
    }

    /// Queues a terminal region for deregistration by the owning game and the registry.
    pub fn retire(&mut self, region: RetiredRegion) {
        self.retired.push(region);
    }
}
