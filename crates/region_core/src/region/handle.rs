//! Region instance handle.
//!
//! A [`RegionHandle`] is the orchestration-side representation of one region
//! instance running inside one remote game. It owns the lifecycle state
//! machine, the set of players present or transferring in, the reservation
//! counts and the shutdown policy flags.
//!
//! Two kinds of reservation keep a region alive: one per world view holding
//! it, and one per player standing in it. Only the world view kind is
//! reported by [`RegionHandle::reservation_count`].
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──create ok──▶ Running ──shutdown──▶ Shutdown
//!    │                                            ▲
//!    └────────────create failed / shutdown────────┘
//! ```
//!
//! `Shutdown` is terminal. Every operation that would leave it is a logged
//! no-op returning `false`.

use super::context::{RegionContext, RetiredRegion};
use super::flags::RegionFlags;
use crate::blueprint::{RegionBehavior, RegionBlueprint};
use crate::messages::ServiceMessage;
use crate::params::CreateRegionParams;
use crate::session::{PlayerSessions, RegionTransferFailure};
use crate::types::{GameId, PlayerId, PrototypeRef, RegionInstanceId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

/// Lifecycle state of a region handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionHandleState {
    /// Creation has not been confirmed by the game instance yet
    Pending,
    /// The instance exists and accepts players
    Running,
    /// Terminal
    Shutdown,
}

/// Who may still be routed into a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionPlayerAccess {
    Open,
    InviteOnly,
}

/// Orchestration-side handle of one region instance.
#[derive(Debug, Clone)]
pub struct RegionHandle {
    id: RegionInstanceId,
    game_id: GameId,
    blueprint: Arc<RegionBlueprint>,
    create_params: CreateRegionParams,
    created_at: Instant,

    state: RegionHandleState,
    flags: RegionFlags,
    player_access: RegionPlayerAccess,

    // One per world view holding this region.
    reservations: usize,
    // One per player present in this region.
    presence_reservations: usize,
    transferring_players: HashSet<PlayerId>,
    players: HashSet<PlayerId>,
}

impl RegionHandle {
    /// Creates a handle in the `Pending` state.
    ///
    /// The blueprint's default policy is merged into `flags`.
    pub fn new(
        id: RegionInstanceId,
        game_id: GameId,
        blueprint: Arc<RegionBlueprint>,
        create_params: CreateRegionParams,
        mut flags: RegionFlags,
        created_at: Instant,
    ) -> Self {
        if blueprint.close_when_reservations_reach_zero {
            flags |= RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO;
        }

        if blueprint.always_shutdown_when_vacant {
            flags |= RegionFlags::SHUTDOWN_WHEN_VACANT;
        }

        Self {
            id,
            game_id,
            blueprint,
            create_params,
            created_at,
            state: RegionHandleState::Pending,
            flags,
            player_access: RegionPlayerAccess::Open,
            reservations: 0,
            presence_reservations: 0,
            transferring_players: HashSet::new(),
            players: HashSet::new(),
        }
    }

    pub fn id(&self) -> RegionInstanceId {
        self.id
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn blueprint(&self) -> &Arc<RegionBlueprint> {
        &self.blueprint
    }

    pub fn blueprint_ref(&self) -> PrototypeRef {
        self.blueprint.id
    }

    pub fn create_params(&self) -> &CreateRegionParams {
        &self.create_params
    }

    pub fn difficulty_tier(&self) -> PrototypeRef {
        self.create_params.difficulty_tier
    }

    pub fn state(&self) -> RegionHandleState {
        self.state
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    pub fn player_access(&self) -> RegionPlayerAccess {
        self.player_access
    }

    pub fn is_running(&self) -> bool {
        self.state == RegionHandleState::Running
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == RegionHandleState::Shutdown
    }

    pub fn is_public(&self) -> bool {
        self.blueprint.is_public
    }

    pub fn is_private_story(&self) -> bool {
        self.blueprint.is_private_story()
    }

    pub fn is_expired(&self) -> bool {
        self.flags.contains(RegionFlags::IS_EXPIRED)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_limit(&self) -> usize {
        self.blueprint.player_limit
    }

    /// Towns are never full; everything else is full at its player limit.
    pub fn is_full(&self) -> bool {
        self.blueprint.behavior != RegionBehavior::Town && self.player_count() >= self.player_limit()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations
    }

    pub fn presence_count(&self) -> usize {
        self.presence_reservations
    }

    /// True while any world view or present player holds this region.
    pub fn has_reservations(&self) -> bool {
        self.reservations + self.presence_reservations > 0
    }

    pub fn transferring_count(&self) -> usize {
        self.transferring_players.len()
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn is_transferring(&self, player: PlayerId) -> bool {
        self.transferring_players.contains(&player)
    }

    pub fn is_vacant(&self) -> bool {
        self.players.is_empty() && self.transferring_players.is_empty() && self.presence_reservations == 0
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    // ------------------------------------------------------------------
    // State management
    // ------------------------------------------------------------------

    /// Asks the owning game instance to create this region.
    pub fn request_instance_creation(&self, ctx: &RegionContext<'_>) -> bool {
        if self.state != RegionHandleState::Pending {
            warn!("RequestInstanceCreation(): Invalid state {:?} for region [{}]", self.state, self);
            return false;
        }

        info!("Requesting instance creation for region [{}]", self);

        ctx.outbound().send(ServiceMessage::CreateRegion {
            game_id: self.game_id,
            region_id: self.id,
            blueprint: self.blueprint.id,
            create_params: self.create_params.clone(),
        });

        true
    }

    /// Handles the game instance's answer to [`Self::request_instance_creation`].
    pub fn on_instance_create_response(&mut self, success: bool, ctx: &mut RegionContext<'_>) -> bool {
        if self.state != RegionHandleState::Pending {
            warn!("OnInstanceCreateResponse(): Invalid state {:?} for region [{}]", self.state, self);
            return false;
        }

        if !success {
            warn!("OnInstanceCreateResponse(): Region [{}] failed to generate", self);
            // The game instance already knows the region does not exist.
            return self.shutdown(false, ctx);
        }

        self.state = RegionHandleState::Running;
        info!("Received instance creation confirmation for region [{}]", self);

        for player in self.transferring_players.drain() {
            ctx.sessions().region_ready_to_transfer(player, self.id);
        }

        true
    }

    /// Marks this region for shutdown as soon as it is no longer needed.
    ///
    /// Players still inside keep it running until the last one leaves.
    pub fn request_shutdown(&mut self, ctx: &mut RegionContext<'_>) -> bool {
        self.flags |= RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO;
        self.flags |= RegionFlags::SHUTDOWN_WHEN_VACANT;

        self.shutdown_if_vacant(ctx);
        true
    }

    /// Moves this region to the terminal state.
    ///
    /// Players still transferring in are sent back to the game they came from,
    /// or disconnected if they have none. The region is then queued for
    /// deregistration through the context.
    pub fn shutdown(&mut self, notify_remote: bool, ctx: &mut RegionContext<'_>) -> bool {
        if self.state == RegionHandleState::Shutdown {
            warn!("Shutdown(): Region [{}] is already shut down", self);
            return false;
        }

        // There is no shutdown confirmation, so the message is fire-and-forget.
        if notify_remote {
            ctx.outbound().send(ServiceMessage::ShutdownRegion {
                game_id: self.game_id,
                region_id: self.id,
            });
        }

        self.state = RegionHandleState::Shutdown;
        info!("Region [{}] is shut down", self);

        for player in self.transferring_players.drain() {
            match ctx.locations().current_game(player) {
                Some(game_id) => ctx.sessions().cancel_region_transfer(
                    player,
                    game_id,
                    RegionTransferFailure::DestinationInaccessible,
                ),
                None => ctx.sessions().disconnect(player),
            }
        }

        // Shared portals (e.g. treasure rooms) outlive the regions they open.
        let portal = self
            .create_params
            .access_portal
            .as_ref()
            .filter(|portal| portal.bound_to_owner)
            .cloned();

        ctx.retire(RetiredRegion {
            region_id: self.id,
            game_id: self.game_id,
            portal,
        });

        true
    }

    /// Returns true if a request with `other` can be served by this region.
    pub fn matches_create_params(&self, other: &CreateRegionParams) -> bool {
        let own = &self.create_params;

        if own.difficulty_tier != other.difficulty_tier {
            return false;
        }

        // A non-zero endless level marks an endless region; the level must match.
        if own.endless_level != 0 && own.endless_level != other.endless_level {
            return false;
        }

        if other.seed != 0 && own.seed != other.seed {
            return false;
        }

        // Regions spawned by a portal entity are only reachable through that same entity.
        if let Some(own_portal) = &own.access_portal {
            match &other.access_portal {
                Some(other_portal) if other_portal.entity_db_id == own_portal.entity_db_id => {}
                _ => return false,
            }
        }

        true
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Lets a player in now if running, otherwise once creation is confirmed.
    pub fn add_transferring_player(&mut self, player: PlayerId, sessions: &dyn PlayerSessions) -> bool {
        match self.state {
            RegionHandleState::Running => sessions.region_ready_to_transfer(player, self.id),
            RegionHandleState::Pending => {
                self.transferring_players.insert(player);
            }
            RegionHandleState::Shutdown => {
                warn!("AddTransferringPlayer(): Region [{}] is shut down, rejecting [{}]", self, player);
                return false;
            }
        }

        true
    }

    /// Drops a queued transfer, e.g. because the player logged out while waiting.
    pub fn remove_transferring_player(&mut self, player: PlayerId, ctx: &mut RegionContext<'_>) -> bool {
        if !self.transferring_players.remove(&player) {
            return false;
        }

        trace!("RemoveTransferringPlayer(): [{}] - [{}]", self, player);
        self.shutdown_if_vacant(ctx);
        true
    }

    pub fn on_added_to_world_view(&mut self) {
        self.reservations += 1;
        trace!("Region [{}] reserved ({})", self, self.reservations);
    }

    pub fn on_removed_from_world_view(&mut self, ctx: &mut RegionContext<'_>) {
        if self.reservations > 0 {
            self.reservations -= 1;
        } else {
            warn!("OnRemovedFromWorldView(): Reservation count for region [{}] is already 0", self);
        }

        trace!("Region [{}] unreserved ({})", self, self.reservations);
        self.shutdown_if_vacant(ctx);
    }

    pub fn on_player_entered(&mut self, player: PlayerId) -> bool {
        if self.state == RegionHandleState::Shutdown {
            warn!("OnPlayerEntered(): Region [{}] is shut down, ignoring [{}]", self, player);
            return false;
        }

        trace!("OnPlayerEntered(): [{}] - [{}]", self, player);

        self.transferring_players.remove(&player);
        if !self.players.insert(player) {
            return false;
        }

        self.presence_reservations += 1;
        true
    }

    pub fn on_player_left(&mut self, player: PlayerId, ctx: &mut RegionContext<'_>) -> bool {
        if !self.players.remove(&player) {
            warn!("OnPlayerLeft(): Player [{}] is not in region [{}]", player, self);
            return false;
        }

        if self.presence_reservations > 0 {
            self.presence_reservations -= 1;
        } else {
            warn!("OnPlayerLeft(): Presence count for region [{}] is already 0", self);
        }

        trace!("OnPlayerLeft(): [{}] - [{}]", self, player);
        self.shutdown_if_vacant(ctx);
        true
    }

    /// Flags the region as expired once it outlives its blueprint lifetime.
    ///
    /// Returns true only on the call that performs the transition.
    pub fn check_expiration(&mut self, now: Instant) -> bool {
        if !self.blueprint.can_expire() || self.state == RegionHandleState::Shutdown {
            return false;
        }

        if self.flags.contains(RegionFlags::IS_EXPIRED) {
            return false;
        }

        let uptime = self.uptime(now);
        if uptime < self.blueprint.lifetime() {
            return false;
        }

        info!("Region [{}] expired after {}s", self, uptime.as_secs());
        self.flags |= RegionFlags::IS_EXPIRED;
        self.player_access = RegionPlayerAccess::InviteOnly;
        true
    }

    /// Applies the vacancy policy.
    pub fn shutdown_if_vacant(&mut self, ctx: &mut RegionContext<'_>) {
        if self.state == RegionHandleState::Shutdown {
            return;
        }

        let has_reservations = self.has_reservations();

        if self.flags.contains(RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO) && !has_reservations {
            trace!("Region [{}] is shutting down because its reservations reached zero", self);
            self.shutdown(true, ctx);
            return;
        }

        if self.flags.contains(RegionFlags::IS_EXPIRED) && !has_reservations {
            trace!("Region [{}] is shutting down because it has expired", self);
            self.shutdown(true, ctx);
            return;
        }

        if self.flags.contains(RegionFlags::SHUTDOWN_WHEN_VACANT) && self.is_vacant() {
            trace!("Region [{}] is shutting down because it became vacant", self);
            self.shutdown(true, ctx);
        }
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (difficulty {})",
            self.id, self.blueprint.name, self.create_params.difficulty_tier
        )
    }
}
