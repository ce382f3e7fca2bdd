//! The orchestration context.
//!
//! [`WorldManager`] owns the registry, the game handles, the per-blueprint
//! load balancers and the player location table, and is the only place that
//! mutates region handles. Every inbound event of the service ends up in one
//! of its methods.
//!
//! Handle operations never deregister anything themselves. A handle reaching
//! its terminal state queues a [`RetiredRegion`], and the manager settles the
//! queue before returning from the public method that caused it:
//!
//! 1. tear down the owner-bound portal if its region is still live
//! 2. remove the region from the registry and its load balancer
//! 3. forget player locations pointing at it
//! 4. tell its game, which may now want to shut down itself

use crate::balancer::RegionLoadBalancer;
use crate::blueprint::{BlueprintCatalog, RegionBlueprint};
use crate::config::OrchestrationConfig;
use crate::game::{GameHandle, GameHandleState, GameKind};
use crate::messages::{OutboundSink, ServiceMessage};
use crate::params::CreateRegionParams;
use crate::region::{
    PlayerLocation, PlayerLocations, RegionContext, RegionFlags, RegionHandle, RegionHandleState,
    RegionPlayerAccess, RetiredRegion,
};
use crate::registry::{IdGenerator, IdNamespace, WorldRegistry};
use crate::report::{FleetReport, RegionReport};
use crate::session::{PlayerSessions, RegionTransferFailure};
use crate::types::{GameId, PlayerId, PrototypeRef, RegionInstanceId};
use crate::world_view::WorldView;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Owner of all orchestration state for one world.
pub struct WorldManager {
    config: OrchestrationConfig,
    catalog: BlueprintCatalog,
    outbound: Arc<dyn OutboundSink>,
    sessions: Arc<dyn PlayerSessions>,

    registry: WorldRegistry,
    games: BTreeMap<GameId, GameHandle>,
    game_ids: IdGenerator,
    private_games: HashMap<PlayerId, GameId>,
    balancers: HashMap<PrototypeRef, RegionLoadBalancer>,
    locations: PlayerLocations,
    retired: Vec<RetiredRegion>,
}

impl WorldManager {
    pub fn new(
        config: OrchestrationConfig,
        catalog: BlueprintCatalog,
        outbound: Arc<dyn OutboundSink>,
        sessions: Arc<dyn PlayerSessions>,
    ) -> Self {
        Self {
            config,
            catalog,
            outbound,
            sessions,
            registry: WorldRegistry::new(),
            games: BTreeMap::new(),
            game_ids: IdGenerator::new(IdNamespace::Game),
            private_games: HashMap::new(),
            balancers: HashMap::new(),
            locations: PlayerLocations::new(),
            retired: Vec::new(),
        }
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    pub fn catalog(&self) -> &BlueprintCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &WorldRegistry {
        &self.registry
    }

    pub fn region(&self, region_id: RegionInstanceId) -> Option<&RegionHandle> {
        self.registry.get(region_id)
    }

    pub fn game(&self, game_id: GameId) -> Option<&GameHandle> {
        self.games.get(&game_id)
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn sessions(&self) -> &dyn PlayerSessions {
        &*self.sessions
    }

    pub fn player_location(&self, player: PlayerId) -> Option<PlayerLocation> {
        self.locations.get(player)
    }

    pub fn balancer(&self, blueprint: PrototypeRef) -> Option<&RegionLoadBalancer> {
        self.balancers.get(&blueprint)
    }

    /// Runs a handle operation with a freshly borrowed context, then settles
    /// whatever it retired.
    fn with_region<R>(
        &mut self,
        region_id: RegionInstanceId,
        f: impl FnOnce(&mut RegionHandle, &mut RegionContext<'_>) -> R,
    ) -> Option<R> {
        let result = {
            let Self {
                registry,
                outbound,
                sessions,
                locations,
                retired,
                ..
            } = self;

            let region = registry.get_mut(region_id)?;
            let mut ctx = RegionContext::new(&**outbound, &**sessions, locations, retired);
            f(region, &mut ctx)
        };

        self.settle_retired();
        Some(result)
    }

    fn rebalance(&mut self, region_id: RegionInstanceId) {
        let Some(region) = self.registry.get(region_id) else {
            return;
        };

        if let Some(balancer) = self.balancers.get_mut(&region.blueprint_ref()) {
            balancer.update_region(region);
        }
    }

    /// Tells a player their transfer is off.
    fn fail_transfer(&self, player: PlayerId, reason: RegionTransferFailure) {
        match self.locations.current_game(player) {
            Some(game_id) => {
                debug!("Cancelling transfer of [{}] back to game {}: {:?}", player, game_id, reason);
                self.sessions.cancel_region_transfer(player, game_id, reason);
            }
            None => {
                debug!("Disconnecting [{}] after failed transfer: {:?}", player, reason);
                self.sessions.disconnect(player);
            }
        }
    }

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    /// Adds one world view reservation. Returns false for unknown or terminal regions.
    pub fn reserve_region(&mut self, region_id: RegionInstanceId) -> bool {
        match self.registry.get_mut(region_id) {
            Some(region) if !region.is_shutdown() => {
                region.on_added_to_world_view();
                true
            }
            Some(region) => {
                warn!("ReserveRegion(): Region [{}] is shut down", region);
                false
            }
            None => {
                warn!("ReserveRegion(): Region {} not found", region_id);
                false
            }
        }
    }

    /// Releases one world view reservation.
    pub fn unreserve_region(&mut self, region_id: RegionInstanceId) -> bool {
        self.with_region(region_id, |region, ctx| region.on_removed_from_world_view(ctx))
            .is_some()
    }

    // ------------------------------------------------------------------
    // Games
    // ------------------------------------------------------------------

    fn create_game(&mut self, kind: GameKind) -> GameId {
        let game_id = GameId(self.game_ids.next());
        let game = GameHandle::new(game_id, kind);
        info!("Created game {}", game);
        self.games.insert(game_id, game);
        game_id
    }

    fn public_game(&mut self) -> GameId {
        let max = self.config.max_regions_per_public_game;
        let existing = self
            .games
            .values()
            .find(|game| game.is_public() && game.accepts_regions() && game.region_count() < max)
            .map(GameHandle::id);

        match existing {
            Some(game_id) => game_id,
            None => self.create_game(GameKind::Public),
        }
    }

    fn private_game(&mut self, player: PlayerId) -> GameId {
        if let Some(game_id) = self.private_games.get(&player) {
            if self.games.get(game_id).is_some_and(GameHandle::accepts_regions) {
                return *game_id;
            }
        }

        let game_id = self.create_game(GameKind::Private(player));
        self.private_games.insert(player, game_id);
        game_id
    }

    fn request_game_shutdown(&mut self, game_id: GameId) {
        let Some(game) = self.games.get_mut(&game_id) else {
            return;
        };

        game.request_shutdown(&*self.outbound);
        if game.is_shutdown() {
            self.forget_game(game_id);
        }
    }

    fn forget_game(&mut self, game_id: GameId) {
        if let Some(game) = self.games.remove(&game_id) {
            if let GameKind::Private(owner) = game.kind() {
                if self.private_games.get(&owner) == Some(&game_id) {
                    self.private_games.remove(&owner);
                }
            }
        }
    }

    /// Handles the confirmation that a game instance is up.
    pub fn on_game_instance_created(&mut self, game_id: GameId) -> bool {
        let Some(game) = self.games.get_mut(&game_id) else {
            warn!("OnGameInstanceCreated(): Game {} not found", game_id);
            return false;
        };

        if !game.on_instance_created() {
            return false;
        }

        if game.region_count() == 0 {
            self.request_game_shutdown(game_id);
            return true;
        }

        let pending: Vec<RegionInstanceId> = game.regions().collect();
        let Self {
            registry,
            outbound,
            sessions,
            locations,
            retired,
            ..
        } = self;
        let ctx = RegionContext::new(&**outbound, &**sessions, locations, retired);

        for region_id in pending {
            if let Some(region) = registry.get(region_id) {
                if region.state() == RegionHandleState::Pending {
                    region.request_instance_creation(&ctx);
                }
            }
        }

        true
    }

    /// Handles a game instance going away, requested or not.
    ///
    /// Players inside it are disconnected and every hosted region is shut
    /// down without notifying the (already gone) remote side.
    pub fn on_game_instance_shutdown(&mut self, game_id: GameId) -> bool {
        let Some(game) = self.games.get_mut(&game_id) else {
            warn!("OnGameInstanceShutdown(): Game {} not found", game_id);
            return false;
        };

        game.on_instance_shutdown();
        let hosted: Vec<RegionInstanceId> = game.regions().collect();

        for player in self.locations.clear_game(game_id) {
            self.sessions.disconnect(player);
        }

        for region_id in hosted {
            self.with_region(region_id, |region, ctx| region.shutdown(false, ctx));
        }

        self.forget_game(game_id);
        true
    }

    // ------------------------------------------------------------------
    // Region creation
    // ------------------------------------------------------------------

    /// Creates a region inside a game and asks for its instantiation.
    ///
    /// The creation request goes out immediately if the game is running;
    /// otherwise it is sent once the game confirms it is up.
    pub fn create_region(
        &mut self,
        game_id: GameId,
        blueprint: &Arc<RegionBlueprint>,
        create_params: CreateRegionParams,
        flags: RegionFlags,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        match self.games.get(&game_id) {
            Some(game) if game.accepts_regions() => {}
            Some(game) => {
                warn!("CreateRegion(): Game {} does not accept regions ({:?})", game, game.state());
                return None;
            }
            None => {
                warn!("CreateRegion(): Game {} not found", game_id);
                return None;
            }
        }

        let region_id = self.registry.next_id();
        let region = RegionHandle::new(region_id, game_id, blueprint.clone(), create_params, flags, now);
        info!("Created region [{}] in game {}", region, game_id);

        self.registry.add_region(region);

        let game_running = match self.games.get_mut(&game_id) {
            Some(game) => {
                game.add_region(region_id);
                if game.state() == GameHandleState::HandleCreated {
                    game.request_instance_creation(&*self.outbound);
                }
                game.is_running()
            }
            None => false,
        };

        if game_running {
            let Self {
                registry,
                outbound,
                sessions,
                locations,
                retired,
                ..
            } = self;

            if let Some(region) = registry.get(region_id) {
                let ctx = RegionContext::new(&**outbound, &**sessions, locations, retired);
                region.request_instance_creation(&ctx);
            }
        }

        Some(region_id)
    }

    /// Returns a balanced public instance, creating one if none has room.
    pub fn get_or_create_public_region(
        &mut self,
        blueprint: &Arc<RegionBlueprint>,
        create_params: CreateRegionParams,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        let interval = self.config.balancer_maintenance_interval();
        let balancer = self
            .balancers
            .entry(blueprint.id)
            .or_insert_with(|| RegionLoadBalancer::new(blueprint.id, interval));

        if let Some(region_id) =
            balancer.get_available_region(create_params.difficulty_tier, &self.registry, now)
        {
            trace!("GetOrCreatePublicRegion(): Balanced into {}", region_id);
            return Some(region_id);
        }

        let game_id = self.public_game();
        let region_id = self.create_region(game_id, blueprint, create_params, RegionFlags::NONE, now)?;

        if let (Some(region), Some(balancer)) =
            (self.registry.get(region_id), self.balancers.get_mut(&blueprint.id))
        {
            balancer.add_region(region);
        }

        Some(region_id)
    }

    /// Creates a region in the player's private game.
    ///
    /// Private regions close as soon as no world view reserves them.
    pub fn create_private_region(
        &mut self,
        owner: PlayerId,
        blueprint: &Arc<RegionBlueprint>,
        create_params: CreateRegionParams,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        let game_id = self.private_game(owner);
        self.create_region(
            game_id,
            blueprint,
            create_params,
            RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO,
            now,
        )
    }

    /// Routes a player to an instance of `blueprint`.
    ///
    /// Resolution order is the player's world view, then the load balancer
    /// for public blueprints, then a fresh instance. On success the player
    /// is queued on the region and the region is added to `view`. On failure
    /// the player's transfer is cancelled (or the player disconnected) and
    /// `None` is returned.
    pub fn begin_region_transfer(
        &mut self,
        player: PlayerId,
        view: &mut WorldView,
        blueprint: PrototypeRef,
        create_params: CreateRegionParams,
        now: Instant,
    ) -> Option<RegionInstanceId> {
        let Some(blueprint) = self.catalog.blueprint(blueprint).cloned() else {
            warn!("BeginRegionTransfer(): Unknown blueprint {} requested by [{}]", blueprint, player);
            self.fail_transfer(player, RegionTransferFailure::UnknownDestination);
            return None;
        };

        let from_view = view.get_matching_region(self, blueprint.id, Some(&create_params));

        let region_id = match from_view {
            Some(region_id) => Some(region_id),
            None if blueprint.uses_load_balancer() => {
                self.get_or_create_public_region(&blueprint, create_params, now)
            }
            None => self.create_private_region(player, &blueprint, create_params, now),
        };

        let Some(region_id) = region_id else {
            self.fail_transfer(player, RegionTransferFailure::DestinationInaccessible);
            return None;
        };

        if let Err(reason) = self.can_enter_region(region_id, from_view.is_some()) {
            info!("BeginRegionTransfer(): [{}] cannot enter {}: {:?}", player, region_id, reason);
            self.fail_transfer(player, reason);
            return None;
        }

        let accepted = match self.registry.get_mut(region_id) {
            Some(region) => region.add_transferring_player(player, &*self.sessions),
            None => false,
        };

        if !accepted {
            self.fail_transfer(player, RegionTransferFailure::DestinationInaccessible);
            return None;
        }

        view.add_region(region_id, self);
        Some(region_id)
    }

    /// Admission check for a routed player.
    ///
    /// Regions already in the player's world view count as an invitation.
    fn can_enter_region(&self, region_id: RegionInstanceId, invited: bool) -> Result<(), RegionTransferFailure> {
        let Some(region) = self.registry.get(region_id) else {
            return Err(RegionTransferFailure::DestinationInaccessible);
        };

        if region.is_shutdown() {
            return Err(RegionTransferFailure::DestinationInaccessible);
        }

        if region.is_full() {
            return Err(RegionTransferFailure::DestinationFull);
        }

        if region.player_access() == RegionPlayerAccess::InviteOnly && !invited {
            return Err(RegionTransferFailure::InviteOnly);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    pub fn on_instance_create_response(&mut self, region_id: RegionInstanceId, success: bool) -> bool {
        match self.with_region(region_id, |region, ctx| region.on_instance_create_response(success, ctx)) {
            Some(handled) => handled,
            None => {
                warn!("OnInstanceCreateResponse(): Region {} not found", region_id);
                false
            }
        }
    }

    pub fn on_player_entered_region(&mut self, player: PlayerId, region_id: RegionInstanceId) -> bool {
        let Some(region) = self.registry.get_mut(region_id) else {
            warn!("OnPlayerEnteredRegion(): Region {} not found for [{}]", region_id, player);
            return false;
        };

        if !region.on_player_entered(player) {
            return false;
        }

        let game_id = region.game_id();
        if let Some(previous) = self.locations.set(player, PlayerLocation { game_id, region_id }) {
            if previous.region_id != region_id {
                warn!("OnPlayerEnteredRegion(): [{}] entered {} without leaving {}", player, region_id, previous.region_id);
                self.on_player_left_region(player, previous.region_id);
            }
        }

        self.rebalance(region_id);
        true
    }

    pub fn on_player_left_region(&mut self, player: PlayerId, region_id: RegionInstanceId) -> bool {
        self.locations.clear_if_in(player, region_id);

        let left = self
            .with_region(region_id, |region, ctx| region.on_player_left(player, ctx))
            .unwrap_or(false);

        if left {
            self.rebalance(region_id);
        }

        left
    }

    /// Drops a player who logged out from every region still expecting them.
    pub fn on_player_logged_out(&mut self, player: PlayerId) {
        if let Some(location) = self.locations.get(player) {
            self.on_player_left_region(player, location.region_id);
        }
        self.locations.remove(player);

        let waiting: Vec<RegionInstanceId> = self
            .registry
            .iter()
            .filter(|region| region.is_transferring(player))
            .map(RegionHandle::id)
            .collect();

        for region_id in waiting {
            self.with_region(region_id, |region, ctx| region.remove_transferring_player(player, ctx));
        }
    }

    pub fn request_region_shutdown(&mut self, region_id: RegionInstanceId) -> bool {
        match self.with_region(region_id, |region, ctx| region.request_shutdown(ctx)) {
            Some(requested) => requested,
            None => {
                warn!("RequestRegionShutdown(): Region {} not found", region_id);
                false
            }
        }
    }

    pub fn shutdown_region(&mut self, region_id: RegionInstanceId, notify_remote: bool) -> bool {
        self.with_region(region_id, |region, ctx| region.shutdown(notify_remote, ctx))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Periodic housekeeping: creation timeouts, expiration and balancer sweeps.
    pub fn update(&mut self, now: Instant) {
        let timeout = self.config.creation_timeout();

        let timed_out: Vec<RegionInstanceId> = self
            .registry
            .iter()
            .filter(|region| region.state() == RegionHandleState::Pending && region.uptime(now) >= timeout)
            .map(RegionHandle::id)
            .collect();

        for region_id in timed_out {
            warn!("Region {} did not confirm creation within {}ms", region_id, timeout.as_millis());
            self.on_instance_create_response(region_id, false);
        }

        let expired: Vec<RegionInstanceId> = self
            .registry
            .iter_mut()
            .filter_map(|region| region.check_expiration(now).then(|| region.id()))
            .collect();

        for region_id in expired {
            if let Some(region) = self.registry.get(region_id) {
                if let Some(balancer) = self.balancers.get_mut(&region.blueprint_ref()) {
                    balancer.remove_region(region_id);
                }
            }

            self.with_region(region_id, |region, ctx| region.shutdown_if_vacant(ctx));
        }

        for balancer in self.balancers.values_mut() {
            balancer.run_maintenance(&self.registry, now);
        }
    }

    /// Deregisters every region that reached its terminal state.
    pub fn settle_retired(&mut self) {
        while let Some(retired) = self.retired.pop() {
            if let Some(portal) = retired.portal {
                match self.registry.get(portal.location.region_id) {
                    Some(portal_region) if !portal_region.is_shutdown() => {
                        debug!("Destroying portal {} of region {}", portal.entity_db_id, retired.region_id);
                        self.outbound.send(ServiceMessage::DestroyPortal {
                            game_id: portal_region.game_id(),
                            portal,
                        });
                    }
                    _ => trace!("Portal {} outlived by its own region", portal.entity_db_id),
                }
            }

            if let Some(region) = self.registry.remove_region(retired.region_id) {
                if let Some(balancer) = self.balancers.get_mut(&region.blueprint_ref()) {
                    balancer.remove_region(retired.region_id);
                }
            }

            self.locations.clear_region(retired.region_id);

            let game_emptied = self
                .games
                .get_mut(&retired.game_id)
                .is_some_and(|game| game.on_region_shutdown(retired.region_id));

            if game_emptied {
                self.request_game_shutdown(retired.game_id);
            }
        }
    }

    pub fn report(&self, now: Instant) -> FleetReport {
        let regions = self
            .registry
            .iter()
            .map(|region| RegionReport::new(region, self.catalog.difficulty_name(region.difficulty_tier()), now))
            .collect();

        FleetReport::new(self.games.len(), regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameHandleState;
    use crate::messages::GameInstanceOpType;
    use crate::params::{AccessPortal, RegionLocation};
    use crate::test_support::{bring_up, world, SessionCall, ARENA, DIFFICULTY, PUBLIC_ZONE, RAID, STORY};
    use std::time::Duration;

    fn params() -> CreateRegionParams {
        CreateRegionParams::with_difficulty(DIFFICULTY)
    }

    fn route(
        world: &mut WorldManager,
        player: PlayerId,
        view: &mut WorldView,
        blueprint: PrototypeRef,
        now: Instant,
    ) -> RegionInstanceId {
        world
            .begin_region_transfer(player, view, blueprint, params(), now)
            .expect("transfer should be routed")
    }

    fn game_of(world: &WorldManager, region_id: RegionInstanceId) -> GameId {
        world.region(region_id).map(RegionHandle::game_id).unwrap()
    }

    #[test]
    fn test_public_transfer_waits_for_game_and_region() {
        let (mut world, outbound, sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        let game_id = game_of(&world, region_id);

        assert_eq!(
            outbound.take(),
            vec![ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Create }]
        );
        assert!(sessions.transfer_calls().is_empty());
        assert!(view.contains_region(region_id));
        assert_eq!(world.region(region_id).map(RegionHandle::reservation_count), Some(1));

        assert!(world.on_game_instance_created(game_id));
        assert!(matches!(
            outbound.take().as_slice(),
            [ServiceMessage::CreateRegion { region_id: created, .. }] if *created == region_id
        ));

        assert!(world.on_instance_create_response(region_id, true));
        assert_eq!(sessions.transfer_calls(), vec![SessionCall::ReadyToTransfer(player, region_id)]);

        // Late duplicate is ignored.
        assert!(!world.on_instance_create_response(region_id, true));
    }

    #[test]
    fn test_balancer_fills_before_creating() {
        let (mut world, _outbound, _sessions) = world();
        let now = Instant::now();

        let first = PlayerId::new();
        let second = PlayerId::new();
        let third = PlayerId::new();
        let mut first_view = WorldView::for_player(first);
        let mut second_view = WorldView::for_player(second);
        let mut third_view = WorldView::for_player(third);

        let region_id = route(&mut world, first, &mut first_view, PUBLIC_ZONE, now);
        assert_eq!(route(&mut world, second, &mut second_view, PUBLIC_ZONE, now), region_id);
        assert_eq!(world.region(region_id).map(RegionHandle::reservation_count), Some(2));

        bring_up(&mut world, region_id);
        world.on_player_entered_region(first, region_id);
        world.on_player_entered_region(second, region_id);
        assert!(world.region(region_id).is_some_and(RegionHandle::is_full));

        let overflow = route(&mut world, third, &mut third_view, PUBLIC_ZONE, now);
        assert_ne!(overflow, region_id);
        assert_eq!(game_of(&world, overflow), game_of(&world, region_id));
        assert_eq!(world.balancer(PUBLIC_ZONE).map(RegionLoadBalancer::len), Some(2));

        // A free slot makes the first region preferred again.
        world.on_player_left_region(second, region_id);
        let mut late_view = WorldView::new();
        assert_eq!(route(&mut world, PlayerId::new(), &mut late_view, PUBLIC_ZONE, now), region_id);
    }

    #[test]
    fn test_world_view_region_is_reused() {
        let (mut world, _outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let story = route(&mut world, player, &mut view, STORY, now);
        bring_up(&mut world, story);
        assert_eq!(route(&mut world, player, &mut view, STORY, now), story);
        assert_eq!(world.region(story).map(RegionHandle::reservation_count), Some(1));

        let harder = CreateRegionParams::with_difficulty(PrototypeRef(101));
        let other = world.begin_region_transfer(player, &mut view, STORY, harder, now);
        assert!(other.is_some_and(|other| other != story));
    }

    #[test]
    fn test_private_region_closes_with_its_last_reservation() {
        let (mut world, outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let story = route(&mut world, player, &mut view, STORY, now);
        let game_id = game_of(&world, story);
        bring_up(&mut world, story);
        world.on_player_entered_region(player, story);
        assert!(world.region(story).is_some_and(|region| {
            region.flags().contains(RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO)
        }));
        outbound.take();

        // The player standing in it still holds the region.
        assert!(view.remove_region(story, &mut world));
        assert!(world.registry().contains(story));
        assert!(outbound.messages().is_empty());

        assert!(world.on_player_left_region(player, story));
        assert!(!world.registry().contains(story));
        assert_eq!(world.player_location(player), None);
        assert_eq!(
            outbound.take(),
            vec![
                ServiceMessage::ShutdownRegion { game_id, region_id: story },
                ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Shutdown },
            ]
        );
        assert_eq!(world.game(game_id).map(GameHandle::state), Some(GameHandleState::PendingShutdown));

        assert!(world.on_game_instance_shutdown(game_id));
        assert_eq!(world.game_count(), 0);
    }

    #[test]
    fn test_unknown_blueprint_fails_transfer() {
        let (mut world, _outbound, sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        assert_eq!(world.begin_region_transfer(player, &mut view, PrototypeRef(999), params(), now), None);
        assert_eq!(sessions.take(), vec![SessionCall::Disconnect(player)]);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        bring_up(&mut world, region_id);
        world.on_player_entered_region(player, region_id);
        let game_id = game_of(&world, region_id);
        sessions.take();

        assert_eq!(world.begin_region_transfer(player, &mut view, PrototypeRef(999), params(), now), None);
        assert_eq!(
            sessions.take(),
            vec![SessionCall::CancelTransfer(player, game_id, RegionTransferFailure::UnknownDestination)]
        );
    }

    #[test]
    fn test_failed_creation_deregisters_region() {
        let (mut world, outbound, sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        let game_id = game_of(&world, region_id);
        world.on_game_instance_created(game_id);
        outbound.take();

        assert!(world.on_instance_create_response(region_id, false));
        assert!(!world.registry().contains(region_id));
        assert_eq!(world.balancer(PUBLIC_ZONE).map(RegionLoadBalancer::is_empty), Some(true));
        assert_eq!(sessions.transfer_calls(), vec![SessionCall::Disconnect(player)]);

        // Nothing is told to shut down a region that never existed remotely.
        assert_eq!(
            outbound.take(),
            vec![ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Shutdown }]
        );

        // The view drops the stale id on its next scan.
        assert_eq!(view.get_matching_region(&world, PUBLIC_ZONE, None), None);
        assert!(view.is_empty());
    }

    #[test]
    fn test_creation_timeout_counts_as_failure() {
        let (mut world, outbound, sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        let game_id = game_of(&world, region_id);

        world.update(now + Duration::from_secs(10));
        assert!(world.registry().contains(region_id));

        world.update(now + world.config().creation_timeout());
        assert!(!world.registry().contains(region_id));
        assert_eq!(sessions.transfer_calls(), vec![SessionCall::Disconnect(player)]);

        // The game comes up empty and is shut down right away.
        outbound.take();
        assert!(world.on_game_instance_created(game_id));
        assert_eq!(
            outbound.take(),
            vec![ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Shutdown }]
        );
    }

    #[test]
    fn test_game_shutdown_notice_disconnects_players() {
        let (mut world, outbound, sessions) = world();
        let now = Instant::now();
        let first = PlayerId::new();
        let second = PlayerId::new();
        let mut first_view = WorldView::for_player(first);
        let mut second_view = WorldView::for_player(second);

        let region_id = route(&mut world, first, &mut first_view, PUBLIC_ZONE, now);
        route(&mut world, second, &mut second_view, PUBLIC_ZONE, now);
        bring_up(&mut world, region_id);
        world.on_player_entered_region(first, region_id);
        world.on_player_entered_region(second, region_id);
        let game_id = game_of(&world, region_id);
        sessions.take();
        outbound.take();

        assert!(world.on_game_instance_shutdown(game_id));

        let calls = sessions.transfer_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&SessionCall::Disconnect(first)));
        assert!(calls.contains(&SessionCall::Disconnect(second)));
        assert!(world.registry().is_empty());
        assert!(world.game(game_id).is_none());
        assert!(outbound.messages().is_empty());
        assert_eq!(world.player_location(first), None);
    }

    #[test]
    fn test_expired_region_leaves_balancer_and_drains() {
        let (mut world, _outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        bring_up(&mut world, region_id);
        world.on_player_entered_region(player, region_id);

        let later = now + world.region(region_id).map(|region| region.blueprint().lifetime()).unwrap();
        world.update(later);

        let region = world.region(region_id).unwrap();
        assert!(region.is_expired());
        assert_eq!(region.player_access(), RegionPlayerAccess::InviteOnly);
        assert!(world.balancer(PUBLIC_ZONE).is_some_and(|balancer| !balancer.contains(region_id)));

        let mut newcomer_view = WorldView::new();
        let fresh = route(&mut world, PlayerId::new(), &mut newcomer_view, PUBLIC_ZONE, later);
        assert_ne!(fresh, region_id);

        view.clear(&mut world);
        assert!(world.registry().contains(region_id));

        world.on_player_left_region(player, region_id);
        assert!(!world.registry().contains(region_id));
    }

    #[test]
    fn test_vacant_region_deregisters_when_last_player_leaves() {
        let (mut world, outbound, _sessions) = world();
        let now = Instant::now();
        let first = PlayerId::new();
        let second = PlayerId::new();
        let mut first_view = WorldView::for_player(first);
        let mut second_view = WorldView::for_player(second);

        let region_id = route(&mut world, first, &mut first_view, ARENA, now);
        assert_eq!(route(&mut world, second, &mut second_view, ARENA, now), region_id);
        bring_up(&mut world, region_id);
        let game_id = game_of(&world, region_id);
        assert!(world.region(region_id).is_some_and(|region| {
            region.flags().contains(RegionFlags::SHUTDOWN_WHEN_VACANT)
        }));

        world.on_player_entered_region(first, region_id);
        world.on_player_entered_region(second, region_id);
        outbound.take();

        assert!(world.on_player_left_region(first, region_id));
        assert!(world.registry().contains(region_id));

        assert!(world.on_player_left_region(second, region_id));
        assert!(!world.registry().contains(region_id));
        assert_eq!(world.balancer(ARENA).map(RegionLoadBalancer::is_empty), Some(true));
        assert_eq!(
            outbound.take(),
            vec![
                ServiceMessage::ShutdownRegion { game_id, region_id },
                ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Shutdown },
            ]
        );

        // Both views drop the stale id on their next scan.
        assert_eq!(first_view.get_matching_region(&world, ARENA, None), None);
        assert!(first_view.is_empty());
    }

    #[test]
    fn test_entering_elsewhere_releases_previous_region() {
        let (mut world, _outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let story = route(&mut world, player, &mut view, STORY, now);
        bring_up(&mut world, story);
        world.on_player_entered_region(player, story);
        view.remove_region(story, &mut world);
        assert!(world.registry().contains(story));

        let blueprint = world.catalog().blueprint(PUBLIC_ZONE).cloned().unwrap();
        let zone = world.get_or_create_public_region(&blueprint, params(), now).unwrap();
        bring_up(&mut world, zone);

        // No leave notice for the story region arrives.
        assert!(world.on_player_entered_region(player, zone));
        assert!(!world.registry().contains(story));
        assert_eq!(world.player_location(player).map(|location| location.region_id), Some(zone));
    }

    #[test]
    fn test_requested_shutdown_waits_for_present_players() {
        let (mut world, outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();

        let blueprint = world.catalog().blueprint(PUBLIC_ZONE).cloned().unwrap();
        let region_id = world.get_or_create_public_region(&blueprint, params(), now).unwrap();
        bring_up(&mut world, region_id);
        let game_id = game_of(&world, region_id);
        assert!(world.on_player_entered_region(player, region_id));
        outbound.take();

        assert!(world.request_region_shutdown(region_id));
        assert!(world.registry().contains(region_id));
        assert_eq!(world.player_location(player).map(|location| location.region_id), Some(region_id));
        assert!(outbound.messages().is_empty());

        assert!(world.on_player_left_region(player, region_id));
        assert!(!world.registry().contains(region_id));
        assert_eq!(world.balancer(PUBLIC_ZONE).map(RegionLoadBalancer::is_empty), Some(true));
        assert_eq!(
            outbound.take(),
            vec![
                ServiceMessage::ShutdownRegion { game_id, region_id },
                ServiceMessage::GameInstanceOp { game_id, op: GameInstanceOpType::Shutdown },
            ]
        );

        assert!(!world.request_region_shutdown(region_id));
    }

    fn portal(entity_db_id: u64, bound_to_owner: bool, region_id: RegionInstanceId) -> AccessPortal {
        AccessPortal {
            entity_db_id,
            bound_to_owner,
            location: RegionLocation { region_id, position: [1.0, 2.0, 3.0] },
        }
    }

    #[test]
    fn test_owner_bound_portal_destroyed_with_region() {
        let (mut world, outbound, _sessions) = world();
        let now = Instant::now();
        let owner = PlayerId::new();
        let mut view = WorldView::for_player(owner);

        let hub = route(&mut world, owner, &mut view, PUBLIC_ZONE, now);
        bring_up(&mut world, hub);
        let hub_game = game_of(&world, hub);

        let raid = world.catalog().blueprint(RAID).cloned().unwrap();
        let bound = portal(900, true, hub);
        let shared = portal(901, false, hub);

        let bound_raid = world
            .create_private_region(owner, &raid, CreateRegionParams { access_portal: Some(bound.clone()), ..params() }, now)
            .unwrap();
        let shared_raid = world
            .create_private_region(owner, &raid, CreateRegionParams { access_portal: Some(shared), ..params() }, now)
            .unwrap();
        assert_ne!(game_of(&world, bound_raid), hub_game);

        view.add_region(bound_raid, &mut world);
        view.add_region(shared_raid, &mut world);
        outbound.take();

        view.remove_region(shared_raid, &mut world);
        assert!(!outbound
            .take()
            .iter()
            .any(|message| matches!(message, ServiceMessage::DestroyPortal { .. })));

        view.remove_region(bound_raid, &mut world);
        assert!(outbound
            .take()
            .contains(&ServiceMessage::DestroyPortal { game_id: hub_game, portal: bound }));
    }

    #[test]
    fn test_logout_drops_pending_transfer() {
        let (mut world, _outbound, sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        world.on_player_logged_out(player);
        assert_eq!(world.region(region_id).map(RegionHandle::transferring_count), Some(0));

        bring_up(&mut world, region_id);
        assert!(sessions.transfer_calls().is_empty());
    }

    #[test]
    fn test_fleet_report() {
        let (mut world, _outbound, _sessions) = world();
        let now = Instant::now();
        let player = PlayerId::new();
        let mut view = WorldView::for_player(player);

        let region_id = route(&mut world, player, &mut view, PUBLIC_ZONE, now);
        route(&mut world, player, &mut WorldView::new(), STORY, now);
        bring_up(&mut world, region_id);
        world.on_player_entered_region(player, region_id);

        let report = world.report(now);
        assert_eq!(report.games, 2);
        assert_eq!(report.region_count(), 2);
        assert_eq!(report.total_players, 1);
        assert_eq!(report.regions[0].region_id, region_id);
        assert_eq!(report.regions[0].difficulty, "Green");
        assert_eq!(report.regions[0].state, RegionHandleState::Running);
    }
}
