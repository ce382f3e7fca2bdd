//! Recording fakes and fixtures shared by the unit tests.

use crate::blueprint::{BlueprintCatalog, DifficultyTier, RegionBehavior, RegionBlueprint};
use crate::config::OrchestrationConfig;
use crate::manager::WorldManager;
use crate::messages::{OutboundSink, ServiceMessage};
use crate::params::CreateRegionParams;
use crate::region::{PlayerLocation, PlayerLocations, RegionContext, RegionFlags, RegionHandle, RetiredRegion};
use crate::session::{PlayerSessions, RegionTransferFailure};
use crate::types::{GameId, PlayerId, PrototypeRef, RegionInstanceId};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub const DIFFICULTY: PrototypeRef = PrototypeRef(100);

#[derive(Default)]
pub struct RecordingOutbound {
    messages: Mutex<Vec<ServiceMessage>>,
}

impl RecordingOutbound {
    pub fn messages(&self) -> Vec<ServiceMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<ServiceMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

impl OutboundSink for RecordingOutbound {
    fn send(&self, message: ServiceMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    ReadyToTransfer(PlayerId, RegionInstanceId),
    CancelTransfer(PlayerId, GameId, RegionTransferFailure),
    Disconnect(PlayerId),
    SyncWorldView(PlayerId, Vec<RegionInstanceId>),
}

#[derive(Default)]
pub struct RecordingSessions {
    calls: Mutex<Vec<SessionCall>>,
}

impl RecordingSessions {
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<SessionCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Every call except world view syncs.
    pub fn transfer_calls(&self) -> Vec<SessionCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, SessionCall::SyncWorldView(..)))
            .collect()
    }
}

impl PlayerSessions for RecordingSessions {
    fn region_ready_to_transfer(&self, player: PlayerId, region: RegionInstanceId) {
        self.calls.lock().unwrap().push(SessionCall::ReadyToTransfer(player, region));
    }

    fn cancel_region_transfer(&self, player: PlayerId, game: GameId, reason: RegionTransferFailure) {
        self.calls.lock().unwrap().push(SessionCall::CancelTransfer(player, game, reason));
    }

    fn disconnect(&self, player: PlayerId) {
        self.calls.lock().unwrap().push(SessionCall::Disconnect(player));
    }

    fn sync_world_view(&self, player: PlayerId, regions: &[RegionInstanceId]) {
        self.calls.lock().unwrap().push(SessionCall::SyncWorldView(player, regions.to_vec()));
    }
}

/// Owns everything a [`RegionContext`] borrows.
pub struct Harness {
    pub outbound: Arc<RecordingOutbound>,
    pub sessions: Arc<RecordingSessions>,
    pub locations: PlayerLocations,
    pub retired: Vec<RetiredRegion>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            outbound: Arc::new(RecordingOutbound::default()),
            sessions: Arc::new(RecordingSessions::default()),
            locations: PlayerLocations::new(),
            retired: Vec::new(),
        }
    }

    pub fn ctx(&mut self) -> RegionContext<'_> {
        RegionContext::new(
            &*self.outbound,
            &*self.sessions,
            &self.locations,
            &mut self.retired,
        )
    }

    pub fn ctx_with<'a>(&'a self, retired: &'a mut Vec<RetiredRegion>) -> RegionContext<'a> {
        RegionContext::new(&*self.outbound, &*self.sessions, &self.locations, retired)
    }

    pub fn place(&mut self, player: PlayerId, game_id: GameId, region_id: RegionInstanceId) {
        self.locations.set(player, PlayerLocation { game_id, region_id });
    }
}

pub fn blueprint(id: u64, name: &str, behavior: RegionBehavior, limit: usize, is_public: bool) -> RegionBlueprint {
    RegionBlueprint {
        id: PrototypeRef(id),
        name: name.to_string(),
        behavior,
        player_limit: limit,
        is_public,
        close_when_reservations_reach_zero: false,
        always_shutdown_when_vacant: false,
        lifetime_secs: 4 * 60 * 60,
    }
}

pub fn public_zone(id: u64, limit: usize) -> Arc<RegionBlueprint> {
    Arc::new(blueprint(id, "Midtown Patrol", RegionBehavior::PublicCombatZone, limit, true))
}

pub fn private_story(id: u64) -> Arc<RegionBlueprint> {
    let mut story = blueprint(id, "Hell's Kitchen Rooftops", RegionBehavior::PrivateStory, 10, false);
    story.close_when_reservations_reach_zero = true;
    Arc::new(story)
}

pub fn handle(id: RegionInstanceId, blueprint: Arc<RegionBlueprint>) -> RegionHandle {
    handle_with_params(id, blueprint, CreateRegionParams::with_difficulty(DIFFICULTY))
}

pub fn handle_with_params(
    id: RegionInstanceId,
    blueprint: Arc<RegionBlueprint>,
    params: CreateRegionParams,
) -> RegionHandle {
    RegionHandle::new(id, GameId(1), blueprint, params, RegionFlags::NONE, Instant::now())
}

/// A handle that already confirmed creation.
pub fn running(id: RegionInstanceId, blueprint: Arc<RegionBlueprint>, harness: &mut Harness) -> RegionHandle {
    let mut region = handle(id, blueprint);
    region.on_instance_create_response(true, &mut harness.ctx());
    region
}

pub const PUBLIC_ZONE: PrototypeRef = PrototypeRef(1);
pub const TOWN: PrototypeRef = PrototypeRef(2);
pub const STORY: PrototypeRef = PrototypeRef(3);
pub const RAID: PrototypeRef = PrototypeRef(4);
pub const ARENA: PrototypeRef = PrototypeRef(5);

/// A public zone that closes whenever nobody is inside.
pub fn arena(id: u64) -> RegionBlueprint {
    let mut arena = blueprint(id, "Danger Room", RegionBehavior::PublicCombatZone, 4, true);
    arena.always_shutdown_when_vacant = true;
    arena
}

/// A manager with a small catalog and recording collaborators.
pub fn world() -> (WorldManager, Arc<RecordingOutbound>, Arc<RecordingSessions>) {
    world_with(OrchestrationConfig::default())
}

pub fn world_with(config: OrchestrationConfig) -> (WorldManager, Arc<RecordingOutbound>, Arc<RecordingSessions>) {
    let catalog = BlueprintCatalog::from_parts(
        vec![
            (*public_zone(PUBLIC_ZONE.0, 2)).clone(),
            blueprint(TOWN.0, "Avengers Tower", RegionBehavior::Town, 100, true),
            (*private_story(STORY.0)).clone(),
            blueprint(RAID.0, "Cosmic Raid", RegionBehavior::PrivateRaid, 10, false),
            arena(ARENA.0),
        ],
        vec![DifficultyTier { id: DIFFICULTY, name: "Green".to_string() }],
    )
    .unwrap();

    let outbound = Arc::new(RecordingOutbound::default());
    let sessions = Arc::new(RecordingSessions::default());
    let manager = WorldManager::new(config, catalog, outbound.clone(), sessions.clone());
    (manager, outbound, sessions)
}

/// Confirms the game and the creation of a region.
pub fn bring_up(world: &mut WorldManager, region_id: RegionInstanceId) {
    if let Some(game_id) = world.region(region_id).map(|region| region.game_id()) {
        if world.game(game_id).is_some_and(|game| !game.is_running()) {
            world.on_game_instance_created(game_id);
        }
    }
    world.on_instance_create_response(region_id, true);
}
