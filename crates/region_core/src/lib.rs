//! # Region Core
//!
//! Region-instance orchestration for a clustered game server. This crate
//! decides which running region instance a player is sent to, asks remote
//! game instances to create new regions when nothing fits, tracks who depends
//! on each instance, and shuts instances down once nobody needs them.
//!
//! ## Core Components
//!
//! - **World Registry** ([`WorldRegistry`]): namespaced id allocation and the
//!   authoritative id to handle map
//! - **Region Handles** ([`RegionHandle`]): lifecycle state machine, player
//!   membership and shutdown policy of one region instance
//! - **Load Balancers** ([`RegionLoadBalancer`]): occupancy-ordered public
//!   instances per blueprint
//! - **World Views** ([`WorldView`]): regions a player or party may return
//!   to, backed by reservations
//! - **World Manager** ([`WorldManager`]): the orchestration context that
//!   owns all of the above plus the game handles
//!
//! ## Routing Flow
//!
//! A transfer request is resolved against the requester's world view first,
//! then against the load balancer for public blueprints, and finally by
//! creating a new instance. The player is queued on the chosen handle and
//! admitted once the instance confirms creation.
//!
//! ```rust
//! use region_core::*;
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! struct Discard;
//! impl OutboundSink for Discard {
//!     fn send(&self, _message: ServiceMessage) {}
//! }
//! impl PlayerSessions for Discard {
//!     fn region_ready_to_transfer(&self, _player: PlayerId, _region: RegionInstanceId) {}
//!     fn cancel_region_transfer(&self, _player: PlayerId, _game: GameId, _reason: RegionTransferFailure) {}
//!     fn disconnect(&self, _player: PlayerId) {}
//!     fn sync_world_view(&self, _player: PlayerId, _regions: &[RegionInstanceId]) {}
//! }
//!
//! let mut catalog = BlueprintCatalog::new();
//! catalog.add_blueprint(RegionBlueprint {
//!     id: PrototypeRef(1),
//!     name: "Midtown Patrol".to_string(),
//!     behavior: RegionBehavior::PublicCombatZone,
//!     player_limit: 50,
//!     is_public: true,
//!     close_when_reservations_reach_zero: false,
//!     always_shutdown_when_vacant: false,
//!     lifetime_secs: 4 * 60 * 60,
//! })?;
//!
//! let mut world = WorldManager::new(
//!     OrchestrationConfig::default(),
//!     catalog,
//!     Arc::new(Discard),
//!     Arc::new(Discard),
//! );
//!
//! let player = PlayerId::new();
//! let mut view = WorldView::for_player(player);
//! let region = world.begin_region_transfer(
//!     player,
//!     &mut view,
//!     PrototypeRef(1),
//!     CreateRegionParams::with_difficulty(PrototypeRef(100)),
//!     Instant::now(),
//! );
//! assert!(region.is_some_and(|region| view.contains_region(region)));
//! # Ok::<(), CatalogError>(())
//! ```

pub mod balancer;
pub mod blueprint;
pub mod config;
pub mod game;
pub mod manager;
pub mod messages;
pub mod params;
pub mod region;
pub mod registry;
pub mod report;
pub mod session;
pub mod types;
pub mod world_view;

#[cfg(test)]
mod test_support;

pub use balancer::RegionLoadBalancer;
pub use blueprint::{BlueprintCatalog, CatalogError, DifficultyTier, RegionBehavior, RegionBlueprint};
pub use config::OrchestrationConfig;
pub use game::{GameHandle, GameHandleState, GameKind};
pub use manager::WorldManager;
pub use messages::{GameInstanceOpType, OutboundSink, ServiceMessage};
pub use params::{AccessPortal, CreateRegionParams, RegionLocation};
pub use region::{
    PlayerLocation, PlayerLocations, RegionContext, RegionFlags, RegionHandle, RegionHandleState,
    RegionPlayerAccess, RetiredRegion,
};
pub use registry::{IdGenerator, IdNamespace, WorldRegistry};
pub use report::{current_timestamp, FleetReport, RegionReport};
pub use session::{PlayerSessions, RegionTransferFailure};
pub use types::{GameId, PlayerId, PrototypeRef, RegionInstanceId};
pub use world_view::WorldView;
