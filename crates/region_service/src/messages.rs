//! Inbound message surface of the orchestration service.
//!
//! Game instances and the session layer report events as [`InboundMessage`]s.
//! They are JSON-tagged by `type`, so a newline-delimited feed can be parsed
//! directly:
//!
//! ```json
//! { "type": "region_transfer_request", "player": "6f0c...", "blueprint": 1,
//!   "params": { "difficulty_tier": 100 } }
//! ```

use region_core::{CreateRegionParams, FleetReport, GameId, PlayerId, PrototypeRef, RegionInstanceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Identifier of a player party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(pub u64);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party-{}", self.0)
    }
}

/// An event delivered to the orchestration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    PlayerLoggedIn {
        player: PlayerId,
    },
    PlayerLoggedOut {
        player: PlayerId,
    },
    /// A player wants to go to an instance of `blueprint`
    RegionTransferRequest {
        player: PlayerId,
        blueprint: PrototypeRef,
        #[serde(default)]
        params: CreateRegionParams,
    },
    /// Result of a region creation request
    RegionInstanceCreated {
        region_id: RegionInstanceId,
        success: bool,
    },
    GameInstanceCreated {
        game_id: GameId,
    },
    /// A game instance went away, requested or not
    GameInstanceShutdown {
        game_id: GameId,
    },
    PlayerEnteredRegion {
        player: PlayerId,
        region_id: RegionInstanceId,
    },
    PlayerLeftRegion {
        player: PlayerId,
        region_id: RegionInstanceId,
    },
    RequestRegionShutdown {
        region_id: RegionInstanceId,
    },
    ClearPrivateStoryRegions {
        player: PlayerId,
    },
    PartyFormed {
        party: PartyId,
        leader: PlayerId,
    },
    PartyMemberJoined {
        party: PartyId,
        player: PlayerId,
    },
    PartyMemberLeft {
        party: PartyId,
        player: PlayerId,
    },
    PartyDisbanded {
        party: PartyId,
    },
}

impl InboundMessage {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::PlayerLoggedIn { .. } => "player_logged_in",
            InboundMessage::PlayerLoggedOut { .. } => "player_logged_out",
            InboundMessage::RegionTransferRequest { .. } => "region_transfer_request",
            InboundMessage::RegionInstanceCreated { .. } => "region_instance_created",
            InboundMessage::GameInstanceCreated { .. } => "game_instance_created",
            InboundMessage::GameInstanceShutdown { .. } => "game_instance_shutdown",
            InboundMessage::PlayerEnteredRegion { .. } => "player_entered_region",
            InboundMessage::PlayerLeftRegion { .. } => "player_left_region",
            InboundMessage::RequestRegionShutdown { .. } => "request_region_shutdown",
            InboundMessage::ClearPrivateStoryRegions { .. } => "clear_private_story_regions",
            InboundMessage::PartyFormed { .. } => "party_formed",
            InboundMessage::PartyMemberJoined { .. } => "party_member_joined",
            InboundMessage::PartyMemberLeft { .. } => "party_member_left",
            InboundMessage::PartyDisbanded { .. } => "party_disbanded",
        }
    }
}

/// A request queued on the service channel.
#[derive(Debug)]
pub enum ServiceRequest {
    Inbound(InboundMessage),
    /// Snapshot of the fleet, answered on `reply`
    FleetReport { reply: oneshot::Sender<FleetReport> },
}
