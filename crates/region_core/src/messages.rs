//! Outbound messages to the game instance service.
//!
//! Everything this subsystem tells the remote worker layer is a one-way
//! [`ServiceMessage`]. There is never a synchronous reply: results come back
//! later as separately delivered inbound messages.

use crate::params::{AccessPortal, CreateRegionParams};
use crate::types::{GameId, PrototypeRef, RegionInstanceId};
use serde::{Deserialize, Serialize};

/// Operation requested on a whole game instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameInstanceOpType {
    Create,
    Shutdown,
}

/// A one-way message addressed to the game instance service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceMessage {
    /// Create or shut down a whole game instance
    GameInstanceOp {
        game_id: GameId,
        op: GameInstanceOpType,
    },
    /// Create a region instance inside a running game
    CreateRegion {
        game_id: GameId,
        region_id: RegionInstanceId,
        blueprint: PrototypeRef,
        create_params: CreateRegionParams,
    },
    /// Shut a region instance down
    ShutdownRegion {
        game_id: GameId,
        region_id: RegionInstanceId,
    },
    /// Destroy the portal entity bound to a region that is going away
    DestroyPortal {
        game_id: GameId,
        portal: AccessPortal,
    },
}

impl ServiceMessage {
    /// The game instance this message is addressed to.
    pub fn game_id(&self) -> GameId {
        match self {
            ServiceMessage::GameInstanceOp { game_id, .. }
            | ServiceMessage::CreateRegion { game_id, .. }
            | ServiceMessage::ShutdownRegion { game_id, .. }
            | ServiceMessage::DestroyPortal { game_id, .. } => *game_id,
        }
    }
}

/// Destination for outbound service messages.
///
/// Injected into the orchestration context at construction so the transport
/// stays replaceable in tests.
pub trait OutboundSink: Send + Sync {
    /// Queues a message for delivery. Must not block.
    fn send(&self, message: ServiceMessage);
}
