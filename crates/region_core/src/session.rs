//! Callbacks into the player session layer.
//!
//! Sessions, authentication and client networking live elsewhere. The
//! orchestration core only ever needs the four notifications of
//! [`PlayerSessions`].

use crate::types::{GameId, PlayerId, RegionInstanceId};
use serde::{Deserialize, Serialize};

/// Reason reported to a player whose region transfer could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionTransferFailure {
    /// The destination instance is gone or could not be created
    DestinationInaccessible,
    /// The destination instance has no room left
    DestinationFull,
    /// The destination instance is not accepting new players
    InviteOnly,
    /// The requested blueprint does not exist
    UnknownDestination,
}

/// Notifications delivered to the player session collaborator.
pub trait PlayerSessions: Send + Sync {
    /// The region a player is transferring into is ready.
    fn region_ready_to_transfer(&self, player: PlayerId, region: RegionInstanceId);

    /// The transfer failed; the player should roll back to `game`.
    fn cancel_region_transfer(&self, player: PlayerId, game: GameId, reason: RegionTransferFailure);

    /// The player has nowhere safe to go and must be disconnected.
    fn disconnect(&self, player: PlayerId);

    /// Pushes the regions a player may currently return to.
    fn sync_world_view(&self, player: PlayerId, regions: &[RegionInstanceId]);
}
