//! Handles for remote game instances.
//!
//! A game is one worker-side process grouping that hosts region instances.
//! Regions can be created in a game before the game itself is up; their
//! creation requests are held back until the game confirms it is running.

use crate::messages::{GameInstanceOpType, OutboundSink, ServiceMessage};
use crate::types::{GameId, PlayerId, RegionInstanceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

/// Lifecycle state of a game handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameHandleState {
    HandleCreated,
    PendingInstanceCreation,
    Running,
    PendingShutdown,
    Shutdown,
}

/// Who a game hosts regions for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameKind {
    /// Shared by public regions
    Public,
    /// Hosts the private regions of a single player
    Private(PlayerId),
}

#[derive(Debug)]
pub struct GameHandle {
    id: GameId,
    kind: GameKind,
    state: GameHandleState,
    regions: BTreeSet<RegionInstanceId>,
}

impl GameHandle {
    pub fn new(id: GameId, kind: GameKind) -> Self {
        Self {
            id,
            kind,
            state: GameHandleState::HandleCreated,
            regions: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn state(&self) -> GameHandleState {
        self.state
    }

    pub fn is_public(&self) -> bool {
        self.kind == GameKind::Public
    }

    pub fn is_running(&self) -> bool {
        self.state == GameHandleState::Running
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == GameHandleState::Shutdown
    }

    /// Returns true while new regions may still be placed in this game.
    pub fn accepts_regions(&self) -> bool {
        matches!(
            self.state,
            GameHandleState::HandleCreated | GameHandleState::PendingInstanceCreation | GameHandleState::Running
        )
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = RegionInstanceId> + '_ {
        self.regions.iter().copied()
    }

    pub fn hosts(&self, region_id: RegionInstanceId) -> bool {
        self.regions.contains(&region_id)
    }

    pub fn request_instance_creation(&mut self, outbound: &dyn OutboundSink) -> bool {
        if self.state != GameHandleState::HandleCreated {
            warn!("RequestInstanceCreation(): Invalid state {:?} for game {}", self.state, self);
            return false;
        }

        self.state = GameHandleState::PendingInstanceCreation;
        info!("Requesting instance creation for game {}", self);

        outbound.send(ServiceMessage::GameInstanceOp {
            game_id: self.id,
            op: GameInstanceOpType::Create,
        });

        true
    }

    /// Marks the game running.
    ///
    /// Returns false if the confirmation was unexpected.
    pub fn on_instance_created(&mut self) -> bool {
        if self.state != GameHandleState::PendingInstanceCreation {
            warn!("OnInstanceCreated(): Invalid state {:?} for game {}", self.state, self);
            return false;
        }

        self.state = GameHandleState::Running;
        info!("Game {} is running with {} pending regions", self, self.regions.len());
        true
    }

    /// Asks the remote game to shut down.
    ///
    /// A game still being created cannot be stopped yet; it is shut down once
    /// it confirms creation with no regions left.
    pub fn request_shutdown(&mut self, outbound: &dyn OutboundSink) -> bool {
        match self.state {
            GameHandleState::HandleCreated => {
                // Never requested remotely, nothing to tell anyone.
                self.state = GameHandleState::Shutdown;
                true
            }
            GameHandleState::PendingInstanceCreation => {
                warn!("RequestShutdown(): Game {} is still being created", self);
                false
            }
            GameHandleState::Running => {
                self.state = GameHandleState::PendingShutdown;
                info!("Requesting shutdown for game {}", self);
                outbound.send(ServiceMessage::GameInstanceOp {
                    game_id: self.id,
                    op: GameInstanceOpType::Shutdown,
                });
                true
            }
            GameHandleState::PendingShutdown | GameHandleState::Shutdown => {
                warn!("RequestShutdown(): Game {} is already shutting down", self);
                false
            }
        }
    }

    pub fn on_instance_shutdown(&mut self) {
        info!("Game {} is shut down", self);
        self.state = GameHandleState::Shutdown;
    }

    pub fn add_region(&mut self, region_id: RegionInstanceId) -> bool {
        self.regions.insert(region_id)
    }

    /// Drops a region that shut down.
    ///
    /// Returns true if this left a running game empty, in which case the
    /// game should be shut down.
    pub fn on_region_shutdown(&mut self, region_id: RegionInstanceId) -> bool {
        if !self.regions.remove(&region_id) {
            warn!("OnRegionShutdown(): Region {} is not hosted by game {}", region_id, self);
            return false;
        }

        self.regions.is_empty() && self.state == GameHandleState::Running
    }
}

impl fmt::Display for GameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            GameKind::Public => write!(f, "{} (public)", self.id),
            GameKind::Private(owner) => write!(f, "{} (private, {})", self.id, owner),
        }
    }
}
