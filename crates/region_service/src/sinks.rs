//! Channel-backed implementations of the core's collaborator traits.
//!
//! The core calls its collaborators synchronously from the service task.
//! These sinks turn every call into a message on an unbounded channel so the
//! receiving side can forward it to the transport without ever blocking the
//! service loop.

use region_core::{
    GameId, OutboundSink, PlayerId, PlayerSessions, RegionInstanceId, RegionTransferFailure, ServiceMessage,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Forwards outbound service messages to a channel.
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    sender: mpsc::UnboundedSender<ServiceMessage>,
}

impl ChannelOutbound {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServiceMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl OutboundSink for ChannelOutbound {
    fn send(&self, message: ServiceMessage) {
        if let Err(e) = self.sender.send(message) {
            warn!("⚠️ Outbound channel closed, dropping {:?}", e.0);
        }
    }
}

/// A notification for the player session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ReadyToTransfer {
        player: PlayerId,
        region_id: RegionInstanceId,
    },
    CancelTransfer {
        player: PlayerId,
        game_id: GameId,
        reason: RegionTransferFailure,
    },
    Disconnect {
        player: PlayerId,
    },
    SyncWorldView {
        player: PlayerId,
        regions: Vec<RegionInstanceId>,
    },
}

impl SessionEvent {
    pub fn player(&self) -> PlayerId {
        match self {
            SessionEvent::ReadyToTransfer { player, .. }
            | SessionEvent::CancelTransfer { player, .. }
            | SessionEvent::Disconnect { player }
            | SessionEvent::SyncWorldView { player, .. } => *player,
        }
    }
}

/// Forwards session callbacks to a channel as [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct ChannelSessions {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSessions {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn push(&self, event: SessionEvent) {
        if let Err(e) = self.sender.send(event) {
            warn!("⚠️ Session channel closed, dropping {:?}", e.0);
        }
    }
}

impl PlayerSessions for ChannelSessions {
    fn region_ready_to_transfer(&self, player: PlayerId, region_id: RegionInstanceId) {
        self.push(SessionEvent::ReadyToTransfer { player, region_id });
    }

    fn cancel_region_transfer(&self, player: PlayerId, game_id: GameId, reason: RegionTransferFailure) {
        self.push(SessionEvent::CancelTransfer { player, game_id, reason });
    }

    fn disconnect(&self, player: PlayerId) {
        self.push(SessionEvent::Disconnect { player });
    }

    fn sync_world_view(&self, player: PlayerId, regions: &[RegionInstanceId]) {
        self.push(SessionEvent::SyncWorldView {
            player,
            regions: regions.to_vec(),
        });
    }
}
