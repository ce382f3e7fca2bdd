//! The single-writer orchestration service.
//!
//! All orchestration state lives inside one [`OrchestrationService`] that is
//! driven by one tokio task. Other tasks talk to it exclusively through a
//! cloneable [`ServiceHandle`], which queues requests on an unbounded channel.
//! Because nothing else touches the state, the core needs no locks.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::messages::{InboundMessage, ServiceRequest};
use crate::players::PlayerDirectory;
use crate::shutdown::ShutdownState;
use region_core::{BlueprintCatalog, FleetReport, OutboundSink, PlayerSessions, WorldManager};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Counters reported when the service stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub messages_handled: u64,
    pub reports_served: u64,
    pub maintenance_ticks: u64,
}

/// Cloneable sender side of the service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    sender: mpsc::UnboundedSender<ServiceRequest>,
}

impl ServiceHandle {
    /// Queues an inbound message.
    pub fn send(&self, message: InboundMessage) -> Result<(), ServiceError> {
        let kind = message.kind();
        self.sender
            .send(ServiceRequest::Inbound(message))
            .map_err(|_| ServiceError::ChannelClosed(format!("orchestration service stopped, dropped {}", kind)))
    }

    /// Asks the service for a fleet snapshot.
    pub async fn fleet_report(&self) -> Result<FleetReport, ServiceError> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(ServiceRequest::FleetReport { reply })
            .map_err(|_| ServiceError::ChannelClosed("orchestration service stopped".to_string()))?;

        response
            .await
            .map_err(|_| ServiceError::ChannelClosed("fleet report was not answered".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Owner of the orchestration state and its request queue.
pub struct OrchestrationService {
    config: ServiceConfig,
    world: WorldManager,
    players: PlayerDirectory,
    receiver: mpsc::UnboundedReceiver<ServiceRequest>,
    shutdown: ShutdownState,
    stats: ServiceStats,
}

impl OrchestrationService {
    pub fn new(
        config: ServiceConfig,
        catalog: BlueprintCatalog,
        outbound: Arc<dyn OutboundSink>,
        sessions: Arc<dyn PlayerSessions>,
        shutdown: ShutdownState,
    ) -> Result<(Self, ServiceHandle), ServiceError> {
        config.validate()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let world = WorldManager::new(config.orchestration.clone(), catalog, outbound, sessions);

        let service = Self {
            config,
            world,
            players: PlayerDirectory::new(),
            receiver,
            shutdown,
            stats: ServiceStats::default(),
        };

        Ok((service, ServiceHandle { sender }))
    }

    pub fn world(&self) -> &WorldManager {
        &self.world
    }

    pub fn players(&self) -> &PlayerDirectory {
        &self.players
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    /// Applies one inbound message to the orchestration state.
    pub fn handle_message(&mut self, message: InboundMessage, now: Instant) {
        trace!("📨 Handling {}", message.kind());
        self.stats.messages_handled += 1;

        let world = &mut self.world;
        let players = &mut self.players;

        match message {
            InboundMessage::PlayerLoggedIn { player } => {
                players.log_in(player);
            }
            InboundMessage::PlayerLoggedOut { player } => {
                players.log_out(player, world);
            }
            InboundMessage::RegionTransferRequest { player, blueprint, params } => {
                if let Some(region_id) = players.begin_transfer(player, blueprint, params, world, now) {
                    debug!("🧭 Routed player {} to region {}", player, region_id);
                }
            }
            InboundMessage::RegionInstanceCreated { region_id, success } => {
                world.on_instance_create_response(region_id, success);
            }
            InboundMessage::GameInstanceCreated { game_id } => {
                world.on_game_instance_created(game_id);
            }
            InboundMessage::GameInstanceShutdown { game_id } => {
                world.on_game_instance_shutdown(game_id);
            }
            InboundMessage::PlayerEnteredRegion { player, region_id } => {
                world.on_player_entered_region(player, region_id);
            }
            InboundMessage::PlayerLeftRegion { player, region_id } => {
                world.on_player_left_region(player, region_id);
            }
            InboundMessage::RequestRegionShutdown { region_id } => {
                world.request_region_shutdown(region_id);
            }
            InboundMessage::ClearPrivateStoryRegions { player } => {
                let cleared = players.clear_private_story_regions(player, world);
                debug!("🧹 Cleared {} story regions for player {}", cleared, player);
            }
            InboundMessage::PartyFormed { party, leader } => {
                players.form_party(party, leader, world);
            }
            InboundMessage::PartyMemberJoined { party, player } => {
                players.join_party(party, player, world);
            }
            InboundMessage::PartyMemberLeft { party, player } => {
                players.leave_party(party, player, world);
            }
            InboundMessage::PartyDisbanded { party } => {
                players.disband_party(party, world);
            }
        }
    }

    fn handle_request(&mut self, request: ServiceRequest, now: Instant) {
        match request {
            ServiceRequest::Inbound(message) => self.handle_message(message, now),
            ServiceRequest::FleetReport { reply } => {
                self.stats.reports_served += 1;
                if reply.send(self.world.report(now)).is_err() {
                    warn!("⚠️ Fleet report requester went away");
                }
            }
        }
    }

    /// Runs timeouts, expiration and balancer maintenance.
    pub fn tick(&mut self, now: Instant) {
        self.stats.maintenance_ticks += 1;
        self.world.update(now);
    }

    /// Processes requests until shutdown is initiated or every handle is dropped.
    pub async fn run(mut self) -> Result<ServiceStats, ServiceError> {
        let tick_interval = self.config.orchestration.maintenance_tick();
        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "🚀 Orchestration service started with {} blueprints (tick {}ms)",
            self.world.catalog().blueprint_count(),
            tick_interval.as_millis()
        );

        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.initiated() => {
                    info!("🛑 Orchestration service stopping - shutdown initiated");
                    break;
                }
                request = self.receiver.recv() => {
                    match request {
                        Some(request) => self.handle_request(request, Instant::now()),
                        None => {
                            info!("📭 All service handles dropped, stopping");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        if self.config.drain_on_shutdown {
            let mut drained = 0;
            while let Ok(request) = self.receiver.try_recv() {
                self.handle_request(request, Instant::now());
                drained += 1;
            }
            if drained > 0 {
                info!("🧹 Drained {} queued requests", drained);
            }
        }

        self.receiver.close();
        shutdown.complete_shutdown();

        info!(
            "✅ Orchestration service stopped after {} messages, {} regions still registered",
            self.stats.messages_handled,
            self.world.registry().len()
        );

        Ok(self.stats)
    }

    /// Runs the service on its own task.
    pub fn spawn(self) -> JoinHandle<Result<ServiceStats, ServiceError>> {
        tokio::spawn(self.run())
    }
}
