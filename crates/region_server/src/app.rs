//! Main application logic and lifecycle management.
//!
//! The `Application` wires the orchestration service to the process: inbound
//! messages arrive as JSON lines, outbound service messages and session
//! events are forwarded to the log, and a monitoring task reports the fleet
//! periodically until shutdown.

use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use region_core::{FleetReport, ServiceMessage};
use region_service::{
    ChannelOutbound, ChannelSessions, InboundMessage, OrchestrationService, ServiceHandle, ServiceStats,
    SessionEvent, ShutdownState,
};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What the application did before it stopped.
#[derive(Debug)]
pub struct ApplicationSummary {
    pub stats: ServiceStats,
    pub final_report: Option<FleetReport>,
    pub outbound_messages: u64,
    pub session_events: u64,
    pub rejected_lines: u64,
}

/// Owner of the service and its transport plumbing.
pub struct Application {
    config: AppConfig,
    service: OrchestrationService,
    handle: ServiceHandle,
    shutdown: ShutdownState,
    outbound: UnboundedReceiver<ServiceMessage>,
    sessions: UnboundedReceiver<SessionEvent>,
}

impl Application {
    /// Validates the configuration and builds the orchestration service.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration validated successfully");

        let catalog = config.to_catalog()?;
        let (outbound_sink, outbound) = ChannelOutbound::new();
        let (session_sink, sessions) = ChannelSessions::new();
        let shutdown = ShutdownState::new();

        let (service, handle) = OrchestrationService::new(
            config.to_service_config(),
            catalog,
            Arc::new(outbound_sink),
            Arc::new(session_sink),
            shutdown.clone(),
        )?;

        Ok(Self {
            config,
            service,
            handle,
            shutdown,
            outbound,
            sessions,
        })
    }

    /// Runs on stdin until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<ApplicationSummary, Box<dyn std::error::Error>> {
        display_banner();

        let stop = async {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!("❌ Failed to listen for shutdown signals: {e}");
            }

            // merciless shutdown
            tokio::spawn(async {
                if let Err(e) = wait_for_shutdown_signal_silent().await {
                    error!("Failed to set up merciless shutdown signal handler: {e}");
                    return;
                }

                warn!("Shutdown handler received again! I'll make this quick.");
                std::process::exit(1);
            });
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");
        self.run_until(BufReader::new(tokio::io::stdin()), stop).await
    }

    /// Runs with `input` as the inbound message stream until `stop` resolves.
    pub async fn run_until<R, F>(self, input: R, stop: F) -> Result<ApplicationSummary, Box<dyn std::error::Error>>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let Self { config, service, handle, shutdown, outbound, sessions } = self;

        log_configuration_summary(&config);

        let service_task = service.spawn();
        let outbound_task = tokio::spawn(forward_outbound(outbound));
        let session_task = tokio::spawn(forward_sessions(sessions));
        let rejected = Arc::new(AtomicU64::new(0));
        let input_task = tokio::spawn(read_inbound(input, handle.clone(), rejected.clone()));
        let monitoring_task = spawn_monitoring(handle.clone(), Duration::from_secs(config.server.report_interval_secs));

        info!("✅ Region orchestration server is now running!");
        info!("🔍 Fleet reports every {} seconds", config.server.report_interval_secs);

        stop.await;

        info!("🛑 Shutdown requested, beginning graceful shutdown...");

        // Phase 1: stop producing new work
        info!("📡 Phase 1: Stopping inbound processing...");
        monitoring_task.abort();
        input_task.abort();
        if let Err(e) = input_task.await {
            if !e.is_cancelled() {
                error!("❌ Inbound reader task failed: {e}");
            }
        }
        let rejected_lines = rejected.load(Ordering::Relaxed);

        let final_report = match handle.fleet_report().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("⚠️ Could not collect final fleet report: {e}");
                None
            }
        };

        // Phase 2: stop the service loop
        info!("⏳ Phase 2: Draining the orchestration service...");
        shutdown.initiate_shutdown();
        drop(handle);

        let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
        let stats = match tokio::time::timeout(timeout, service_task).await {
            Ok(Ok(Ok(stats))) => stats,
            Ok(Ok(Err(e))) => return Err(e.into()),
            Ok(Err(e)) => return Err(format!("Orchestration service task failed: {e}").into()),
            Err(_) => {
                warn!("⏰ Service did not stop within {}s", timeout.as_secs());
                return Err("orchestration service shutdown timed out".into());
            }
        };

        // Phase 3: flush what the service sent on its way out
        info!("🧹 Phase 3: Flushing outbound traffic...");
        let outbound_messages = join_forwarder(outbound_task, timeout).await;
        let session_events = join_forwarder(session_task, timeout).await;

        let summary = ApplicationSummary {
            stats,
            final_report,
            outbound_messages,
            session_events,
            rejected_lines,
        };

        log_final_statistics(&summary);
        info!("✅ Region orchestration server shutdown complete");

        Ok(summary)
    }
}

/// Logs the configuration summary at startup.
fn log_configuration_summary(config: &AppConfig) {
    info!("📋 Configuration Summary:");
    info!("  🗺️ Blueprints: {}", config.blueprints.len());
    info!("  🎚️ Difficulty tiers: {}", config.difficulty_tiers.len());
    info!("  ⏱️ Creation timeout: {}ms", config.orchestration.creation_timeout_ms);
    info!(
        "  ⚖️ Balancer maintenance: {}ms",
        config.orchestration.balancer_maintenance_interval_ms
    );
    info!(
        "  📦 Regions per public game: {}",
        config.orchestration.max_regions_per_public_game
    );
}

fn log_final_statistics(summary: &ApplicationSummary) {
    info!("📊 Final Statistics:");
    info!("  - Inbound messages handled: {}", summary.stats.messages_handled);
    info!("  - Maintenance ticks: {}", summary.stats.maintenance_ticks);
    info!("  - Outbound messages: {}", summary.outbound_messages);
    info!("  - Session events: {}", summary.session_events);
    if summary.rejected_lines > 0 {
        info!("  - Rejected input lines: {}", summary.rejected_lines);
    }
    if let Some(report) = &summary.final_report {
        info!(
            "  - Regions at shutdown: {} ({} players)",
            report.region_count(),
            report.total_players
        );
    }
}

/// Parses JSON lines into inbound messages, counting rejected lines in `rejected`.
async fn read_inbound<R>(input: R, handle: ServiceHandle, rejected: Arc<AtomicU64>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("📭 Inbound stream closed");
                break;
            }
            Err(e) => {
                error!("❌ Failed to read inbound stream: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match serde_json::from_str::<InboundMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("⚠️ Rejected inbound line: {e}");
                rejected.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        if let Err(e) = handle.send(message) {
            warn!("⚠️ {e}");
            break;
        }
    }
}

async fn forward_outbound(mut outbound: UnboundedReceiver<ServiceMessage>) -> u64 {
    let mut forwarded = 0;
    while let Some(message) = outbound.recv().await {
        forwarded += 1;
        match serde_json::to_string(&message) {
            Ok(json) => info!("📤 {}", json),
            Err(e) => error!("❌ Failed to encode outbound message: {e}"),
        }
    }
    forwarded
}

async fn forward_sessions(mut sessions: UnboundedReceiver<SessionEvent>) -> u64 {
    let mut forwarded = 0;
    while let Some(event) = sessions.recv().await {
        forwarded += 1;
        match serde_json::to_string(&event) {
            Ok(json) => info!("🎮 {}", json),
            Err(e) => error!("❌ Failed to encode session event: {e}"),
        }
    }
    forwarded
}

async fn join_forwarder(task: JoinHandle<u64>, timeout: Duration) -> u64 {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            error!("❌ Forwarder task failed: {e}");
            0
        }
        Err(_) => {
            warn!("⏰ Forwarder did not finish within {}s", timeout.as_secs());
            0
        }
    }
}

fn spawn_monitoring(handle: ServiceHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            let report = match handle.fleet_report().await {
                Ok(report) => report,
                Err(e) => {
                    warn!("⚠️ Fleet monitoring stopped: {e}");
                    break;
                }
            };

            info!(
                "📊 Fleet Health - {} games | {} regions | {} players | {} transferring",
                report.games,
                report.region_count(),
                report.total_players,
                report.total_transferring
            );

            match serde_json::to_string(&report) {
                Ok(json) => debug!("{}", json),
                Err(e) => error!("❌ Failed to encode fleet report: {e}"),
            }
        }
    })
}
