//! Logging system setup.
//!
//! The configured level applies to the orchestration crates only; every
//! other target is held at `warn` so runtime internals stay quiet even at
//! `trace`. `RUST_LOG` replaces the whole filter when set.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ORCHESTRATION_TARGETS: [&str; 3] = ["region_core", "region_service", "lib_region_server"];

/// Builds the filter directives for `level`.
fn filter_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in ORCHESTRATION_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initializes the logging system.
///
/// `json_format` forces JSON output regardless of the configuration.
pub fn setup_logging(config: &LoggingSettings, json_format: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(log_level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_target(true).with_thread_names(true))
            .try_init()?;
    }

    info!("🔧 Logging initialized at {} for {}", log_level, ORCHESTRATION_TARGETS.join(", "));
    Ok(())
}

/// Displays the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║        🌍 REGION ORCHESTRATOR 🌍         ║");
    info!("║                 v{}                   ║", version);
    info!("║                                          ║");
    info!("║  🧭 Player routing                       ║");
    info!("║  ⚖️  Occupancy load balancing             ║");
    info!("║  🔒 Reservation-driven lifetimes         ║");
    info!("╚══════════════════════════════════════════╝");
}
