//! # Region Orchestration Server - Main Entry Point
//!
//! Hosts the region orchestration service as a standalone process. This entry
//! point handles CLI parsing, configuration loading, logging and the
//! application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! region_server
//!
//! # Specify custom configuration
//! region_server --config production.toml
//!
//! # Verbose JSON logs and a fleet report every 10 seconds
//! region_server --log-level debug --json-logs --report-interval 10
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Transport
//!
//! Inbound messages are read from stdin, one JSON object per line, for
//! example `{"type":"player_logged_in","player":"<uuid>"}`. Outbound service
//! messages and player session events are written to the log as JSON.
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM start a graceful shutdown. A second signal exits
//! immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

pub use config::{AppConfig, ConfigError, LoggingSettings, ServerSettings};

/// Runs the server until a shutdown signal arrives.
///
/// Called from the async `main`, so it must not start its own runtime.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration from {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}
