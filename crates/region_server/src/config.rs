//! Configuration management for the region server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files. A missing file is replaced by a default one
//! written to disk.

use crate::cli::CliArgs;
use region_core::{BlueprintCatalog, DifficultyTier, OrchestrationConfig, PrototypeRef, RegionBehavior, RegionBlueprint};
use region_service::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

fn default_report_interval_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    8
}

fn default_drain_on_shutdown() -> bool {
    true
}

/// Errors raised while loading or checking the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server process settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Orchestration core tunables
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Known region blueprints
    #[serde(default)]
    pub blueprints: Vec<RegionBlueprint>,
    /// Difficulty tier names used in reports
    #[serde(default)]
    pub difficulty_tiers: Vec<DifficultyTier>,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Seconds between two fleet reports
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
    /// Seconds to wait for the service task during shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Handle requests still queued when shutdown starts
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            drain_on_shutdown: default_drain_on_shutdown(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let blueprint = |id, name: &str, behavior, player_limit, is_public| RegionBlueprint {
            id: PrototypeRef(id),
            name: name.to_string(),
            behavior,
            player_limit,
            is_public,
            close_when_reservations_reach_zero: false,
            always_shutdown_when_vacant: false,
            lifetime_secs: 4 * 60 * 60,
        };

        Self {
            server: ServerSettings::default(),
            orchestration: OrchestrationConfig::default(),
            logging: LoggingSettings::default(),
            blueprints: vec![
                blueprint(1, "Avengers Tower", RegionBehavior::Town, 100, true),
                blueprint(2, "Midtown Patrol", RegionBehavior::PublicCombatZone, 50, true),
                blueprint(3, "Hell's Kitchen Rooftops", RegionBehavior::PrivateStory, 10, false),
            ],
            difficulty_tiers: vec![
                DifficultyTier { id: PrototypeRef(100), name: "Green".to_string() },
                DifficultyTier { id: PrototypeRef(101), name: "Red".to_string() },
                DifficultyTier { id: PrototypeRef(102), name: "Cosmic".to_string() },
            ],
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }

        if args.json_logs {
            self.logging.json_format = true;
        }

        if let Some(report_interval) = args.report_interval {
            self.server.report_interval_secs = report_interval;
        }
    }

    /// Builds the service loop configuration.
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig {
            orchestration: self.orchestration.clone(),
            drain_on_shutdown: self.server.drain_on_shutdown,
        }
    }

    /// Builds the blueprint catalog.
    pub fn to_catalog(&self) -> Result<BlueprintCatalog, ConfigError> {
        BlueprintCatalog::from_parts(self.blueprints.iter().cloned(), self.difficulty_tiers.iter().cloned())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            )));
        }

        if self.server.report_interval_secs == 0 {
            return Err(ConfigError::Invalid("server.report_interval_secs must be greater than 0".to_string()));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid("server.shutdown_timeout_secs must be greater than 0".to_string()));
        }

        self.orchestration.validate().map_err(ConfigError::Invalid)?;

        let mut seen = HashSet::new();
        for blueprint in &self.blueprints {
            if !seen.insert(blueprint.id) {
                return Err(ConfigError::Invalid(format!("Duplicate blueprint id {}", blueprint.id)));
            }
            if blueprint.player_limit == 0 {
                return Err(ConfigError::Invalid(format!(
                    "Blueprint '{}' must have a player limit greater than 0",
                    blueprint.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.report_interval_secs, 60);
        assert!(config.server.drain_on_shutdown);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.blueprints.len(), 3);
        assert!(config.validate().is_ok());
        assert_eq!(config.to_catalog().unwrap().blueprint_count(), 3);
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.report_interval_secs, 60);
        assert!(path.exists());

        // The written default must load back.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.blueprints, config.blueprints);
        assert_eq!(reloaded.difficulty_tiers, config.difficulty_tiers);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
report_interval_secs = 5

[orchestration]
creation_timeout_ms = 1500

[logging]
level = "debug"
json_format = true

[[blueprints]]
id = 7
name = "Danger Room"
behavior = "match_play"
player_limit = 4
is_public = true

[[difficulty_tiers]]
id = 100
name = "Green"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.report_interval_secs, 5);
        assert_eq!(config.server.shutdown_timeout_secs, 8);
        assert_eq!(config.orchestration.creation_timeout_ms, 1500);
        assert_eq!(config.orchestration.maintenance_tick_ms, 1000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let blueprint = &config.blueprints[0];
        assert_eq!(blueprint.behavior, RegionBehavior::MatchPlay);
        assert!(!blueprint.close_when_reservations_reach_zero);
        assert_eq!(blueprint.lifetime_secs, 4 * 60 * 60);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[server\nreport_interval_secs = ").unwrap();

        let result = AppConfig::load_from_file(file.path()).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_zero_intervals() {
        let mut config = AppConfig::default();
        config.server.report_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orchestration.maintenance_tick_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_blueprints() {
        let mut config = AppConfig::default();
        let duplicate = config.blueprints[0].clone();
        config.blueprints.push(duplicate);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.blueprints[1].player_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            config_path: "ignored.toml".into(),
            log_level: Some("trace".to_string()),
            json_logs: true,
            report_interval: Some(5),
        };

        config.apply_cli_overrides(&args);
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json_format);
        assert_eq!(config.server.report_interval_secs, 5);

        // An interval of zero is caught by validation, not by the override.
        let args = CliArgs { report_interval: Some(0), ..args };
        config.apply_cli_overrides(&args);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_service_config() {
        let mut config = AppConfig::default();
        config.server.drain_on_shutdown = false;
        config.orchestration.creation_timeout_ms = 250;

        let service = config.to_service_config();
        assert!(!service.drain_on_shutdown);
        assert_eq!(service.orchestration.creation_timeout_ms, 250);
    }
}
