//! Tunables of the orchestration core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestration timing and placement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// How long a region may wait for its creation response before it is
    /// treated as failed
    #[serde(default = "default_creation_timeout_ms")]
    pub creation_timeout_ms: u64,

    /// Minimum time between two stale-entry sweeps of a load balancer
    #[serde(default = "default_balancer_maintenance_interval_ms")]
    pub balancer_maintenance_interval_ms: u64,

    /// Period of the service maintenance tick (timeouts, expiration)
    #[serde(default = "default_maintenance_tick_ms")]
    pub maintenance_tick_ms: u64,

    /// How many public regions are packed into one public game
    #[serde(default = "default_max_regions_per_public_game")]
    pub max_regions_per_public_game: usize,
}

fn default_creation_timeout_ms() -> u64 {
    30_000
}

fn default_balancer_maintenance_interval_ms() -> u64 {
    60_000
}

fn default_maintenance_tick_ms() -> u64 {
    1_000
}

fn default_max_regions_per_public_game() -> usize {
    16
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            creation_timeout_ms: default_creation_timeout_ms(),
            balancer_maintenance_interval_ms: default_balancer_maintenance_interval_ms(),
            maintenance_tick_ms: default_maintenance_tick_ms(),
            max_regions_per_public_game: default_max_regions_per_public_game(),
        }
    }
}

impl OrchestrationConfig {
    pub fn creation_timeout(&self) -> Duration {
        Duration::from_millis(self.creation_timeout_ms)
    }

    pub fn balancer_maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.balancer_maintenance_interval_ms)
    }

    pub fn maintenance_tick(&self) -> Duration {
        Duration::from_millis(self.maintenance_tick_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.creation_timeout_ms == 0 {
            return Err("creation_timeout_ms must be greater than 0".to_string());
        }

        if self.balancer_maintenance_interval_ms == 0 {
            return Err("balancer_maintenance_interval_ms must be greater than 0".to_string());
        }

        if self.maintenance_tick_ms == 0 {
            return Err("maintenance_tick_ms must be greater than 0".to_string());
        }

        if self.max_regions_per_public_game == 0 {
            return Err("max_regions_per_public_game must be greater than 0".to_string());
        }

        Ok(())
    }
}
