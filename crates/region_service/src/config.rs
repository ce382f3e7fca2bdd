//! Service configuration types and defaults.

use crate::error::ServiceError;
use region_core::OrchestrationConfig;
use serde::{Deserialize, Serialize};

/// Configuration of the orchestration service loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Core orchestration tunables
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Handle requests still queued when shutdown starts
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
}

fn default_drain_on_shutdown() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            orchestration: OrchestrationConfig::default(),
            drain_on_shutdown: default_drain_on_shutdown(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.orchestration.validate().map_err(ServiceError::Config)
    }
}
