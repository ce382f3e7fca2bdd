//! Region creation parameters.
//!
//! These values travel with every creation request and are compared field by
//! field to decide whether an existing instance can serve a new request. Their
//! gameplay meaning is owned by the mission and region-selection systems.

use crate::types::{PrototypeRef, RegionInstanceId};
use serde::{Deserialize, Serialize};

/// Location of the in-world object that spawned a private region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionLocation {
    /// Region instance the portal entity lives in
    pub region_id: RegionInstanceId,
    /// Position of the portal entity inside that region
    #[serde(default)]
    pub position: [f32; 3],
}

/// Binding between a region instance and the interactive object that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPortal {
    /// Persistent identity of the portal entity
    pub entity_db_id: u64,
    /// Whether the portal is owned exclusively by the instance it spawned
    pub bound_to_owner: bool,
    /// Where the portal entity is
    pub location: RegionLocation,
}

/// Parameters a region instance is created with.
///
/// `endless_level == 0` means "not an endless instance" and `seed == 0` means
/// "no explicit seed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRegionParams {
    pub difficulty_tier: PrototypeRef,
    #[serde(default)]
    pub endless_level: u32,
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub access_portal: Option<AccessPortal>,
}

impl CreateRegionParams {
    /// Creates parameters for a plain instance of the given difficulty tier.
    pub fn with_difficulty(difficulty_tier: PrototypeRef) -> Self {
        Self {
            difficulty_tier,
            ..Self::default()
        }
    }
}
