//! Region blueprints and the catalog that resolves them.
//!
//! A blueprint is the static description of a playable world area. Every
//! region instance is created from exactly one blueprint, and the blueprint
//! decides the player limit, whether instances are public, and the default
//! shutdown policy.

use crate::types::PrototypeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn default_lifetime_secs() -> u64 {
    4 * 60 * 60
}

/// How instances of a blueprint are used by players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionBehavior {
    /// Social hub. Never considered full.
    Town,
    /// Open zone shared by everybody routed into it.
    PublicCombatZone,
    /// Single-use story instance owned by one player or party.
    PrivateStory,
    /// Private instance that is not part of the story.
    PrivateNonStory,
    /// Private raid instance.
    PrivateRaid,
    /// Match-based instance (arenas, danger rooms).
    MatchPlay,
}

/// Static description of a playable world area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBlueprint {
    /// Reference used by requests and messages
    pub id: PrototypeRef,
    /// Human-readable name used in logs and reports
    pub name: String,
    /// Usage pattern of instances
    pub behavior: RegionBehavior,
    /// Maximum number of present players before an instance counts as full
    pub player_limit: usize,
    /// Whether instances are shared through the load balancer
    pub is_public: bool,
    /// Shut instances down as soon as no world view reserves them
    #[serde(default)]
    pub close_when_reservations_reach_zero: bool,
    /// Shut instances down as soon as nobody is present or transferring in
    #[serde(default)]
    pub always_shutdown_when_vacant: bool,
    /// Lifetime of expiring instances, in seconds
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,
}

impl RegionBlueprint {
    /// Returns true for single-use story instances.
    pub fn is_private_story(&self) -> bool {
        self.behavior == RegionBehavior::PrivateStory
    }

    /// Returns true if instances of this blueprint expire after [`Self::lifetime`].
    pub fn can_expire(&self) -> bool {
        matches!(
            self.behavior,
            RegionBehavior::PublicCombatZone | RegionBehavior::MatchPlay
        )
    }

    /// Returns true if instances are routed through the load balancer.
    ///
    /// Match regions are kept private since there is no matchmaking here.
    pub fn uses_load_balancer(&self) -> bool {
        self.is_public && self.behavior != RegionBehavior::MatchPlay
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

/// A named difficulty tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTier {
    pub id: PrototypeRef,
    pub name: String,
}

/// Errors raised while building a [`BlueprintCatalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The reserved empty reference was used as an id
    #[error("Invalid prototype reference for '{0}'")]
    InvalidRef(String),

    /// Two entries share the same id
    #[error("Duplicate prototype reference {0}")]
    Duplicate(PrototypeRef),

    /// A blueprint can never admit a player
    #[error("Blueprint '{0}' has a player limit of zero")]
    ZeroPlayerLimit(String),
}

/// Lookup table for blueprints and difficulty tiers.
///
/// Blueprints are stored behind `Arc` so that every handle created from a
/// blueprint shares the same immutable description.
#[derive(Debug, Clone, Default)]
pub struct BlueprintCatalog {
    blueprints: HashMap<PrototypeRef, Arc<RegionBlueprint>>,
    difficulty_tiers: HashMap<PrototypeRef, String>,
}

impl BlueprintCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from configuration lists, rejecting duplicates.
    pub fn from_parts(
        blueprints: impl IntoIterator<Item = RegionBlueprint>,
        difficulty_tiers: impl IntoIterator<Item = DifficultyTier>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for blueprint in blueprints {
            catalog.add_blueprint(blueprint)?;
        }
        for tier in difficulty_tiers {
            catalog.add_difficulty_tier(tier)?;
        }
        Ok(catalog)
    }

    /// Registers a blueprint.
    pub fn add_blueprint(&mut self, blueprint: RegionBlueprint) -> Result<(), CatalogError> {
        if !blueprint.id.is_valid() {
            return Err(CatalogError::InvalidRef(blueprint.name));
        }
        if blueprint.player_limit == 0 {
            return Err(CatalogError::ZeroPlayerLimit(blueprint.name));
        }
        if self.blueprints.contains_key(&blueprint.id) {
            return Err(CatalogError::Duplicate(blueprint.id));
        }

        self.blueprints.insert(blueprint.id, Arc::new(blueprint));
        Ok(())
    }

    /// Registers a difficulty tier name.
    pub fn add_difficulty_tier(&mut self, tier: DifficultyTier) -> Result<(), CatalogError> {
        if !tier.id.is_valid() {
            return Err(CatalogError::InvalidRef(tier.name));
        }
        if self.difficulty_tiers.contains_key(&tier.id) {
            return Err(CatalogError::Duplicate(tier.id));
        }

        self.difficulty_tiers.insert(tier.id, tier.name);
        Ok(())
    }

    pub fn blueprint(&self, id: PrototypeRef) -> Option<&Arc<RegionBlueprint>> {
        self.blueprints.get(&id)
    }

    /// Returns the display name of a difficulty tier, falling back to the raw reference.
    pub fn difficulty_name(&self, id: PrototypeRef) -> String {
        match self.difficulty_tiers.get(&id) {
            Some(name) => name.clone(),
            None => format!("difficulty {id}"),
        }
    }

    pub fn blueprint_count(&self) -> usize {
        self.blueprints.len()
    }
}
