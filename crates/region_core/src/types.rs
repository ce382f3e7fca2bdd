//! # Core Type Definitions
//!
//! Identifier types shared by every orchestration component. All of them are
//! thin wrappers so that a region id can never be passed where a game id or a
//! prototype reference is expected.
//!
//! ## Key Types
//!
//! - [`RegionInstanceId`] - Cluster-unique id of one running region instance
//! - [`GameId`] - Id of a remote game instance (worker process grouping)
//! - [`PlayerId`] - Unique identifier for a player session
//! - [`PrototypeRef`] - Reference to static game data (blueprints, difficulty tiers)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Cluster-unique identifier of a region instance.
///
/// Ids are handed out by the [`crate::WorldRegistry`] from the region
/// namespace and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionInstanceId(pub u64);

impl fmt::Display for RegionInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Identifier of a game instance hosted by a remote worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Unique identifier for a player session.
///
/// Wraps a UUID the same way the rest of the server stack identifies players.
///
/// # Examples
///
/// ```rust
/// use region_core::PlayerId;
///
/// let player = PlayerId::new();
/// let parsed: PlayerId = player.to_string().parse()?;
/// assert_eq!(player, parsed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a piece of static game data.
///
/// Region blueprints and difficulty tiers are both addressed this way. The
/// value `0` is reserved as "no reference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PrototypeRef(pub u64);

impl PrototypeRef {
    /// The empty reference.
    pub const INVALID: PrototypeRef = PrototypeRef(0);

    /// Returns true unless this is [`PrototypeRef::INVALID`].
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PrototypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
