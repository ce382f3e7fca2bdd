//! Status snapshots of the region fleet.

use crate::region::{RegionHandle, RegionHandleState};
use crate::types::{GameId, RegionInstanceId};
use serde::Serialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// One line of the fleet report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub region_id: RegionInstanceId,
    pub game_id: GameId,
    pub blueprint: String,
    pub difficulty: String,
    pub state: RegionHandleState,
    pub flags: String,
    pub uptime_secs: u64,
    pub players: usize,
    pub transferring: usize,
    pub reservations: usize,
}

impl RegionReport {
    pub fn new(region: &RegionHandle, difficulty: String, now: Instant) -> Self {
        Self {
            region_id: region.id(),
            game_id: region.game_id(),
            blueprint: region.blueprint().name.clone(),
            difficulty,
            state: region.state(),
            flags: format!("{:?}", region.flags()),
            uptime_secs: region.uptime(now).as_secs(),
            players: region.player_count(),
            transferring: region.transferring_count(),
            reservations: region.reservation_count(),
        }
    }
}

/// Snapshot of every registered region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReport {
    /// Unix timestamp in seconds
    pub timestamp: u64,
    pub games: usize,
    pub total_players: usize,
    pub total_transferring: usize,
    /// Sorted by region id
    pub regions: Vec<RegionReport>,
}

impl FleetReport {
    pub fn new(games: usize, mut regions: Vec<RegionReport>) -> Self {
        regions.sort_by_key(|region| region.region_id);

        Self {
            timestamp: current_timestamp(),
            games,
            total_players: regions.iter().map(|region| region.players).sum(),
            total_transferring: regions.iter().map(|region| region.transferring).sum(),
            regions,
        }
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

/// Returns the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
