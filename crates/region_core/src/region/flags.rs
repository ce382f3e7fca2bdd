//! Shutdown-policy flags carried by every region handle.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset of shutdown-policy flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegionFlags(u8);

impl RegionFlags {
    pub const NONE: RegionFlags = RegionFlags(0);
    /// Shut down as soon as no world view reserves the region.
    pub const CLOSE_WHEN_RESERVATIONS_REACH_ZERO: RegionFlags = RegionFlags(1 << 0);
    /// Shut down as soon as nobody is present or transferring in.
    pub const SHUTDOWN_WHEN_VACANT: RegionFlags = RegionFlags(1 << 1);
    /// The region outlived its lifetime and only waits for reservations to drain.
    pub const IS_EXPIRED: RegionFlags = RegionFlags(1 << 2);

    pub fn contains(self, other: RegionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RegionFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for RegionFlags {
    type Output = RegionFlags;

    fn bitor(self, rhs: RegionFlags) -> RegionFlags {
        RegionFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for RegionFlags {
    fn bitor_assign(&mut self, rhs: RegionFlags) {
        self.insert(rhs);
    }
}

impl fmt::Debug for RegionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (RegionFlags::CLOSE_WHEN_RESERVATIONS_REACH_ZERO, "CloseWhenReservationsReachZero"),
            (RegionFlags::SHUTDOWN_WHEN_VACANT, "ShutdownWhenVacant"),
            (RegionFlags::IS_EXPIRED, "IsExpired"),
        ];

        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        if set.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", set.join(" | "))
        }
    }
}
