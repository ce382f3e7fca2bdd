//! Region instance handles and the context their operations run in.

mod context;
mod flags;
mod handle;

pub use context::{PlayerLocation, PlayerLocations, RegionContext, RetiredRegion};
pub use flags::RegionFlags;
pub use handle::{RegionHandle, RegionHandleState, RegionPlayerAccess};
