//! Geographic primitives shared by the houtu tile pipeline: extents, positions,
//! tiling schemes and the camera view state tiles are ranked against.
mod cartographic;
mod epsilon;
mod geographic_tiling_scheme;
mod rectangle;
mod tiling_scheme;
mod view_state;

pub use cartographic::*;
pub use epsilon::*;
pub use geographic_tiling_scheme::*;
pub use rectangle::*;
pub use tiling_scheme::*;
pub use view_state::*;
