pub mod orc;
pub mod registry;

pub use orc::{Affinity, Kind, Orc, OrcId, Traits};
pub use registry::{PlacementError, Registry};
