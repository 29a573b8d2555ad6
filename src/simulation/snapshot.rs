use serde::{Deserialize, Serialize};

use crate::population::{Kind, OrcId};
use crate::world::{Cell, Coord};

/// What a renderer sees of one live agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrcView {
    pub id: OrcId,
    pub position: Coord,
    pub kind: Kind,
    pub energy: f32,
    pub infected: bool,
}

/// Read-only copy of the world taken between ticks.
///
/// Owns its data, so it can be handed to another thread or serialized while
/// the engine moves on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries.
    pub cells: Vec<Cell>,
    /// Live agents in ascending id order.
    pub orcs: Vec<OrcView>,
}

impl Snapshot {
    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        if coord.x >= self.width || coord.y >= self.height {
            return None;
        }
        self.cells.get((coord.y * self.width + coord.x) as usize)
    }

    pub fn orc_at(&self, coord: Coord) -> Option<&OrcView> {
        self.orcs.iter().find(|o| o.position == coord)
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.orcs.iter().filter(|o| o.kind == kind).count()
    }
}
