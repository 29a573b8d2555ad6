pub mod field;
pub mod topology;

use serde::{Deserialize, Serialize};

pub use field::{Cell, Field, generate_field};
pub use topology::GridDims;

/// Integer cell address. `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// The three discrete zone types. Each is home to exactly one race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    Badlands,
    Mire,
    Highland,
}

impl Biome {
    pub const ALL: [Biome; 3] = [Biome::Badlands, Biome::Mire, Biome::Highland];

    pub fn index(self) -> usize {
        match self {
            Biome::Badlands => 0,
            Biome::Mire => 1,
            Biome::Highland => 2,
        }
    }
}
