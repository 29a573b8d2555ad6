use noise::{NoiseFn, Perlin};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::world::topology::GridDims;
use crate::world::{Biome, Coord};

/// Immutable per-run attributes of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub humidity: f32,
    pub fertility: f32,
    pub biome: Biome,
}

/// The static environment: a flat row-major array of cells.
///
/// Never mutated after generation, so it can be shared freely between the
/// engine and any reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    dims: GridDims,
    cells: Vec<Cell>,
}

impl Field {
    /// A field where every cell is identical.
    pub fn uniform(dims: GridDims, cell: Cell) -> Self {
        Self {
            dims,
            cells: vec![cell; dims.cell_count()],
        }
    }

    /// Build a field by evaluating `f` for every coordinate.
    pub fn from_fn(dims: GridDims, f: impl Fn(Coord) -> Cell) -> Self {
        Self {
            dims,
            cells: dims.coords().map(f).collect(),
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell at `coord`. Coordinates must be in bounds.
    pub fn cell(&self, coord: Coord) -> &Cell {
        &self.cells[self.dims.index(coord)]
    }

    pub fn humidity_at(&self, coord: Coord) -> f32 {
        self.cell(coord).humidity
    }

    pub fn fertility_at(&self, coord: Coord) -> f32 {
        self.cell(coord).fertility
    }

    pub fn biome_at(&self, coord: Coord) -> Biome {
        self.cell(coord).biome
    }

    pub fn biome_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for cell in &self.cells {
            counts[cell.biome.index()] += 1;
        }
        counts
    }
}

/// Shape of one scalar layer before smoothing.
struct LayerShape {
    bias: f32,
    variation: f32,
    vertical_pull: f32,
}

/// Generate the environment for `seed`.
///
/// Humidity and fertility are low-frequency Perlin noise plus a vertical
/// gradient and a little per-cell jitter, smoothed so regions form large
/// coherent patches. Biomes come from a third, independent noise layer split
/// at its terciles, so each biome covers roughly a third of the map.
pub fn generate_field(settings: &Settings, seed: u64) -> Field {
    let dims = GridDims::new(settings.grid_width, settings.grid_height);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let scale = settings.noise_scale;
    let passes = settings.smoothing_passes;

    let humidity = generate_layer(
        dims,
        &LayerShape {
            bias: settings.humidity_bias,
            variation: settings.humidity_variation,
            vertical_pull: settings.humidity_vertical_pull,
        },
        fold_seed(seed),
        scale,
        passes,
        &mut rng,
    );
    let fertility = generate_layer(
        dims,
        &LayerShape {
            bias: settings.fertility_bias,
            variation: settings.fertility_variation,
            vertical_pull: settings.fertility_vertical_pull,
        },
        fold_seed(seed).wrapping_add(1),
        scale,
        passes,
        &mut rng,
    );
    let zoning = generate_layer(
        dims,
        &LayerShape {
            bias: 0.5,
            variation: 0.35,
            vertical_pull: 0.0,
        },
        fold_seed(seed).wrapping_add(2),
        scale * 0.75,
        passes.saturating_sub(1),
        &mut rng,
    );
    let biomes = assign_biomes(&zoning);

    Field::from_fn(dims, |coord| {
        let i = dims.index(coord);
        Cell {
            humidity: humidity[i],
            fertility: fertility[i],
            biome: biomes[i],
        }
    })
}

/// Perlin takes a 32-bit seed; fold the high half in so it still matters.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// Print a summary of the generated field.
pub fn print_field_summary(field: &Field) {
    println!("=== Field Summary ===");
    println!("Size: {}x{}", field.width(), field.height());

    let total = field.cells().len().max(1) as f32;
    let counts = field.biome_counts();
    println!("\nBiomes:");
    for biome in Biome::ALL {
        let count = counts[biome.index()];
        let pct = count as f32 / total * 100.0;
        println!("  {:<10} {:>5} ({:.1}%)", format!("{:?}", biome), count, pct);
    }

    let mean_humidity = field.cells().iter().map(|c| c.humidity).sum::<f32>() / total;
    let mean_fertility = field.cells().iter().map(|c| c.fertility).sum::<f32>() / total;
    println!("\nMean humidity:  {:.3}", mean_humidity);
    println!("Mean fertility: {:.3}", mean_fertility);
}

// --- Internal generation functions ---

fn generate_layer(
    dims: GridDims,
    shape: &LayerShape,
    noise_seed: u32,
    scale: f64,
    smooth_passes: u32,
    rng: &mut impl Rng,
) -> Vec<f32> {
    let perlin = Perlin::new(noise_seed);
    let denom = dims.height.saturating_sub(1).max(1) as f32;
    let variation = shape.variation.abs();

    let mut layer: Vec<f32> = dims
        .coords()
        .map(|c| {
            let gradient = c.y as f32 / denom;
            let base = shape.bias + shape.vertical_pull * (gradient - 0.5);
            let n = perlin.get([c.x as f64 * scale, c.y as f64 * scale]) as f32;
            let jitter = rng.gen_range(-variation..=variation) * 0.25;
            base + variation * 1.5 * n + jitter
        })
        .collect();

    for _ in 0..smooth_passes {
        layer = smooth(&layer, dims);
    }

    layer.into_iter().map(|v| v.clamp(0.0, 1.0)).collect()
}

/// One smoothing pass: each cell keeps half its value and takes the other
/// half from the mean of its in-bounds Moore neighbors. Cells are independent,
/// so the pass runs in parallel; output order is preserved.
fn smooth(layer: &[f32], dims: GridDims) -> Vec<f32> {
    (0..layer.len())
        .into_par_iter()
        .map(|i| {
            let coord = dims.coord_of(i);
            let (sum, count) = dims
                .moore_neighbors(coord)
                .fold((0.0_f32, 0_u32), |(sum, count), n| {
                    (sum + layer[dims.index(n)], count + 1)
                });
            if count == 0 {
                layer[i]
            } else {
                layer[i] * 0.5 + sum / count as f32 * 0.5
            }
        })
        .collect()
}

fn assign_biomes(zoning: &[f32]) -> Vec<Biome> {
    if zoning.is_empty() {
        return Vec::new();
    }
    let mut sorted = zoning.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let third = sorted.len() / 3;
    let t1 = sorted[third];
    let t2 = sorted[(2 * third).min(sorted.len() - 1)];

    zoning
        .iter()
        .map(|&v| {
            if v < t1 {
                Biome::Badlands
            } else if v < t2 {
                Biome::Mire
            } else {
                Biome::Highland
            }
        })
        .collect()
}
