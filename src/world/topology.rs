use serde::{Deserialize, Serialize};

use crate::world::Coord;

/// Moore neighborhood offsets in fixed clockwise order starting north.
/// The order is part of the deterministic tie-break for movement.
pub const MOORE_OFFSETS: [(i32, i32); 8] = [
    (0, -1),  // North
    (1, -1),  // Northeast
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
];

/// Dimensions of a bounded (non-wrapping) square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Flat row-major index. Callers must pass an in-bounds coordinate.
    pub fn index(&self, coord: Coord) -> usize {
        coord.y as usize * self.width as usize + coord.x as usize
    }

    pub fn coord_of(&self, index: usize) -> Coord {
        let width = self.width.max(1) as usize;
        Coord::new((index % width) as u32, (index / width) as u32)
    }

    /// Apply a signed offset, returning `None` when the result leaves the grid.
    pub fn offset(&self, coord: Coord, dx: i32, dy: i32) -> Option<Coord> {
        let x = i64::from(coord.x) + i64::from(dx);
        let y = i64::from(coord.y) + i64::from(dy);
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(Coord::new(x as u32, y as u32))
    }

    /// In-bounds Moore neighbors in [`MOORE_OFFSETS`] order. Borders clip, nothing wraps.
    pub fn moore_neighbors(&self, coord: Coord) -> impl Iterator<Item = Coord> + '_ {
        MOORE_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| self.offset(coord, dx, dy))
    }

    /// All in-bounds cells in the square of `radius` around `center`, excluding `center`.
    /// Row-major order.
    pub fn square_around(&self, center: Coord, radius: u32) -> impl Iterator<Item = Coord> + '_ {
        let x0 = center.x.saturating_sub(radius);
        let y0 = center.y.saturating_sub(radius);
        let x1 = center.x.saturating_add(radius).min(self.width.saturating_sub(1));
        let y1 = center.y.saturating_add(radius).min(self.height.saturating_sub(1));
        (y0..=y1)
            .flat_map(move |y| (x0..=x1).map(move |x| Coord::new(x, y)))
            .filter(move |&c| c != center)
    }

    /// Every cell, row-major.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coord::new(x, y)))
    }
}
