use std::collections::BTreeMap;
use std::fmt;

use crate::population::orc::{Kind, Orc, OrcId};
use crate::world::topology::GridDims;
use crate::world::Coord;

/// Why an agent could not be placed on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    OutOfBounds(Coord),
    Occupied(Coord),
    UnknownOrc(OrcId),
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::OutOfBounds(c) => write!(f, "cell ({}, {}) is out of bounds", c.x, c.y),
            PlacementError::Occupied(c) => write!(f, "cell ({}, {}) is already occupied", c.x, c.y),
            PlacementError::UnknownOrc(id) => write!(f, "no live orc with id {}", id.0),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Authoritative set of live agents.
///
/// Agents live in an id-ordered arena; a flat occupancy index maps every cell
/// to at most one agent and per-race counts are kept alongside. Every
/// insertion, move and removal updates all three together.
#[derive(Debug, Clone)]
pub struct Registry {
    dims: GridDims,
    orcs: BTreeMap<OrcId, Orc>,
    occupancy: Vec<Option<OrcId>>,
    kind_counts: [usize; 3],
    next_id: u64,
}

impl Registry {
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            orcs: BTreeMap::new(),
            occupancy: vec![None; dims.cell_count()],
            kind_counts: [0; 3],
            next_id: 0,
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Reserve the next unused id.
    pub fn allocate_id(&mut self) -> OrcId {
        let id = OrcId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert an agent at its own `position`.
    pub fn insert(&mut self, orc: Orc) -> Result<OrcId, PlacementError> {
        let coord = orc.position;
        if !self.dims.contains(coord) {
            return Err(PlacementError::OutOfBounds(coord));
        }
        let idx = self.dims.index(coord);
        if self.occupancy[idx].is_some() {
            return Err(PlacementError::Occupied(coord));
        }
        debug_assert!(!self.orcs.contains_key(&orc.id), "duplicate orc id {:?}", orc.id);

        let id = orc.id;
        self.next_id = self.next_id.max(id.0 + 1);
        self.occupancy[idx] = Some(id);
        self.kind_counts[orc.kind.index()] += 1;
        self.orcs.insert(id, orc);
        Ok(id)
    }

    pub fn remove(&mut self, id: OrcId) -> Option<Orc> {
        let orc = self.orcs.remove(&id)?;
        let idx = self.dims.index(orc.position);
        if self.occupancy[idx] == Some(id) {
            self.occupancy[idx] = None;
        }
        self.kind_counts[orc.kind.index()] -= 1;
        Some(orc)
    }

    /// Move an agent to an empty in-bounds cell.
    pub fn move_to(&mut self, id: OrcId, dest: Coord) -> Result<(), PlacementError> {
        if !self.dims.contains(dest) {
            return Err(PlacementError::OutOfBounds(dest));
        }
        let dest_idx = self.dims.index(dest);
        if self.occupancy[dest_idx].is_some() {
            return Err(PlacementError::Occupied(dest));
        }
        let orc = self.orcs.get_mut(&id).ok_or(PlacementError::UnknownOrc(id))?;
        let src_idx = self.dims.index(orc.position);
        self.occupancy[src_idx] = None;
        self.occupancy[dest_idx] = Some(id);
        orc.position = dest;
        Ok(())
    }

    pub fn get(&self, id: OrcId) -> Option<&Orc> {
        self.orcs.get(&id)
    }

    /// Mutable access for energy, traits and infection. Do not change
    /// `position` or `kind` through this; use [`Registry::move_to`].
    pub fn get_mut(&mut self, id: OrcId) -> Option<&mut Orc> {
        self.orcs.get_mut(&id)
    }

    pub fn contains(&self, id: OrcId) -> bool {
        self.orcs.contains_key(&id)
    }

    pub fn occupant(&self, coord: Coord) -> Option<OrcId> {
        if !self.dims.contains(coord) {
            return None;
        }
        self.occupancy[self.dims.index(coord)]
    }

    pub fn orc_at(&self, coord: Coord) -> Option<&Orc> {
        self.occupant(coord).and_then(|id| self.orcs.get(&id))
    }

    pub fn is_free(&self, coord: Coord) -> bool {
        self.dims.contains(coord) && self.occupancy[self.dims.index(coord)].is_none()
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<OrcId> {
        self.orcs.keys().copied().collect()
    }

    /// Live agents in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Orc> {
        self.orcs.values()
    }

    pub fn len(&self) -> usize {
        self.orcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orcs.is_empty()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.kind_counts[kind.index()]
    }

    pub fn counts(&self) -> [usize; 3] {
        self.kind_counts
    }

    /// Agents on the in-bounds Moore neighbors of `center`.
    pub fn neighbors(&self, center: Coord) -> impl Iterator<Item = &Orc> + '_ {
        self.dims
            .moore_neighbors(center)
            .filter_map(move |c| self.orc_at(c))
    }

    /// Agents within the square of `radius` around `center`, excluding `center` itself.
    pub fn around(&self, center: Coord, radius: u32) -> impl Iterator<Item = &Orc> + '_ {
        self.dims
            .square_around(center, radius)
            .filter_map(move |c| self.orc_at(c))
    }

    /// Empty Moore neighbors of `center`, in neighbor order.
    pub fn free_neighbors(&self, center: Coord) -> Vec<Coord> {
        self.dims
            .moore_neighbors(center)
            .filter(|&c| self.is_free(c))
            .collect()
    }

    /// Verify occupancy, counts and the energy floor.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut counts = [0usize; 3];
        let mut indexed = 0usize;

        for (id, orc) in &self.orcs {
            if *id != orc.id {
                return Err(format!("orc {:?} stored under key {:?}", orc.id, id));
            }
            if !self.dims.contains(orc.position) {
                return Err(format!("orc {:?} is out of bounds at {:?}", id, orc.position));
            }
            if self.occupancy[self.dims.index(orc.position)] != Some(*id) {
                return Err(format!(
                    "orc {:?} at {:?} is missing from the occupancy index",
                    id, orc.position
                ));
            }
            if orc.energy <= 0.0 {
                return Err(format!("orc {:?} is alive with energy {}", id, orc.energy));
            }
            counts[orc.kind.index()] += 1;
        }

        for slot in self.occupancy.iter().flatten() {
            if !self.orcs.contains_key(slot) {
                return Err(format!("occupancy index holds stale orc {:?}", slot));
            }
            indexed += 1;
        }

        if indexed != self.orcs.len() {
            return Err(format!(
                "{} occupied cells for {} live orcs",
                indexed,
                self.orcs.len()
            ));
        }
        if counts != self.kind_counts {
            return Err(format!(
                "race counts {:?} disagree with recount {:?}",
                self.kind_counts, counts
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn registry() -> Registry {
        Registry::new(GridDims::new(6, 4))
    }

    fn orc(reg: &mut Registry, kind: Kind, x: u32, y: u32) -> Orc {
        let id = reg.allocate_id();
        Orc::spawn(id, Coord::new(x, y), kind, &Settings::default())
    }

    #[test]
    fn insert_updates_index_and_counts() {
        let mut reg = registry();
        let a = orc(&mut reg, Kind::Brute, 1, 1);
        let b = orc(&mut reg, Kind::Warden, 2, 1);
        let a_id = reg.insert(a).unwrap();
        let b_id = reg.insert(b).unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.counts(), [1, 0, 1]);
        assert_eq!(reg.occupant(Coord::new(1, 1)), Some(a_id));
        assert_eq!(reg.orc_at(Coord::new(2, 1)).map(|o| o.id), Some(b_id));
        assert!(reg.check_invariants().is_ok());
    }

    #[test]
    fn occupied_and_out_of_bounds_inserts_are_rejected() {
        let mut reg = registry();
        let a = orc(&mut reg, Kind::Brute, 1, 1);
        reg.insert(a).unwrap();

        let b = orc(&mut reg, Kind::Stalker, 1, 1);
        assert_eq!(reg.insert(b), Err(PlacementError::Occupied(Coord::new(1, 1))));

        let c = orc(&mut reg, Kind::Stalker, 6, 0);
        assert_eq!(reg.insert(c), Err(PlacementError::OutOfBounds(Coord::new(6, 0))));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.counts(), [1, 0, 0]);
    }

    #[test]
    fn move_keeps_single_occupancy() {
        let mut reg = registry();
        let a = orc(&mut reg, Kind::Brute, 0, 0);
        let b = orc(&mut reg, Kind::Brute, 1, 0);
        let a_id = reg.insert(a).unwrap();
        reg.insert(b).unwrap();

        assert_eq!(
            reg.move_to(a_id, Coord::new(1, 0)),
            Err(PlacementError::Occupied(Coord::new(1, 0)))
        );
        reg.move_to(a_id, Coord::new(0, 1)).unwrap();
        assert!(reg.is_free(Coord::new(0, 0)));
        assert_eq!(reg.occupant(Coord::new(0, 1)), Some(a_id));
        assert_eq!(reg.get(a_id).unwrap().position, Coord::new(0, 1));
        assert!(reg.check_invariants().is_ok());
    }

    #[test]
    fn remove_frees_cell_and_count() {
        let mut reg = registry();
        let a = orc(&mut reg, Kind::Stalker, 3, 2);
        let id = reg.insert(a).unwrap();
        let removed = reg.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(reg.is_free(Coord::new(3, 2)));
        assert_eq!(reg.count(Kind::Stalker), 0);
        assert!(reg.remove(id).is_none());
        assert!(reg.check_invariants().is_ok());
    }

    #[test]
    fn ids_are_monotonic_and_iterated_in_order() {
        let mut reg = registry();
        let first = orc(&mut reg, Kind::Brute, 5, 3);
        let second = orc(&mut reg, Kind::Brute, 0, 0);
        reg.insert(second).unwrap();
        reg.insert(first).unwrap();
        let ids = reg.ids();
        assert_eq!(ids, vec![OrcId(0), OrcId(1)]);
        assert_eq!(reg.allocate_id(), OrcId(2));
    }

    #[test]
    fn neighbor_queries_clip_to_grid() {
        let mut reg = registry();
        for (x, y) in [(0, 0), (1, 0), (0, 1), (3, 3)] {
            let o = orc(&mut reg, Kind::Warden, x, y);
            reg.insert(o).unwrap();
        }
        assert_eq!(reg.neighbors(Coord::new(0, 0)).count(), 2);
        assert_eq!(reg.free_neighbors(Coord::new(0, 0)), vec![Coord::new(1, 1)]);
        assert_eq!(reg.around(Coord::new(1, 1), 2).count(), 4);
    }

    #[test]
    fn invariant_check_catches_starved_orc() {
        let mut reg = registry();
        let a = orc(&mut reg, Kind::Brute, 1, 1);
        let id = reg.insert(a).unwrap();
        reg.get_mut(id).unwrap().energy = 0.0;
        let err = reg.check_invariants().unwrap_err();
        assert!(err.contains("energy"));
    }
}
