use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::world::{Biome, Coord};

/// Stable identity. Ids are handed out in increasing order and never reused,
/// so ascending id order is also birth order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrcId(pub u64);

/// Race, fixed at birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// C0: strongest, at home in the badlands.
    Brute,
    /// C1: most agile, at home in the mire.
    Stalker,
    /// C2: most resilient, at home in the highlands.
    Warden,
}

/// How a biome treats a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Home,
    Neutral,
    Enemy,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Brute, Kind::Stalker, Kind::Warden];

    pub fn index(self) -> usize {
        match self {
            Kind::Brute => 0,
            Kind::Stalker => 1,
            Kind::Warden => 2,
        }
    }

    /// Race multipliers before individual variation.
    pub fn base_traits(self) -> Traits {
        match self {
            Kind::Brute => Traits::new(1.1, 0.95, 1.0),
            Kind::Stalker => Traits::new(0.9, 1.1, 0.95),
            Kind::Warden => Traits::new(1.0, 1.0, 1.1),
        }
    }

    pub fn home_biome(self) -> Biome {
        match self {
            Kind::Brute => Biome::Badlands,
            Kind::Stalker => Biome::Mire,
            Kind::Warden => Biome::Highland,
        }
    }

    /// Each biome penalizes the race "after" its own in the cycle:
    /// badlands penalize stalkers, the mire penalizes wardens, highlands penalize brutes.
    pub fn enemy_biome(self) -> Biome {
        match self {
            Kind::Brute => Biome::Highland,
            Kind::Stalker => Biome::Badlands,
            Kind::Warden => Biome::Mire,
        }
    }

    pub fn affinity(self, biome: Biome) -> Affinity {
        if biome == self.home_biome() {
            Affinity::Home
        } else if biome == self.enemy_biome() {
            Affinity::Enemy
        } else {
            Affinity::Neutral
        }
    }

    /// The race whose home is `biome`; used when seeding the initial population.
    pub fn native_to(biome: Biome) -> Kind {
        match biome {
            Biome::Badlands => Kind::Brute,
            Biome::Mire => Kind::Stalker,
            Biome::Highland => Kind::Warden,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    pub strength: f32,
    pub agility: f32,
    pub resilience: f32,
}

/// Traits never drift below this.
pub const MIN_TRAIT: f32 = 0.1;

impl Traits {
    pub const fn new(strength: f32, agility: f32, resilience: f32) -> Self {
        Self {
            strength,
            agility,
            resilience,
        }
    }

    /// Scale each trait independently by a factor drawn from `[1 - spread, 1 + spread]`.
    pub fn perturbed(self, rng: &mut impl Rng, spread: f32) -> Traits {
        let spread = spread.abs();
        let mut factor = || rng.gen_range(1.0 - spread..=1.0 + spread);
        Traits {
            strength: (self.strength * factor()).max(MIN_TRAIT),
            agility: (self.agility * factor()).max(MIN_TRAIT),
            resilience: (self.resilience * factor()).max(MIN_TRAIT),
        }
    }
}

/// One agent. The registry owns `position`; move agents through the registry only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orc {
    pub id: OrcId,
    pub position: Coord,
    pub kind: Kind,
    pub traits: Traits,
    pub energy: f32,
    pub age: u32,
    /// Remaining infected ticks; 0 means healthy.
    pub infection_ticks: u32,
    pub born_tick: u64,
}

impl Orc {
    /// A fresh agent with the race's base traits and the configured base energy.
    pub fn spawn(id: OrcId, position: Coord, kind: Kind, settings: &Settings) -> Orc {
        Orc {
            id,
            position,
            kind,
            traits: kind.base_traits(),
            energy: settings.base_energy,
            age: 0,
            infection_ticks: 0,
            born_tick: 0,
        }
    }

    /// A same-kind child at `child_position`.
    ///
    /// With probability `mutation_rate` every trait is independently scaled by
    /// a factor within `mutation_magnitude` of 1; otherwise traits are copied
    /// exactly. The child carries [`Orc::offspring_energy`]; the caller charges
    /// that amount to the parent and inserts the child into the registry.
    pub fn reproduce(
        &self,
        child_id: OrcId,
        child_position: Coord,
        born_tick: u64,
        settings: &Settings,
        rng: &mut impl Rng,
    ) -> Orc {
        let traits = if rng.r#gen::<f32>() < settings.mutation_rate {
            self.traits.perturbed(rng, settings.mutation_magnitude)
        } else {
            self.traits
        };
        Orc {
            id: child_id,
            position: child_position,
            kind: self.kind,
            traits,
            energy: self.offspring_energy(settings),
            age: 0,
            infection_ticks: 0,
            born_tick,
        }
    }

    /// Energy handed to a child: a share of the parent's, at least 2 and at most base energy.
    pub fn offspring_energy(&self, settings: &Settings) -> f32 {
        let upper = settings.base_energy.max(2.0);
        (self.energy * settings.reproduction_energy_share).clamp(2.0, upper)
    }

    pub fn is_infected(&self) -> bool {
        self.infection_ticks > 0
    }

    pub fn infect(&mut self, duration: u32) {
        self.infection_ticks = duration.max(1);
    }
}
