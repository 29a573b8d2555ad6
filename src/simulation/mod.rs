pub mod combat;
pub mod habitat;
pub mod lifecycle;
pub mod snapshot;
pub mod statistics;

pub use snapshot::{OrcView, Snapshot};
pub use statistics::{TickEvents, TickSummary};

use std::collections::HashSet;
use std::fmt;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::population::orc::MIN_TRAIT;
use crate::population::{Kind, Orc, OrcId, PlacementError, Registry};
use crate::world::topology::MOORE_OFFSETS;
use crate::world::{Coord, Field, GridDims, generate_field};

use combat::{CombatOutcome, Matchup, Side};
use habitat::{Candidate, MoveContext, SocialContext};

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    InvalidSettings(String),
    FieldMismatch { expected: GridDims, actual: GridDims },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidSettings(msg) => write!(f, "invalid settings:\n{}", msg),
            SimulationError::FieldMismatch { expected, actual } => write!(
                f,
                "field is {}x{} but settings ask for {}x{}",
                actual.width, actual.height, expected.width, expected.height
            ),
        }
    }
}

impl std::error::Error for SimulationError {}

#[derive(Debug, Clone, Copy)]
enum DeathCause {
    Starvation,
    Combat,
    Overpopulation,
    OldAge,
}

/// Bookkeeping that only lives for the duration of one `step`.
#[derive(Default)]
struct TickState {
    /// Agents that already had their fight this tick.
    engaged: HashSet<OrcId>,
    /// Agents that already produced (or sired) a child this tick.
    bred: HashSet<OrcId>,
    events: TickEvents,
}

/// Owns all mutable state of one run: the population, the random stream and
/// the tick counter. The field is generated once per seed and only read.
pub struct Simulation {
    settings: Settings,
    seed: u64,
    field: Field,
    registry: Registry,
    rng: ChaCha8Rng,
    tick: u64,
}

impl Simulation {
    /// Validate `settings`, generate the field and seed the population.
    /// A `seed` of 0 in the settings picks a random seed.
    pub fn new(settings: Settings) -> Result<Self, SimulationError> {
        settings.validate().map_err(SimulationError::InvalidSettings)?;
        let seed = resolve_seed(settings.seed);
        let field = generate_field(&settings, seed);
        let mut sim = Self::build(settings, seed, field);
        sim.populate();
        Ok(sim)
    }

    /// A run on a caller-supplied field with an empty population.
    pub fn with_field(settings: Settings, field: Field) -> Result<Self, SimulationError> {
        settings.validate().map_err(SimulationError::InvalidSettings)?;
        let expected = GridDims::new(settings.grid_width, settings.grid_height);
        if field.dims() != expected {
            return Err(SimulationError::FieldMismatch {
                expected,
                actual: field.dims(),
            });
        }
        let seed = resolve_seed(settings.seed);
        Ok(Self::build(settings, seed, field))
    }

    fn build(settings: Settings, seed: u64, field: Field) -> Self {
        Self {
            registry: Registry::new(field.dims()),
            rng: engine_rng(seed),
            settings,
            seed,
            field,
            tick: 0,
        }
    }

    /// Regenerate the field and the initial population from `seed`.
    /// Calling this twice with the same seed yields identical worlds.
    pub fn reset(&mut self, seed: u64) {
        let seed = resolve_seed(seed);
        self.seed = seed;
        self.tick = 0;
        self.field = generate_field(&self.settings, seed);
        self.registry = Registry::new(self.field.dims());
        self.rng = engine_rng(seed);
        self.populate();
    }

    fn populate(&mut self) {
        let dims = self.field.dims();
        let target = (dims.cell_count() as f32 * self.settings.initial_orc_ratio).round() as usize;
        let mut coords: Vec<Coord> = dims.coords().collect();
        coords.shuffle(&mut self.rng);

        for coord in coords.into_iter().take(target) {
            let kind = Kind::native_to(self.field.biome_at(coord));
            let id = self.registry.allocate_id();
            let mut orc = Orc::spawn(id, coord, kind, &self.settings);
            orc.traits = orc
                .traits
                .perturbed(&mut self.rng, self.settings.initial_trait_spread);
            if let Err(err) = self.registry.insert(orc) {
                debug!(%err, "Skipped initial placement");
            }
        }

        let counts = self.registry.counts();
        info!(
            seed = self.seed,
            width = dims.width,
            height = dims.height,
            brutes = counts[Kind::Brute.index()],
            stalkers = counts[Kind::Stalker.index()],
            wardens = counts[Kind::Warden.index()],
            "World reset"
        );
    }

    /// Add a fresh agent of `kind` at `coord`.
    pub fn place_orc(&mut self, kind: Kind, coord: Coord) -> Result<OrcId, PlacementError> {
        if !self.registry.dims().contains(coord) {
            return Err(PlacementError::OutOfBounds(coord));
        }
        if !self.registry.is_free(coord) {
            return Err(PlacementError::Occupied(coord));
        }
        let id = self.registry.allocate_id();
        let mut orc = Orc::spawn(id, coord, kind, &self.settings);
        orc.born_tick = self.tick;
        self.registry.insert(orc)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Summary of the current state with no events attached.
    pub fn summary(&self) -> TickSummary {
        statistics::compute_summary(self.tick, &self.registry, TickEvents::default())
    }

    /// Owned view of the world for renderers. Only meaningful between ticks,
    /// which `&self` guarantees.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            seed: self.seed,
            width: self.field.width(),
            height: self.field.height(),
            cells: self.field.cells().to_vec(),
            orcs: self
                .registry
                .iter()
                .map(|orc| OrcView {
                    id: orc.id,
                    position: orc.position,
                    kind: orc.kind,
                    energy: orc.energy,
                    infected: orc.is_infected(),
                })
                .collect(),
        }
    }

    /// Advance one tick.
    ///
    /// Agents alive at the start of the tick are processed once each in
    /// ascending id order; children born during the tick wait for the next.
    /// Overpopulation culling and cleanup run after every agent has acted.
    pub fn step(&mut self) -> TickSummary {
        self.tick += 1;
        let counts_before = self.registry.counts();
        let mut state = TickState::default();

        for id in self.registry.ids() {
            self.process_orc(id, &mut state);
        }
        self.cull_overpopulation(&mut state);
        self.cleanup(&mut state);

        debug_assert_eq!(self.registry.check_invariants(), Ok(()));

        let summary = statistics::compute_summary(self.tick, &self.registry, state.events);
        debug!(
            tick = summary.tick,
            total = summary.total,
            brutes = summary.count(Kind::Brute),
            stalkers = summary.count(Kind::Stalker),
            wardens = summary.count(Kind::Warden),
            births = summary.events.births,
            deaths = summary.events.deaths(),
            infected = summary.infected,
            "Tick complete"
        );
        for kind in Kind::ALL {
            if counts_before[kind.index()] > 0 && summary.count(kind) == 0 {
                warn!(tick = self.tick, race = ?kind, "Race went extinct");
            }
        }
        if counts_before.iter().sum::<usize>() > 0 && summary.is_extinct() {
            warn!(tick = self.tick, "Population died out");
        }
        summary
    }

    fn process_orc(&mut self, id: OrcId, state: &mut TickState) {
        if !self.registry.contains(id) {
            return;
        }
        let alive = self.apply_upkeep(id, state)
            && self.apply_movement(id, state)
            && self.apply_combat(id, state)
            && self.apply_infection(id, state);
        if !alive {
            return;
        }
        self.apply_reproduction(id, state);
        self.apply_mortality(id, state);
    }

    /// Environment, foraging and social effects. Returns false if the agent starved.
    fn apply_upkeep(&mut self, id: OrcId, state: &mut TickState) -> bool {
        let Some(orc) = self.registry.get(id) else {
            return false;
        };
        let cell = *self.field.cell(orc.position);
        let social = self.social_context(orc.position, orc.kind);
        let delta = habitat::environment_delta(orc.kind, &cell, &self.settings)
            + habitat::forage_gain(cell.fertility, &self.settings)
            + habitat::social_delta(social, orc.traits.resilience, &self.settings);

        let Some(orc) = self.registry.get_mut(id) else {
            return false;
        };
        orc.age = orc.age.saturating_add(1);
        orc.energy += delta;
        if orc.energy <= 0.0 {
            self.kill(id, DeathCause::Starvation, state);
            return false;
        }
        true
    }

    fn social_context(&self, position: Coord, kind: Kind) -> SocialContext {
        let mut ctx = SocialContext::default();
        for other in self.registry.neighbors(position) {
            if other.kind == kind {
                ctx.allies += 1;
            } else {
                ctx.foes += 1;
            }
        }
        ctx
    }

    /// Score staying and every free neighbor, then move to the best one.
    fn apply_movement(&mut self, id: OrcId, state: &mut TickState) -> bool {
        let Some(orc) = self.registry.get(id) else {
            return false;
        };
        let s = &self.settings;
        let (position, kind) = (orc.position, orc.kind);
        let agility = orc.traits.agility.max(MIN_TRAIT);

        let dims = self.field.dims();
        let mut options: Vec<(Coord, (i32, i32))> = vec![(position, (0, 0))];
        for (dx, dy) in MOORE_OFFSETS {
            if let Some(dest) = dims.offset(position, dx, dy) {
                if self.registry.is_free(dest) {
                    options.push((dest, (dx, dy)));
                }
            }
        }
        if options.len() == 1 {
            return true;
        }

        let has_ally = self.registry.neighbors(position).any(|o| o.kind == kind);
        let scarce = combat::is_protected(self.registry.count(kind), s);
        let ctx = MoveContext {
            current_habitat: habitat::habitat_score(kind, self.field.cell(position), s),
            seeking_mate: !has_ally,
            fleeing: scarce
                && (orc.traits.strength < s.escape_strength_threshold
                    || orc.energy < s.escape_energy_threshold),
        };
        let seek = habitat::seek_direction(&self.field, kind, position, s);

        let mut scores: Vec<f32> = options
            .iter()
            .map(|&(dest, step)| {
                let candidate = Candidate {
                    habitat: habitat::habitat_score(kind, self.field.cell(dest), s),
                    herd: self.herd_near(dest, kind, id),
                    adjacent_allies: self.allies_adjacent(dest, kind, id),
                    threats: if ctx.fleeing {
                        self.threats_near(dest, kind)
                    } else {
                        0
                    },
                    alignment: seek.map_or(0.0, |dir| habitat::alignment(step, dir)),
                    is_stay: dest == position,
                };
                habitat::desirability(&candidate, &ctx, s)
            })
            .collect();

        let noise = self.settings.movement_noise;
        if noise > 0.0 {
            for score in &mut scores {
                *score += self.rng.gen_range(-noise..=noise);
            }
        }

        let Some(choice) = habitat::best_index(&scores) else {
            return true;
        };
        if choice == 0 {
            return true;
        }
        let dest = options[choice].0;
        if let Err(err) = self.registry.move_to(id, dest) {
            debug!(orc = id.0, %err, "Move rejected");
            return true;
        }
        state.events.moves += 1;

        let cost = self.settings.move_cost / agility;
        let Some(orc) = self.registry.get_mut(id) else {
            return false;
        };
        orc.energy -= cost;
        if orc.energy <= 0.0 {
            self.kill(id, DeathCause::Starvation, state);
            return false;
        }
        true
    }

    /// Same-kind agents within the herd radius of `center`, not counting `mover`.
    fn herd_near(&self, center: Coord, kind: Kind, mover: OrcId) -> u32 {
        self.registry
            .around(center, self.settings.herd_radius)
            .filter(|o| o.kind == kind && o.id != mover)
            .count() as u32
    }

    fn allies_adjacent(&self, center: Coord, kind: Kind, mover: OrcId) -> u32 {
        self.registry
            .neighbors(center)
            .filter(|o| o.kind == kind && o.id != mover)
            .count() as u32
    }

    fn threats_near(&self, center: Coord, kind: Kind) -> u32 {
        self.registry
            .around(center, self.settings.escape_threat_radius)
            .filter(|o| o.kind != kind)
            .count() as u32
    }

    /// Pick at most one adjacent foe and resolve the fight. Returns false if
    /// the acting agent died.
    fn apply_combat(&mut self, id: OrcId, state: &mut TickState) -> bool {
        if state.engaged.contains(&id) {
            return true;
        }
        let Some(attacker) = self.registry.get(id) else {
            return false;
        };
        let s = &self.settings;
        let attacker_strength = combat::effective_strength(attacker, s);
        let attacker_energy = attacker.energy;
        let attacker_affinity = attacker.kind.affinity(self.field.biome_at(attacker.position));
        let attacker_count = self.registry.count(attacker.kind);

        // (defender, its strength, its energy, attacker advantage)
        let mut target: Option<(OrcId, f32, f32, f32)> = None;
        for defender in self.registry.neighbors(attacker.position) {
            if defender.kind == attacker.kind || state.engaged.contains(&defender.id) {
                continue;
            }
            let matchup = Matchup {
                attacker_race_count: attacker_count,
                defender_race_count: self.registry.count(defender.kind),
                attacker_affinity,
                defender_affinity: defender.kind.affinity(self.field.biome_at(defender.position)),
            };
            if !combat::may_initiate(&matchup, s) {
                continue;
            }
            let defender_strength = combat::effective_strength(defender, s);
            let advantage = attacker_strength - defender_strength;
            let better = match target {
                None => true,
                Some((best_id, _, _, best_advantage)) => {
                    advantage > best_advantage
                        || (advantage == best_advantage && defender.id < best_id)
                }
            };
            if better {
                target = Some((defender.id, defender_strength, defender.energy, advantage));
            }
        }

        let Some((defender_id, defender_strength, defender_energy, _)) = target else {
            return true;
        };
        if self.rng.r#gen::<f32>() >= self.settings.aggression {
            return true;
        }

        state.engaged.insert(id);
        state.engaged.insert(defender_id);

        match combat::resolve(
            attacker_strength,
            defender_strength,
            attacker_energy,
            defender_energy,
            &self.settings,
        ) {
            CombatOutcome::Skirmish {
                attacker_loss,
                defender_loss,
            } => {
                state.events.skirmishes += 1;
                self.drain(id, attacker_loss);
                self.drain(defender_id, defender_loss);
            }
            CombatOutcome::Decisive {
                winner,
                winner_loss,
                loser_loss,
            } => {
                state.events.fights += 1;
                let (winner_id, loser_id) = match winner {
                    Side::Attacker => (id, defender_id),
                    Side::Defender => (defender_id, id),
                };
                let loser_died = self.drain(loser_id, loser_loss) <= 0.0;
                if loser_died {
                    self.kill(loser_id, DeathCause::Combat, state);
                }
                let spoils = if loser_died { self.settings.fight_reward } else { 0.0 };
                if self.drain(winner_id, winner_loss - spoils) <= 0.0 {
                    self.kill(winner_id, DeathCause::Combat, state);
                }
            }
        }
        self.registry.contains(id)
    }

    /// Subtract `amount` from an agent's energy and return what is left.
    fn drain(&mut self, id: OrcId, amount: f32) -> f32 {
        match self.registry.get_mut(id) {
            Some(orc) => {
                orc.energy -= amount;
                orc.energy
            }
            None => 0.0,
        }
    }

    /// Infected agents pay the drain, may pass the illness on and count down
    /// toward recovery. Healthy agents roll for a new infection.
    fn apply_infection(&mut self, id: OrcId, state: &mut TickState) -> bool {
        let Some(orc) = self.registry.get(id) else {
            return false;
        };
        let (position, kind) = (orc.position, orc.kind);

        if orc.is_infected() {
            let drain = self.settings.infection_energy_drain / orc.traits.resilience.max(MIN_TRAIT);
            let exposed: Vec<OrcId> = self
                .registry
                .neighbors(position)
                .filter(|o| !o.is_infected())
                .map(|o| o.id)
                .collect();

            let spread = self.settings.infection_spread_chance;
            let duration = self.settings.infection_duration;
            if spread > 0.0 {
                for neighbor in exposed {
                    if self.rng.r#gen::<f32>() < spread {
                        if let Some(other) = self.registry.get_mut(neighbor) {
                            other.infect(duration);
                            state.events.new_infections += 1;
                        }
                    }
                }
            }

            let Some(orc) = self.registry.get_mut(id) else {
                return false;
            };
            orc.energy -= drain;
            orc.infection_ticks = orc.infection_ticks.saturating_sub(1);
            if orc.energy <= 0.0 {
                self.kill(id, DeathCause::Starvation, state);
                return false;
            }
            return true;
        }

        let affinity = kind.affinity(self.field.biome_at(position));
        let allies = self.social_context(position, kind).allies;
        let chance = lifecycle::infection_chance(affinity, self.registry.len(), allies, &self.settings);
        if chance > 0.0 && self.rng.r#gen::<f32>() < chance {
            if let Some(orc) = self.registry.get_mut(id) {
                orc.infect(self.settings.infection_duration);
                state.events.new_infections += 1;
            }
        }
        true
    }

    /// Pair with one adjacent same-kind mate and place a child on a random
    /// free neighbor. Quietly does nothing when any condition fails.
    fn apply_reproduction(&mut self, id: OrcId, state: &mut TickState) {
        if state.bred.contains(&id) {
            return;
        }
        let Some(parent) = self.registry.get(id).cloned() else {
            return;
        };
        let protected = combat::is_protected(self.registry.count(parent.kind), &self.settings);
        if parent.energy < lifecycle::reproduction_threshold(protected, &self.settings) {
            return;
        }

        let tick = self.tick;
        let mate = self
            .registry
            .neighbors(parent.position)
            .find(|o| o.kind == parent.kind && o.born_tick < tick && !state.bred.contains(&o.id))
            .map(|o| o.id);
        let Some(mate) = mate else {
            return;
        };

        let chance = lifecycle::reproduction_chance(protected, self.registry.len(), &self.settings);
        if self.rng.r#gen::<f32>() >= chance {
            return;
        }
        let free = self.registry.free_neighbors(parent.position);
        let Some(&spot) = free.choose(&mut self.rng) else {
            return;
        };

        let child_id = self.registry.allocate_id();
        let child = parent.reproduce(child_id, spot, tick, &self.settings, &mut self.rng);
        let cost = child.energy;
        match self.registry.insert(child) {
            Ok(_) => {
                self.drain(id, cost);
                state.bred.insert(id);
                state.bred.insert(mate);
                state.events.births += 1;
            }
            Err(err) => debug!(orc = id.0, %err, "Birth rejected"),
        }
    }

    fn apply_mortality(&mut self, id: OrcId, state: &mut TickState) {
        let Some(orc) = self.registry.get(id) else {
            return;
        };
        if orc.energy <= 0.0 {
            self.kill(id, DeathCause::Starvation, state);
        } else if self.settings.max_age > 0 && orc.age > self.settings.max_age {
            self.kill(id, DeathCause::OldAge, state);
        }
    }

    /// Every agent rolls against the same culling chance, computed once from
    /// the population at the start of this phase.
    fn cull_overpopulation(&mut self, state: &mut TickState) {
        let chance = lifecycle::overpopulation_death_chance(self.registry.len(), &self.settings);
        if chance <= 0.0 {
            return;
        }
        let victims: Vec<OrcId> = self
            .registry
            .ids()
            .into_iter()
            .filter(|_| self.rng.r#gen::<f32>() < chance)
            .collect();
        for id in victims {
            self.kill(id, DeathCause::Overpopulation, state);
        }
    }

    fn cleanup(&mut self, state: &mut TickState) {
        let starved: Vec<OrcId> = self
            .registry
            .iter()
            .filter(|o| o.energy <= 0.0)
            .map(|o| o.id)
            .collect();
        for id in starved {
            self.kill(id, DeathCause::Starvation, state);
        }
    }

    fn kill(&mut self, id: OrcId, cause: DeathCause, state: &mut TickState) {
        if self.registry.remove(id).is_none() {
            return;
        }
        let events = &mut state.events;
        match cause {
            DeathCause::Starvation => events.starvation_deaths += 1,
            DeathCause::Combat => events.combat_deaths += 1,
            DeathCause::Overpopulation => events.overpopulation_deaths += 1,
            DeathCause::OldAge => events.old_age_deaths += 1,
        }
    }
}

fn resolve_seed(seed: u64) -> u64 {
    if seed == 0 {
        rand::thread_rng().r#gen::<u64>().max(1)
    } else {
        seed
    }
}

/// The engine draws from its own stream so it never replays the numbers the
/// field generator consumed for the same seed.
fn engine_rng(seed: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(1);
    rng
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Biome, Cell};

    fn scenario_settings(width: u32, height: u32) -> Settings {
        Settings {
            grid_width: width,
            grid_height: height,
            seed: 1,
            movement_noise: 0.0,
            infection_base_chance: 0.0,
            infection_stressed_chance: 0.0,
            infection_spread_chance: 0.0,
            protection_threshold: 0,
            aggression: 1.0,
            reproduction_chance: 0.0,
            protected_reproduction_bonus: 0.0,
            max_population: 0,
            ..Settings::default()
        }
    }

    fn uniform_sim(settings: Settings, humidity: f32, fertility: f32, biome: Biome) -> Simulation {
        let dims = GridDims::new(settings.grid_width, settings.grid_height);
        let field = Field::uniform(
            dims,
            Cell {
                humidity,
                fertility,
                biome,
            },
        );
        Simulation::with_field(settings, field).unwrap()
    }

    fn place(sim: &mut Simulation, kind: Kind, x: u32, y: u32) -> OrcId {
        sim.place_orc(kind, Coord::new(x, y)).unwrap()
    }

    fn small_world(seed: u64) -> Settings {
        Settings {
            grid_width: 32,
            grid_height: 20,
            seed,
            ..Settings::default()
        }
    }

    #[test]
    fn invariants_hold_over_many_ticks() {
        let mut sim = Simulation::new(small_world(7)).unwrap();
        assert!(!sim.registry().is_empty());
        for _ in 0..200 {
            let summary = sim.step();
            assert_eq!(sim.registry().check_invariants(), Ok(()));
            assert_eq!(summary.per_kind.iter().sum::<usize>(), summary.total);
            assert_eq!(summary.total, sim.registry().len());
            assert!(sim.registry().iter().all(|o| o.energy > 0.0));
        }
    }

    #[test]
    fn same_seed_gives_identical_runs() {
        let mut a = Simulation::new(small_world(42)).unwrap();
        let mut b = Simulation::new(small_world(42)).unwrap();
        let initial = a.snapshot();
        assert_eq!(initial, b.snapshot());

        for _ in 0..50 {
            assert_eq!(a.step(), b.step());
        }
        assert_eq!(a.snapshot(), b.snapshot());

        a.reset(42);
        assert_eq!(a.snapshot(), initial);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = Simulation::new(small_world(1)).unwrap();
        let b = Simulation::new(small_world(2)).unwrap();
        assert_ne!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn initial_population_matches_ratio_and_biomes() {
        let sim = Simulation::new(small_world(9)).unwrap();
        let expected = (32.0_f32 * 20.0 * 0.08).round() as usize;
        assert_eq!(sim.registry().len(), expected);
        for orc in sim.registry().iter() {
            assert_eq!(orc.kind.home_biome(), sim.field().biome_at(orc.position));
        }
    }

    #[test]
    fn zero_seed_is_resolved_and_reported() {
        let sim = Simulation::new(small_world(0)).unwrap();
        assert_ne!(sim.seed(), 0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad = Settings {
            grid_width: 0,
            reproduction_chance: 1.5,
            ..Settings::default()
        };
        match Simulation::new(bad) {
            Err(SimulationError::InvalidSettings(msg)) => {
                assert!(msg.contains("grid_width"));
                assert!(msg.contains("reproduction_chance"));
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("invalid settings accepted"),
        }
    }

    #[test]
    fn field_must_match_grid_size() {
        let settings = scenario_settings(10, 10);
        let field = Field::uniform(
            GridDims::new(5, 5),
            Cell {
                humidity: 0.5,
                fertility: 0.5,
                biome: Biome::Mire,
            },
        );
        assert!(matches!(
            Simulation::with_field(settings, field),
            Err(SimulationError::FieldMismatch { .. })
        ));
    }

    #[test]
    fn placement_rejects_occupied_and_out_of_bounds() {
        let mut sim = uniform_sim(scenario_settings(4, 4), 0.5, 0.5, Biome::Mire);
        place(&mut sim, Kind::Brute, 1, 1);
        assert_eq!(
            sim.place_orc(Kind::Warden, Coord::new(1, 1)),
            Err(PlacementError::Occupied(Coord::new(1, 1)))
        );
        assert_eq!(
            sim.place_orc(Kind::Warden, Coord::new(4, 0)),
            Err(PlacementError::OutOfBounds(Coord::new(4, 0)))
        );
    }

    #[test]
    fn isolated_orc_on_rich_home_cell_gains_energy() {
        let mut sim = uniform_sim(scenario_settings(7, 7), 0.9, 0.9, Biome::Highland);
        let id = place(&mut sim, Kind::Warden, 3, 3);
        let before = sim.registry().get(id).unwrap().energy;
        sim.step();
        let after = sim.registry().get(id).unwrap().energy;
        assert!(after > before, "{} -> {}", before, after);
    }

    #[test]
    fn home_biome_beats_enemy_biome() {
        let run = |kind: Kind| {
            let mut sim = uniform_sim(scenario_settings(7, 7), 0.55, 0.9, Biome::Badlands);
            let id = place(&mut sim, kind, 3, 3);
            for _ in 0..20 {
                sim.step();
            }
            sim.registry().get(id).map_or(0.0, |o| o.energy)
        };
        let home = run(Kind::Brute);
        let enemy = run(Kind::Stalker);
        assert!(home > enemy, "home {} enemy {}", home, enemy);
    }

    #[test]
    fn strength_gap_kills_the_weaker_fighter() {
        let mut sim = uniform_sim(scenario_settings(6, 6), 0.55, 0.5, Biome::Mire);
        let stalker = place(&mut sim, Kind::Stalker, 2, 2);
        let brute = place(&mut sim, Kind::Brute, 3, 2);
        for (id, strength) in [(stalker, 0.5), (brute, 2.0)] {
            let orc = sim.registry.get_mut(id).unwrap();
            orc.traits.strength = strength;
            orc.energy = 10.0;
        }

        let summary = sim.step();
        assert!(!sim.registry().contains(stalker));
        assert!(sim.registry().contains(brute));
        assert_eq!(summary.events.fights, 1);
        assert_eq!(summary.events.combat_deaths, 1);
        assert_eq!(summary.count(Kind::Stalker), 0);
    }

    #[test]
    fn evenly_matched_fighters_only_skirmish() {
        let mut sim = uniform_sim(scenario_settings(6, 6), 0.55, 0.5, Biome::Mire);
        let a = place(&mut sim, Kind::Brute, 2, 2);
        let b = place(&mut sim, Kind::Warden, 3, 2);
        for id in [a, b] {
            let orc = sim.registry.get_mut(id).unwrap();
            orc.traits.strength = 1.0;
            orc.energy = 10.0;
        }
        let summary = sim.step();
        assert_eq!(summary.events.skirmishes, 1);
        assert_eq!(summary.events.combat_deaths, 0);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn one_fight_per_orc_per_tick() {
        let mut sim = uniform_sim(scenario_settings(6, 6), 0.55, 0.5, Biome::Mire);
        let brute = place(&mut sim, Kind::Brute, 2, 1);
        let left = place(&mut sim, Kind::Stalker, 1, 1);
        let right = place(&mut sim, Kind::Stalker, 3, 1);
        sim.registry.get_mut(brute).unwrap().traits.strength = 2.0;
        for id in [left, right] {
            let orc = sim.registry.get_mut(id).unwrap();
            orc.traits.strength = 0.5;
            orc.energy = 10.0;
        }

        let summary = sim.step();
        assert_eq!(summary.events.fights, 1);
        assert_eq!(summary.events.combat_deaths, 1);
        assert!(!sim.registry().contains(left), "ties go to the lowest id");
        assert!(sim.registry().contains(right));
    }

    #[test]
    fn protected_race_is_left_alone() {
        let settings = Settings {
            protection_threshold: 5,
            ..scenario_settings(8, 4)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
        for x in 0..6 {
            place(&mut sim, Kind::Brute, x, 0);
        }
        for x in 0..2 {
            let id = place(&mut sim, Kind::Stalker, x, 1);
            sim.registry.get_mut(id).unwrap().traits.strength = 0.2;
        }

        for _ in 0..10 {
            let summary = sim.step();
            assert_eq!(summary.events.fights + summary.events.skirmishes, 0);
            assert_eq!(summary.count(Kind::Stalker), 2);
        }
    }

    #[test]
    fn adjacent_pair_produces_exactly_one_child() {
        let settings = Settings {
            reproduction_chance: 1.0,
            ..scenario_settings(6, 6)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
        place(&mut sim, Kind::Brute, 2, 2);
        place(&mut sim, Kind::Brute, 3, 2);

        let summary = sim.step();
        assert_eq!(summary.events.births, 1);
        assert_eq!(summary.count(Kind::Brute), 3);
        let child = sim.registry().iter().find(|o| o.born_tick == 1).unwrap();
        assert_eq!(child.kind, Kind::Brute);
    }

    #[test]
    fn adjacent_pair_breeds_despite_movement_noise() {
        for seed in 1..=200 {
            let settings = Settings {
                grid_width: 6,
                grid_height: 6,
                seed,
                reproduction_chance: 1.0,
                infection_base_chance: 0.0,
                infection_stressed_chance: 0.0,
                infection_spread_chance: 0.0,
                ..Settings::default()
            };
            assert!(settings.movement_noise > settings.stay_bias);
            let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
            place(&mut sim, Kind::Brute, 2, 2);
            place(&mut sim, Kind::Brute, 3, 2);

            let summary = sim.step();
            assert_eq!(summary.events.births, 1, "seed {}", seed);
            assert_eq!(summary.count(Kind::Brute), 3, "seed {}", seed);
        }
    }

    #[test]
    fn parent_pays_for_the_child() {
        let settings = Settings {
            reproduction_chance: 1.0,
            mutation_rate: 0.0,
            ..scenario_settings(6, 6)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
        let parent = place(&mut sim, Kind::Brute, 2, 2);
        place(&mut sim, Kind::Brute, 3, 2);

        sim.step();
        let child = sim.registry().iter().find(|o| o.born_tick == 1).unwrap().clone();
        let parent = sim.registry().get(parent).unwrap();
        assert!(parent.energy < 18.0 - child.energy + 1.0);
        assert_eq!(child.traits, Kind::Brute.base_traits());
    }

    #[test]
    fn lone_orc_cannot_reproduce() {
        let settings = Settings {
            reproduction_chance: 1.0,
            ..scenario_settings(6, 6)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
        place(&mut sim, Kind::Brute, 2, 2);
        place(&mut sim, Kind::Warden, 3, 2);
        let summary = sim.step();
        assert_eq!(summary.events.births, 0);
    }

    #[test]
    fn infection_drains_then_expires() {
        let mut sim = uniform_sim(scenario_settings(10, 10), 0.55, 0.5, Biome::Highland);
        let sick = place(&mut sim, Kind::Warden, 0, 0);
        let healthy = place(&mut sim, Kind::Warden, 9, 9);
        sim.registry.get_mut(sick).unwrap().infect(2);

        let summary = sim.step();
        assert_eq!(summary.infected, 1);
        let sick_energy = sim.registry().get(sick).unwrap().energy;
        let healthy_energy = sim.registry().get(healthy).unwrap().energy;
        assert!(sick_energy < healthy_energy);

        let summary = sim.step();
        assert_eq!(summary.infected, 0);
        assert!(!sim.registry().get(sick).unwrap().is_infected());
    }

    #[test]
    fn infection_spreads_to_neighbors() {
        let settings = Settings {
            infection_spread_chance: 1.0,
            ..scenario_settings(6, 6)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Highland);
        let sick = place(&mut sim, Kind::Warden, 2, 2);
        let neighbor = place(&mut sim, Kind::Warden, 3, 2);
        sim.registry.get_mut(sick).unwrap().infect(10);

        let summary = sim.step();
        assert!(summary.events.new_infections >= 1);
        assert!(sim.registry().get(neighbor).unwrap().is_infected());
    }

    #[test]
    fn overpopulation_pulls_back_toward_cap() {
        let settings = Settings {
            max_population: 50,
            ..scenario_settings(20, 20)
        };
        let mut sim = uniform_sim(settings, 0.55, 0.5, Biome::Badlands);
        for i in 0..150 {
            let id = place(&mut sim, Kind::Brute, i % 20, i / 20);
            sim.registry.get_mut(id).unwrap().energy = 1000.0;
        }

        let mut previous = sim.registry().len();
        for _ in 0..30 {
            let summary = sim.step();
            if previous <= 50 {
                assert_eq!(summary.events.overpopulation_deaths, 0);
            }
            assert!(summary.total <= previous);
            previous = summary.total;
        }
        assert!(previous <= 60, "population stuck at {}", previous);
        assert!(previous >= 30, "population collapsed to {}", previous);
    }

    #[test]
    fn old_age_ends_a_life_when_enabled() {
        let settings = Settings {
            max_age: 3,
            ..scenario_settings(5, 5)
        };
        let mut sim = uniform_sim(settings, 0.9, 0.9, Biome::Mire);
        let id = place(&mut sim, Kind::Stalker, 2, 2);
        for _ in 0..3 {
            sim.step();
        }
        assert!(sim.registry().contains(id));
        let summary = sim.step();
        assert!(!sim.registry().contains(id));
        assert_eq!(summary.events.old_age_deaths, 1);
    }

    #[test]
    fn starving_orc_is_removed() {
        let mut sim = uniform_sim(scenario_settings(5, 5), 0.1, 0.0, Biome::Highland);
        let id = place(&mut sim, Kind::Brute, 2, 2);
        sim.registry.get_mut(id).unwrap().energy = 0.1;
        let summary = sim.step();
        assert!(!sim.registry().contains(id));
        assert_eq!(summary.events.starvation_deaths, 1);
        assert!(summary.is_extinct());
    }

    #[test]
    fn snapshot_lists_orcs_in_id_order() {
        let mut sim = uniform_sim(scenario_settings(5, 5), 0.5, 0.5, Biome::Mire);
        place(&mut sim, Kind::Warden, 4, 4);
        place(&mut sim, Kind::Brute, 0, 0);
        let snap = sim.snapshot();
        assert_eq!(snap.width, 5);
        assert_eq!(snap.cells.len(), 25);
        assert_eq!(snap.orcs.len(), 2);
        assert!(snap.orcs[0].id < snap.orcs[1].id);
        assert_eq!(snap.orc_at(Coord::new(0, 0)).map(|o| o.kind), Some(Kind::Brute));
        assert_eq!(snap.count(Kind::Warden), 1);
        assert_eq!(snap.cell(Coord::new(2, 2)).map(|c| c.biome), Some(Biome::Mire));
        assert_eq!(snap.cell(Coord::new(5, 0)), None);
    }
}
