use serde::{Deserialize, Serialize};

use crate::population::{Kind, Registry};

/// Event tallies accumulated while one tick runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    pub births: u32,
    pub starvation_deaths: u32,
    pub combat_deaths: u32,
    pub overpopulation_deaths: u32,
    pub old_age_deaths: u32,
    pub fights: u32,
    pub skirmishes: u32,
    pub new_infections: u32,
    pub moves: u32,
}

impl TickEvents {
    pub fn deaths(&self) -> u32 {
        self.starvation_deaths + self.combat_deaths + self.overpopulation_deaths + self.old_age_deaths
    }
}

/// Per-tick aggregate metrics for HUDs, logs and degenerate state detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    pub total: usize,
    /// Live counts indexed by [`Kind::index`].
    pub per_kind: [usize; 3],
    pub infected: usize,
    pub mean_energy: f32,
    pub mean_strength: f32,
    pub mean_agility: f32,
    pub mean_resilience: f32,
    pub diversity_index: f32,
    pub events: TickEvents,
}

impl TickSummary {
    pub fn count(&self, kind: Kind) -> usize {
        self.per_kind[kind.index()]
    }

    pub fn is_extinct(&self) -> bool {
        self.total == 0
    }
}

/// Compute the summary for the registry as it stands after a tick.
pub fn compute_summary(tick: u64, registry: &Registry, events: TickEvents) -> TickSummary {
    let per_kind = registry.counts();
    let total = registry.len();
    if total == 0 {
        return TickSummary {
            tick,
            total,
            per_kind,
            infected: 0,
            mean_energy: 0.0,
            mean_strength: 0.0,
            mean_agility: 0.0,
            mean_resilience: 0.0,
            diversity_index: 0.0,
            events,
        };
    }

    let mut infected = 0;
    let mut energy = 0.0_f64;
    let mut strength = 0.0_f64;
    let mut agility = 0.0_f64;
    let mut resilience = 0.0_f64;
    for orc in registry.iter() {
        if orc.is_infected() {
            infected += 1;
        }
        energy += orc.energy as f64;
        strength += orc.traits.strength as f64;
        agility += orc.traits.agility as f64;
        resilience += orc.traits.resilience as f64;
    }
    let n = total as f64;

    TickSummary {
        tick,
        total,
        per_kind,
        infected,
        mean_energy: (energy / n) as f32,
        mean_strength: (strength / n) as f32,
        mean_agility: (agility / n) as f32,
        mean_resilience: (resilience / n) as f32,
        diversity_index: shannon_diversity(&per_kind),
        events,
    }
}

/// Shannon diversity index normalized to [0, 1].
/// 0 = a single race (or nobody), 1 = every present race equally represented.
pub fn shannon_diversity(counts: &[usize]) -> f32 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    let mut entropy = 0.0_f64;
    let mut non_zero = 0_u32;

    for &count in counts {
        if count > 0 {
            non_zero += 1;
            let p = count as f64 / total_f;
            entropy -= p * p.ln();
        }
    }

    if non_zero <= 1 {
        return 0.0;
    }

    // Normalize by max possible entropy (ln of number of races present)
    let max_entropy = (non_zero as f64).ln();
    (entropy / max_entropy) as f32
}
