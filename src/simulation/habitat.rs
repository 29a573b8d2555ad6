//! Energy effects of the environment and neighbors, and movement desirability.
//!
//! All functions here are pure: the engine gathers the inputs (cell values,
//! neighbor counts) and applies the returned deltas and scores.

use crate::config::Settings;
use crate::population::{Affinity, Kind};
use crate::world::{Biome, Cell, Coord, Field};

/// Humidity below the low threshold costs energy, above the high threshold it gives energy.
pub fn humidity_effect(humidity: f32, settings: &Settings) -> f32 {
    if humidity < settings.humidity_low_threshold {
        -(settings.humidity_low_threshold - humidity) * settings.humidity_penalty
    } else if humidity > settings.humidity_high_threshold {
        (humidity - settings.humidity_high_threshold) * settings.humidity_bonus
    } else {
        0.0
    }
}

pub fn biome_effect(kind: Kind, biome: Biome, settings: &Settings) -> f32 {
    match kind.affinity(biome) {
        Affinity::Home => settings.biome_bonus,
        Affinity::Enemy => -settings.biome_penalty,
        Affinity::Neutral => 0.0,
    }
}

/// Per-tick environment delta before foraging: idle decay, humidity and biome affinity.
pub fn environment_delta(kind: Kind, cell: &Cell, settings: &Settings) -> f32 {
    -settings.energy_decay
        + humidity_effect(cell.humidity, settings)
        + biome_effect(kind, cell.biome, settings)
}

pub fn forage_gain(fertility: f32, settings: &Settings) -> f32 {
    settings.forage_gain * fertility.max(0.0)
}

/// Same-kind and other-kind agents in the Moore neighborhood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocialContext {
    pub allies: u32,
    pub foes: u32,
}

/// Group support for each adjacent ally (capped), plus a resilience-scaled
/// bonus for an agent with no allies surrounded by enough foes. The two add.
pub fn social_delta(ctx: SocialContext, resilience: f32, settings: &Settings) -> f32 {
    let mut delta = 0.0;
    if ctx.allies > 0 {
        delta += ctx.allies.min(settings.group_support_cap) as f32 * settings.group_support_bonus;
    }
    if ctx.allies == 0 && ctx.foes > 0 && ctx.foes >= settings.loner_grit_threshold {
        delta += settings.loner_grit_bonus * resilience;
    }
    delta
}

/// How attractive a cell is to `kind` on environment alone.
pub fn habitat_score(kind: Kind, cell: &Cell, settings: &Settings) -> f32 {
    let biome_term = match kind.affinity(cell.biome) {
        Affinity::Home => settings.biome_bonus * settings.biome_move_bonus_weight,
        Affinity::Enemy => -settings.biome_penalty * settings.biome_move_penalty_weight,
        Affinity::Neutral => 0.0,
    };
    cell.fertility * settings.fertility_weight + cell.humidity * settings.humidity_weight + biome_term
}

/// Offset toward the best habitat within `habitat_seek_radius`, if any cell
/// beats the current one by a clear margin. Ties keep the first cell in row-major order.
pub fn seek_direction(
    field: &Field,
    kind: Kind,
    position: Coord,
    settings: &Settings,
) -> Option<(i32, i32)> {
    let radius = settings.habitat_seek_radius;
    if radius == 0 {
        return None;
    }
    let mut best_score = habitat_score(kind, field.cell(position), settings) + 0.05;
    let mut best: Option<Coord> = None;
    for coord in field.dims().square_around(position, radius) {
        let score = habitat_score(kind, field.cell(coord), settings);
        if score > best_score {
            best_score = score;
            best = Some(coord);
        }
    }
    best.map(|c| {
        (
            c.x as i32 - position.x as i32,
            c.y as i32 - position.y as i32,
        )
    })
}

/// Cosine between a step and the seek direction, floored at 0.
pub fn alignment(step: (i32, i32), seek: (i32, i32)) -> f32 {
    let dot = (step.0 * seek.0 + step.1 * seek.1) as f32;
    let step_len = ((step.0 * step.0 + step.1 * step.1) as f32).sqrt();
    let seek_len = ((seek.0 * seek.0 + seek.1 * seek.1) as f32).sqrt();
    let norm = (step_len * seek_len).max(1e-3);
    (dot / norm).max(0.0)
}

/// Everything the engine knows about one candidate destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub habitat: f32,
    /// Same-kind agents within `herd_radius` of the candidate, excluding the mover.
    pub herd: u32,
    /// Same-kind agents in the candidate's Moore neighborhood, excluding the mover.
    pub adjacent_allies: u32,
    /// Other-kind agents within `escape_threat_radius` of the candidate.
    pub threats: u32,
    pub alignment: f32,
    pub is_stay: bool,
}

/// Per-agent modifiers shared by all of its candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveContext {
    pub current_habitat: f32,
    /// Set when the agent has no adjacent ally, so herding pulls harder.
    pub seeking_mate: bool,
    /// Set when the agent's race is scarce and the agent itself is weak.
    pub fleeing: bool,
}

/// Weighted desirability of one candidate: habitat, herd attraction, flight
/// from enemies, pull toward better habitat, and a push out of bad cells.
///
/// An agent that already has an adjacent ally never steps onto a cell with
/// none; such candidates score negative infinity.
pub fn desirability(candidate: &Candidate, ctx: &MoveContext, settings: &Settings) -> f32 {
    if !ctx.seeking_mate && candidate.adjacent_allies == 0 {
        return f32::NEG_INFINITY;
    }
    let radius = settings.herd_radius.max(1) as f32;
    let mut herd = candidate.herd as f32 * settings.herd_attraction / (radius * radius);
    if ctx.seeking_mate {
        herd *= settings.pair_seek_multiplier;
    }

    let mut score = candidate.habitat + herd + settings.habitat_seek_bonus * candidate.alignment;

    if ctx.fleeing {
        score -= candidate.threats as f32 * settings.escape_threat_weight;
    }
    if ctx.current_habitat < settings.habitat_bad_threshold {
        score += (candidate.habitat - ctx.current_habitat) * settings.bad_cell_bias;
    }
    if candidate.is_stay {
        score += settings.stay_bias;
    }
    score
}

/// Index of the highest score; ties go to the lowest index.
pub fn best_index(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}
