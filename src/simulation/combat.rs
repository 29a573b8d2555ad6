//! Combat strength, engagement gates, and fight resolution.

use crate::config::Settings;
use crate::population::{Affinity, Orc};

/// Whether a race with `count` live members is shielded from combat.
pub fn is_protected(count: usize, settings: &Settings) -> bool {
    count < settings.protection_threshold as usize
}

/// Strength trait scaled by condition: full energy fights at full strength,
/// an exhausted agent at half; infection weakens further.
pub fn effective_strength(orc: &Orc, settings: &Settings) -> f32 {
    let condition = (orc.energy / settings.base_energy).clamp(0.0, 1.0);
    let energy_factor = 0.5 + 0.5 * condition;
    let infection_factor = if orc.is_infected() {
        1.0 - settings.infection_combat_penalty
    } else {
        1.0
    };
    orc.traits.strength * energy_factor * infection_factor
}

/// The facts the engagement gates look at for one attacker/defender pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matchup {
    pub attacker_race_count: usize,
    pub defender_race_count: usize,
    /// How the attacker's current cell treats the attacker.
    pub attacker_affinity: Affinity,
    /// How the defender's current cell treats the defender.
    pub defender_affinity: Affinity,
}

/// An attacker never starts a fight when either race is protected, or when
/// deterrence is on and it stands on hostile ground against a defender at home.
pub fn may_initiate(matchup: &Matchup, settings: &Settings) -> bool {
    if is_protected(matchup.attacker_race_count, settings)
        || is_protected(matchup.defender_race_count, settings)
    {
        return false;
    }
    if settings.biome_deterrence
        && matchup.defender_affinity == Affinity::Home
        && matchup.attacker_affinity == Affinity::Enemy
    {
        return false;
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Attacker,
    Defender,
}

/// Energy changes decided by one fight. Losses are positive amounts to subtract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatOutcome {
    /// Evenly matched: both lose a little and neither can die from it.
    Skirmish {
        attacker_loss: f32,
        defender_loss: f32,
    },
    /// The weaker side takes damage proportional to the strength gap;
    /// the winner pays a fixed cost, never more than the loser's damage.
    Decisive {
        winner: Side,
        winner_loss: f32,
        loser_loss: f32,
    },
}

/// Resolve a fight between two effective strengths.
///
/// Skirmish losses are capped at half the combatant's energy, so a skirmish
/// alone never empties an agent.
pub fn resolve(
    attacker_strength: f32,
    defender_strength: f32,
    attacker_energy: f32,
    defender_energy: f32,
    settings: &Settings,
) -> CombatOutcome {
    let stronger = attacker_strength.max(defender_strength);
    let weaker = attacker_strength.min(defender_strength);

    if stronger <= 0.0 || weaker / stronger >= settings.parity_threshold {
        return CombatOutcome::Skirmish {
            attacker_loss: settings.skirmish_cost.min(attacker_energy.max(0.0) * 0.5),
            defender_loss: settings.skirmish_cost.min(defender_energy.max(0.0) * 0.5),
        };
    }

    let winner = if attacker_strength >= defender_strength {
        Side::Attacker
    } else {
        Side::Defender
    };
    let loser_loss = settings.combat_damage * (stronger - weaker) / stronger;
    CombatOutcome::Decisive {
        winner,
        winner_loss: settings.fight_cost.min(loser_loss),
        loser_loss,
    }
}
