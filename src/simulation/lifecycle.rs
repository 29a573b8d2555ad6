//! Probabilities for infection, reproduction and overpopulation culling.

use crate::config::Settings;
use crate::population::Affinity;

/// Per-tick chance that a healthy agent falls ill.
///
/// Agents standing on the biome that penalizes their race use the stressed
/// chance. Crowded agents in an overfull world get the crowd multiplier on top.
pub fn infection_chance(
    affinity: Affinity,
    total_population: usize,
    adjacent_allies: u32,
    settings: &Settings,
) -> f32 {
    let mut chance = match affinity {
        Affinity::Enemy => settings.infection_stressed_chance,
        Affinity::Home | Affinity::Neutral => settings.infection_base_chance,
    };
    if total_population > settings.infection_crowd_population as usize
        && adjacent_allies >= settings.infection_crowd_neighbors
    {
        chance *= settings.infection_crowd_multiplier;
    }
    chance.clamp(0.0, 1.0)
}

/// Energy an agent needs before it can reproduce.
pub fn reproduction_threshold(protected: bool, settings: &Settings) -> f32 {
    if protected {
        settings.reproduction_threshold * settings.protected_threshold_factor
    } else {
        settings.reproduction_threshold
    }
}

/// Per-tick reproduction chance: boosted for protected races, damped once
/// the world holds more than `reproduction_damping_population` agents.
pub fn reproduction_chance(protected: bool, total_population: usize, settings: &Settings) -> f32 {
    let mut chance = settings.reproduction_chance;
    if protected {
        chance = (chance + settings.protected_reproduction_bonus).min(1.0);
    }
    if total_population > settings.reproduction_damping_population as usize {
        chance *= settings.reproduction_damping_factor;
    }
    chance.clamp(0.0, 1.0)
}

/// Per-agent culling chance for a world holding `total_population` agents.
///
/// Zero at or below the cap, then rises linearly with the relative excess
/// until it saturates at `overpop_max_chance`. A cap of 0 disables culling.
pub fn overpopulation_death_chance(total_population: usize, settings: &Settings) -> f32 {
    let cap = settings.max_population as usize;
    if cap == 0 || total_population <= cap {
        return 0.0;
    }
    let excess = (total_population - cap) as f32 / cap as f32;
    (settings.overpop_base + settings.overpop_scale * excess)
        .min(settings.overpop_max_chance)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stressed_agents_fall_ill_more_often() {
        let s = Settings::default();
        let home = infection_chance(Affinity::Home, 50, 0, &s);
        let neutral = infection_chance(Affinity::Neutral, 50, 0, &s);
        let enemy = infection_chance(Affinity::Enemy, 50, 0, &s);
        assert_eq!(home, s.infection_base_chance);
        assert_eq!(neutral, home);
        assert_eq!(enemy, s.infection_stressed_chance);
        assert!(enemy > home);
    }

    #[test]
    fn crowding_only_counts_in_an_overfull_world() {
        let s = Settings::default();
        let sparse = infection_chance(Affinity::Home, 150, 8, &s);
        let crowded = infection_chance(Affinity::Home, 250, 8, &s);
        let loose = infection_chance(Affinity::Home, 250, 2, &s);
        assert_eq!(sparse, s.infection_base_chance);
        assert!((crowded - s.infection_base_chance * s.infection_crowd_multiplier).abs() < 1e-9);
        assert_eq!(loose, s.infection_base_chance);
    }

    #[test]
    fn protected_races_breed_easier() {
        let s = Settings::default();
        assert!(reproduction_threshold(true, &s) < reproduction_threshold(false, &s));
        assert!(reproduction_chance(true, 50, &s) > reproduction_chance(false, 50, &s));
    }

    #[test]
    fn crowded_world_damps_reproduction() {
        let s = Settings::default();
        let open = reproduction_chance(false, 100, &s);
        let full = reproduction_chance(false, 300, &s);
        assert!((full - open * s.reproduction_damping_factor).abs() < 1e-6);
    }

    #[test]
    fn reproduction_chance_never_exceeds_one() {
        let s = Settings {
            reproduction_chance: 0.98,
            protected_reproduction_bonus: 0.5,
            ..Settings::default()
        };
        assert_eq!(reproduction_chance(true, 10, &s), 1.0);
    }

    #[test]
    fn overpopulation_curve_is_monotonic_and_saturates() {
        let s = Settings::default();
        assert_eq!(overpopulation_death_chance(0, &s), 0.0);
        assert_eq!(overpopulation_death_chance(400, &s), 0.0);

        let mut last = 0.0;
        for total in (401..4000).step_by(50) {
            let p = overpopulation_death_chance(total, &s);
            assert!(p >= last, "curve dipped at {}", total);
            assert!(p <= s.overpop_max_chance);
            last = p;
        }
        assert_eq!(overpopulation_death_chance(100_000, &s), s.overpop_max_chance);
    }

    #[test]
    fn zero_cap_disables_culling() {
        let s = Settings {
            max_population: 0,
            ..Settings::default()
        };
        assert_eq!(overpopulation_death_chance(10_000, &s), 0.0);
    }
}
