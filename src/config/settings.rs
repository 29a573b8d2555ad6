use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable constants for one simulation run.
///
/// Every field has a default, so an empty TOML document is a valid settings file.
/// Stored with each run record so a run can be reproduced from its seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Grid and seeding
    pub grid_width: u32,
    pub grid_height: u32,
    /// 0 picks a random seed at construction time.
    pub seed: u64,
    /// Display-only pacing hint for drivers.
    pub tick_rate: f32,
    pub initial_orc_ratio: f32,
    pub initial_trait_spread: f32,

    // Field generation
    pub humidity_bias: f32,
    pub humidity_variation: f32,
    pub humidity_vertical_pull: f32,
    pub fertility_bias: f32,
    pub fertility_variation: f32,
    pub fertility_vertical_pull: f32,
    pub noise_scale: f64,
    pub smoothing_passes: u32,

    // Energy
    pub base_energy: f32,
    pub energy_decay: f32,
    pub move_cost: f32,
    pub forage_gain: f32,
    pub humidity_low_threshold: f32,
    pub humidity_high_threshold: f32,
    pub humidity_penalty: f32,
    pub humidity_bonus: f32,
    pub biome_bonus: f32,
    pub biome_penalty: f32,

    // Social
    pub group_support_bonus: f32,
    pub group_support_cap: u32,
    pub loner_grit_bonus: f32,
    pub loner_grit_threshold: u32,

    // Movement
    pub fertility_weight: f32,
    pub humidity_weight: f32,
    pub biome_move_bonus_weight: f32,
    pub biome_move_penalty_weight: f32,
    pub herd_radius: u32,
    pub herd_attraction: f32,
    pub pair_seek_multiplier: f32,
    pub habitat_seek_radius: u32,
    pub habitat_seek_bonus: f32,
    pub habitat_bad_threshold: f32,
    pub bad_cell_bias: f32,
    pub escape_strength_threshold: f32,
    pub escape_energy_threshold: f32,
    pub escape_threat_radius: u32,
    pub escape_threat_weight: f32,
    pub stay_bias: f32,
    pub movement_noise: f32,

    // Combat
    pub aggression: f32,
    /// Weaker/stronger effective strength ratio at or above which a fight is a skirmish.
    pub parity_threshold: f32,
    pub skirmish_cost: f32,
    pub combat_damage: f32,
    pub fight_cost: f32,
    pub fight_reward: f32,
    pub biome_deterrence: bool,
    /// Races with fewer live members than this are shielded from combat.
    pub protection_threshold: u32,

    // Reproduction and mutation
    pub reproduction_threshold: f32,
    pub reproduction_chance: f32,
    pub reproduction_energy_share: f32,
    pub reproduction_damping_population: u32,
    pub reproduction_damping_factor: f32,
    pub protected_reproduction_bonus: f32,
    pub protected_threshold_factor: f32,
    pub mutation_rate: f32,
    pub mutation_magnitude: f32,

    // Infection
    pub infection_base_chance: f32,
    pub infection_stressed_chance: f32,
    pub infection_crowd_population: u32,
    pub infection_crowd_neighbors: u32,
    pub infection_crowd_multiplier: f32,
    pub infection_spread_chance: f32,
    pub infection_duration: u32,
    pub infection_energy_drain: f32,
    pub infection_combat_penalty: f32,

    // Overpopulation and ageing
    pub max_population: u32,
    pub overpop_base: f32,
    pub overpop_scale: f32,
    pub overpop_max_chance: f32,
    /// 0 disables old-age death.
    pub max_age: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_width: 64,
            grid_height: 40,
            seed: 0,
            tick_rate: 6.0,
            initial_orc_ratio: 0.08,
            initial_trait_spread: 0.15,

            humidity_bias: 0.55,
            humidity_variation: 0.22,
            humidity_vertical_pull: -0.2,
            fertility_bias: 0.5,
            fertility_variation: 0.24,
            fertility_vertical_pull: 0.16,
            noise_scale: 0.08,
            smoothing_passes: 4,

            base_energy: 18.0,
            energy_decay: 0.32,
            move_cost: 0.2,
            forage_gain: 0.5,
            humidity_low_threshold: 0.45,
            humidity_high_threshold: 0.65,
            humidity_penalty: 0.18,
            humidity_bonus: 0.15,
            biome_bonus: 0.16,
            biome_penalty: 0.12,

            group_support_bonus: 0.05,
            group_support_cap: 3,
            loner_grit_bonus: 0.35,
            loner_grit_threshold: 3,

            fertility_weight: 0.5,
            humidity_weight: 0.35,
            biome_move_bonus_weight: 1.0,
            biome_move_penalty_weight: 0.7,
            herd_radius: 3,
            herd_attraction: 0.55,
            pair_seek_multiplier: 1.8,
            habitat_seek_radius: 4,
            habitat_seek_bonus: 0.4,
            habitat_bad_threshold: 0.48,
            bad_cell_bias: 0.8,
            escape_strength_threshold: 0.95,
            escape_energy_threshold: 5.5,
            escape_threat_radius: 2,
            escape_threat_weight: 0.6,
            stay_bias: 0.05,
            movement_noise: 0.05,

            aggression: 0.45,
            parity_threshold: 0.9,
            skirmish_cost: 0.56,
            combat_damage: 24.0,
            fight_cost: 0.8,
            fight_reward: 2.6,
            biome_deterrence: true,
            protection_threshold: 16,

            reproduction_threshold: 6.0,
            reproduction_chance: 0.12,
            reproduction_energy_share: 0.35,
            reproduction_damping_population: 200,
            reproduction_damping_factor: 0.5,
            protected_reproduction_bonus: 0.08,
            protected_threshold_factor: 0.65,
            mutation_rate: 0.15,
            mutation_magnitude: 0.1,

            infection_base_chance: 0.0002,
            infection_stressed_chance: 0.0012,
            infection_crowd_population: 200,
            infection_crowd_neighbors: 5,
            infection_crowd_multiplier: 5.0,
            infection_spread_chance: 0.04,
            infection_duration: 30,
            infection_energy_drain: 0.6,
            infection_combat_penalty: 0.12,

            max_population: 400,
            overpop_base: 0.04,
            overpop_scale: 0.18,
            overpop_max_chance: 0.75,
            max_age: 0,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file and validate them.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn cell_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Validate every constant, reporting all violations at once.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.grid_width == 0 {
            errors.push("grid_width must be > 0, got 0. Example: grid_width = 64".to_string());
        }
        if self.grid_height == 0 {
            errors.push("grid_height must be > 0, got 0. Example: grid_height = 40".to_string());
        }
        if !(self.tick_rate > 0.0 && self.tick_rate.is_finite()) {
            errors.push(format!(
                "tick_rate must be a finite value > 0.0, got {}. Example: tick_rate = 6.0",
                self.tick_rate
            ));
        }
        if !(self.base_energy > 0.0 && self.base_energy.is_finite()) {
            errors.push(format!(
                "base_energy must be a finite value > 0.0, got {}. Example: base_energy = 18.0",
                self.base_energy
            ));
        }
        if !(self.noise_scale > 0.0 && self.noise_scale.is_finite()) {
            errors.push(format!(
                "noise_scale must be a finite value > 0.0, got {}. Example: noise_scale = 0.08",
                self.noise_scale
            ));
        }
        if !(0.0..1.0).contains(&self.mutation_magnitude) {
            errors.push(format!(
                "mutation_magnitude must be in [0.0, 1.0), got {}. Example: mutation_magnitude = 0.1",
                self.mutation_magnitude
            ));
        }
        if !(0.0..1.0).contains(&self.initial_trait_spread) {
            errors.push(format!(
                "initial_trait_spread must be in [0.0, 1.0), got {}. Example: initial_trait_spread = 0.15",
                self.initial_trait_spread
            ));
        }
        if self.humidity_low_threshold > self.humidity_high_threshold {
            errors.push(format!(
                "humidity_low_threshold ({}) must not exceed humidity_high_threshold ({})",
                self.humidity_low_threshold, self.humidity_high_threshold
            ));
        }

        let finite = [
            ("humidity_low_threshold", self.humidity_low_threshold),
            ("humidity_high_threshold", self.humidity_high_threshold),
            ("humidity_bias", self.humidity_bias),
            ("humidity_variation", self.humidity_variation),
            ("humidity_vertical_pull", self.humidity_vertical_pull),
            ("fertility_bias", self.fertility_bias),
            ("fertility_variation", self.fertility_variation),
            ("fertility_vertical_pull", self.fertility_vertical_pull),
            ("habitat_bad_threshold", self.habitat_bad_threshold),
            ("bad_cell_bias", self.bad_cell_bias),
            ("stay_bias", self.stay_bias),
            ("escape_strength_threshold", self.escape_strength_threshold),
            ("escape_energy_threshold", self.escape_energy_threshold),
            ("fertility_weight", self.fertility_weight),
            ("humidity_weight", self.humidity_weight),
            ("biome_move_bonus_weight", self.biome_move_bonus_weight),
            ("biome_move_penalty_weight", self.biome_move_penalty_weight),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                errors.push(format!("{} must be a finite number, got {}", name, value));
            }
        }

        let probabilities = [
            ("initial_orc_ratio", self.initial_orc_ratio),
            ("aggression", self.aggression),
            ("parity_threshold", self.parity_threshold),
            ("reproduction_chance", self.reproduction_chance),
            ("reproduction_energy_share", self.reproduction_energy_share),
            ("reproduction_damping_factor", self.reproduction_damping_factor),
            ("protected_reproduction_bonus", self.protected_reproduction_bonus),
            ("protected_threshold_factor", self.protected_threshold_factor),
            ("mutation_rate", self.mutation_rate),
            ("infection_base_chance", self.infection_base_chance),
            ("infection_stressed_chance", self.infection_stressed_chance),
            ("infection_spread_chance", self.infection_spread_chance),
            ("infection_combat_penalty", self.infection_combat_penalty),
            ("overpop_base", self.overpop_base),
            ("overpop_max_chance", self.overpop_max_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{} must be in [0.0, 1.0], got {}", name, value));
            }
        }

        let magnitudes = [
            ("energy_decay", self.energy_decay),
            ("move_cost", self.move_cost),
            ("forage_gain", self.forage_gain),
            ("humidity_penalty", self.humidity_penalty),
            ("humidity_bonus", self.humidity_bonus),
            ("biome_bonus", self.biome_bonus),
            ("biome_penalty", self.biome_penalty),
            ("group_support_bonus", self.group_support_bonus),
            ("loner_grit_bonus", self.loner_grit_bonus),
            ("herd_attraction", self.herd_attraction),
            ("pair_seek_multiplier", self.pair_seek_multiplier),
            ("habitat_seek_bonus", self.habitat_seek_bonus),
            ("escape_threat_weight", self.escape_threat_weight),
            ("movement_noise", self.movement_noise),
            ("skirmish_cost", self.skirmish_cost),
            ("combat_damage", self.combat_damage),
            ("fight_cost", self.fight_cost),
            ("fight_reward", self.fight_reward),
            ("reproduction_threshold", self.reproduction_threshold),
            ("infection_crowd_multiplier", self.infection_crowd_multiplier),
            ("infection_energy_drain", self.infection_energy_drain),
            ("overpop_scale", self.overpop_scale),
        ];
        for (name, value) in magnitudes {
            if value < 0.0 || !value.is_finite() {
                errors.push(format!("{} must be a finite value >= 0.0, got {}", name, value));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-settings.toml")
    }

    #[test]
    fn defaults_applied_for_empty_settings() {
        let settings = Settings::from_toml_str("", &test_path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.grid_width, 64);
        assert_eq!(settings.grid_height, 40);
        assert_eq!(settings.reproduction_damping_population, 200);
        assert_eq!(settings.infection_base_chance, 0.0002);
        assert_eq!(settings.infection_stressed_chance, 0.0012);
        assert_eq!(settings.max_age, 0);
    }

    #[test]
    fn partial_settings_override_only_named_fields() {
        let toml = r#"
            grid_width = 32
            grid_height = 16
            seed = 7
            aggression = 1.0
            biome_deterrence = false
        "#;
        let settings = Settings::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(settings.grid_width, 32);
        assert_eq!(settings.grid_height, 16);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.aggression, 1.0);
        assert!(!settings.biome_deterrence);
        assert_eq!(settings.base_energy, 18.0);
        assert_eq!(settings.cell_count(), 512);
    }

    #[test]
    fn zero_grid_dimensions_rejected() {
        let err = Settings::from_toml_str("grid_width = 0", &test_path()).unwrap_err();
        assert!(err.contains("grid_width"));
        assert!(err.contains("> 0"));
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let err = Settings::from_toml_str("reproduction_chance = 1.5", &test_path()).unwrap_err();
        assert!(err.contains("reproduction_chance"));
        assert!(err.contains("[0.0, 1.0]"));

        let err = Settings::from_toml_str("infection_base_chance = -0.1", &test_path()).unwrap_err();
        assert!(err.contains("infection_base_chance"));
    }

    #[test]
    fn negative_magnitude_rejected() {
        let err = Settings::from_toml_str("combat_damage = -3.0", &test_path()).unwrap_err();
        assert!(err.contains("combat_damage"));
    }

    #[test]
    fn nan_and_infinite_values_rejected() {
        for key in [
            "tick_rate",
            "base_energy",
            "noise_scale",
            "escape_energy_threshold",
            "escape_strength_threshold",
            "habitat_bad_threshold",
            "bad_cell_bias",
            "stay_bias",
            "humidity_low_threshold",
            "humidity_high_threshold",
            "humidity_bias",
            "fertility_weight",
            "combat_damage",
            "aggression",
        ] {
            for value in ["nan", "inf", "-inf"] {
                let toml = format!("{} = {}", key, value);
                let err = Settings::from_toml_str(&toml, &test_path())
                    .expect_err(&toml);
                assert!(err.contains(key), "{}: {}", toml, err);
            }
        }
    }

    #[test]
    fn non_positive_tick_rate_rejected() {
        let err = Settings::from_toml_str("tick_rate = 0.0", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate"));
        let err = Settings::from_toml_str("base_energy = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("base_energy"));
    }

    #[test]
    fn inverted_humidity_thresholds_rejected() {
        let toml = "humidity_low_threshold = 0.8\nhumidity_high_threshold = 0.2";
        let err = Settings::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("humidity_low_threshold"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "grid_width = 0\ngrid_height = 0\nmutation_rate = 2.0";
        let err = Settings::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("grid_width"));
        assert!(err.contains("grid_height"));
        assert!(err.contains("mutation_rate"));
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err = Settings::from_toml_str("grid_width = [", &test_path()).unwrap_err();
        assert!(err.contains("test-settings.toml"));
    }

    #[test]
    fn from_file_loads_valid_settings() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "seed = 99\nmax_population = 120").unwrap();
        let settings = Settings::from_file(tmp.path()).unwrap();
        assert_eq!(settings.seed, 99);
        assert_eq!(settings.max_population, 120);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = Settings::from_file(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
