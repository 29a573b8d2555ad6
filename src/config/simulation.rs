use serde::Deserialize;
use std::path::Path;

/// Runtime options for the headless driver. Engine constants live in [`super::Settings`].
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default = "default_max_records")]
    pub max_records: u32,
    #[serde(default = "default_record_directory")]
    pub record_directory: String,
    #[serde(default = "default_summary_interval")]
    pub summary_interval: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub max_ticks: u64,
}

fn default_record_interval() -> u32 {
    500
}
fn default_max_records() -> u32 {
    10
}
fn default_record_directory() -> String {
    "./records".to_string()
}
fn default_summary_interval() -> u32 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            record_interval: default_record_interval(),
            max_records: default_max_records(),
            record_directory: default_record_directory(),
            summary_interval: default_summary_interval(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            max_ticks: 0,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    /// Like [`Self::from_file`], but a missing file yields the defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.record_interval == 0 {
            errors.push(format!(
                "record_interval must be > 0, got {}. Example: record_interval = 500",
                self.record_interval
            ));
        }

        if self.max_records == 0 {
            errors.push(format!(
                "max_records must be > 0, got {}. Example: max_records = 10",
                self.max_records
            ));
        }

        if self.summary_interval == 0 {
            errors.push(format!(
                "summary_interval must be > 0, got {}. Example: summary_interval = 100",
                self.summary_interval
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"text\"",
                valid_formats, self.log_format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
