use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::simulation::Simulation;

/// Everything needed to rebuild a run at a given tick.
///
/// The population itself is not stored: the engine is deterministic per seed,
/// so replaying `tick` steps from `seed` with `settings` reproduces it. The
/// per-race counts are kept to detect a replay that went astray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub seed: u64,
    pub tick: u64,
    pub settings: Settings,
    pub per_kind: [usize; 3],
    pub total: usize,
    pub created_at: u64,
}

impl RunRecord {
    pub fn capture(sim: &Simulation, run_id: Uuid) -> Self {
        let registry = sim.registry();
        Self {
            run_id,
            seed: sim.seed(),
            tick: sim.tick(),
            settings: sim.settings().clone(),
            per_kind: registry.counts(),
            total: registry.len(),
            created_at: unix_timestamp_now(),
        }
    }
}

/// Metadata about a record file on disk.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    pub path: PathBuf,
    pub tick: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Errors that can occur during record operations.
#[derive(Debug)]
pub enum RecordError {
    Io(io::Error),
    Serialize(String),
    Deserialize(String),
    Corrupt(PathBuf),
    NoValidRecords,
    /// Replaying the record reached different per-race counts.
    Diverged {
        tick: u64,
        expected: [usize; 3],
        actual: [usize; 3],
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Io(e) => write!(f, "I/O error: {}", e),
            RecordError::Serialize(e) => write!(f, "Serialization error: {}", e),
            RecordError::Deserialize(e) => write!(f, "Deserialization error: {}", e),
            RecordError::Corrupt(path) => write!(f, "Corrupt record: {}", path.display()),
            RecordError::NoValidRecords => {
                write!(f, "No valid run records found. Start a run with: orcsim run")
            }
            RecordError::Diverged {
                tick,
                expected,
                actual,
            } => write!(
                f,
                "Replay diverged at tick {}: recorded {:?}, replayed {:?}",
                tick, expected, actual
            ),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        RecordError::Io(e)
    }
}

/// Build a record filename from tick and timestamp.
fn record_filename(tick: u64, timestamp: u64) -> String {
    format!("run-tick{}-{}.bin", tick, timestamp)
}

/// Parse tick and timestamp from a record filename.
/// Expected format: `run-tick{N}-{timestamp}.bin`
fn parse_record_filename(filename: &str) -> Option<(u64, u64)> {
    let stem = filename.strip_suffix(".bin")?;
    let rest = stem.strip_prefix("run-tick")?;
    let (tick_str, ts_str) = rest.split_once('-')?;
    let tick = tick_str.parse::<u64>().ok()?;
    let ts = ts_str.parse::<u64>().ok()?;
    Some((tick, ts))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Save a run record using an atomic write.
///
/// Writes to a temporary file first, then renames to the final path, so a
/// partial write never leaves a truncated record behind.
pub fn save_record(record: &RunRecord, record_dir: &Path) -> Result<PathBuf, RecordError> {
    fs::create_dir_all(record_dir)?;

    let filename = record_filename(record.tick, unix_timestamp_now());
    let target = record_dir.join(&filename);
    let tmp = record_dir.join(format!(".{}.tmp", filename));

    let encoded = bincode::serialize(record).map_err(|e| RecordError::Serialize(e.to_string()))?;

    if let Err(e) = fs::write(&tmp, &encoded) {
        let _ = fs::remove_file(&tmp);
        return Err(RecordError::Io(e));
    }

    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(RecordError::Io(e));
    }

    Ok(target)
}

/// Load a run record, rejecting ones whose counts or settings are inconsistent.
pub fn load_record(path: &Path) -> Result<RunRecord, RecordError> {
    let data = fs::read(path)?;
    let record: RunRecord =
        bincode::deserialize(&data).map_err(|e| RecordError::Deserialize(e.to_string()))?;

    if record.per_kind.iter().sum::<usize>() != record.total || record.settings.validate().is_err() {
        return Err(RecordError::Corrupt(path.to_path_buf()));
    }

    Ok(record)
}

/// List all records in a directory, newest first.
pub fn list_records(record_dir: &Path) -> Result<Vec<RecordMetadata>, RecordError> {
    if !record_dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();

    for entry in fs::read_dir(record_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        // Skip temp files
        if filename.starts_with('.') {
            continue;
        }

        if let Some((tick, timestamp)) = parse_record_filename(&filename) {
            let file_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            records.push(RecordMetadata {
                path: path.clone(),
                tick,
                timestamp,
                file_size,
            });
        }
    }

    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.tick.cmp(&a.tick)));

    Ok(records)
}

/// Delete all but the `max_records` newest records. Returns the deleted paths.
pub fn prune_records(record_dir: &Path, max_records: usize) -> Result<Vec<PathBuf>, RecordError> {
    let records = list_records(record_dir)?;

    let mut deleted = Vec::new();
    if records.len() > max_records {
        for record in &records[max_records..] {
            fs::remove_file(&record.path)?;
            deleted.push(record.path.clone());
        }
    }

    Ok(deleted)
}

/// Load the newest record that passes validation, skipping corrupt ones.
pub fn load_latest_valid_record(record_dir: &Path) -> Result<RunRecord, RecordError> {
    for meta in list_records(record_dir)? {
        match load_record(&meta.path) {
            Ok(record) => return Ok(record),
            Err(e) => {
                warn!(
                    path = %meta.path.display(),
                    error = %e,
                    "Corrupt record, trying next"
                );
            }
        }
    }
    Err(RecordError::NoValidRecords)
}

/// Rebuild the simulation a record describes by replaying it from its seed.
pub fn replay(record: &RunRecord) -> Result<Simulation, RecordError> {
    let settings = Settings {
        seed: record.seed,
        ..record.settings.clone()
    };
    let mut sim = Simulation::new(settings)
        .map_err(|e| RecordError::Deserialize(format!("record settings rejected: {}", e)))?;
    for _ in 0..record.tick {
        sim.step();
    }

    let actual = sim.registry().counts();
    if actual != record.per_kind {
        return Err(RecordError::Diverged {
            tick: record.tick,
            expected: record.per_kind,
            actual,
        });
    }
    info!(
        run_id = %record.run_id,
        seed = record.seed,
        tick = record.tick,
        total = record.total,
        "Replayed run record"
    );
    Ok(sim)
}
