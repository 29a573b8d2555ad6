use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Settings, SimulationConfig};
use crate::persistence::{self, RunRecord};
use crate::population::Kind;
use crate::simulation::{Simulation, TickSummary};
use crate::world::Coord;
use crate::world::field::print_field_summary;

/// Load engine settings from `path` if it exists, otherwise use the defaults,
/// then apply an optional seed override.
pub fn load_settings(path: &Path, seed: Option<u64>) -> Result<Settings, String> {
    let mut settings = if path.exists() {
        Settings::from_file(path)?
    } else {
        Settings::default()
    };
    if let Some(seed) = seed {
        settings.seed = seed;
    }
    settings.validate()?;
    Ok(settings)
}

/// Parse a cell address written as `X,Y`.
pub fn parse_coord(s: &str) -> Result<Coord, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad x in '{}': {}", s, e))?;
    let y = y
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad y in '{}': {}", s, e))?;
    Ok(Coord::new(x, y))
}

/// Run the simulation headless, paced by `tick_rate`, until Ctrl-C, extinction
/// or `max_ticks`. Saves a run record every `record_interval` ticks and on exit.
pub async fn run_simulation(
    config: &SimulationConfig,
    settings: Settings,
    resume: Option<&Path>,
) -> Result<(), String> {
    let record_dir = Path::new(&config.record_directory);

    let mut sim = match resume {
        Some(path) => {
            let record = persistence::load_record(path)
                .map_err(|e| format!("Failed to load record: {}", e))?;
            persistence::replay(&record).map_err(|e| format!("Failed to replay record: {}", e))?
        }
        None => Simulation::new(settings).map_err(|e| e.to_string())?,
    };

    let run_id = Uuid::new_v4();
    let tick_interval = Duration::from_secs_f32(1.0 / sim.settings().tick_rate);
    let summary_interval = config.summary_interval.max(1) as u64;
    let mut ticks_since_record: u32 = 0;

    info!(
        %run_id,
        seed = sim.seed(),
        tick = sim.tick(),
        tick_rate = sim.settings().tick_rate,
        record_interval = config.record_interval,
        "Simulation running"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let tick_start = Instant::now();
        let summary = sim.step();

        ticks_since_record += 1;
        if ticks_since_record >= config.record_interval {
            save_checkpoint(&sim, run_id, record_dir, config.max_records as usize);
            ticks_since_record = 0;
        }

        if summary.tick % summary_interval == 0 {
            log_summary(&summary);
        }

        if summary.is_extinct() {
            warn!(tick = summary.tick, "No orcs left, stopping");
            break;
        }
        if config.max_ticks > 0 && summary.tick >= config.max_ticks {
            info!(tick = summary.tick, "Reached max_ticks");
            break;
        }

        let remaining = tick_interval.saturating_sub(tick_start.elapsed());
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    save_checkpoint(&sim, run_id, record_dir, config.max_records as usize);
    info!(tick = sim.tick(), seed = sim.seed(), "Simulation stopped");
    Ok(())
}

fn save_checkpoint(sim: &Simulation, run_id: Uuid, record_dir: &Path, max_records: usize) {
    let record = RunRecord::capture(sim, run_id);
    match persistence::save_record(&record, record_dir) {
        Ok(path) => {
            info!(path = %path.display(), tick = record.tick, "Run record saved");
            if let Err(e) = persistence::prune_records(record_dir, max_records) {
                warn!(error = %e, "Record pruning failed");
            }
        }
        Err(e) => warn!(error = %e, "Run record save failed"),
    }
}

fn log_summary(summary: &TickSummary) {
    info!(
        tick = summary.tick,
        total = summary.total,
        brutes = summary.count(Kind::Brute),
        stalkers = summary.count(Kind::Stalker),
        wardens = summary.count(Kind::Warden),
        infected = summary.infected,
        mean_energy = summary.mean_energy,
        diversity = summary.diversity_index,
        "Population"
    );
}

/// Generate a world and print the field and starting population.
pub fn generate(settings: Settings) -> Result<(), String> {
    let sim = Simulation::new(settings).map_err(|e| e.to_string())?;
    println!("Seed: {}", sim.seed());
    print_field_summary(sim.field());
    println!();
    print_population_summary(&sim.summary());
    Ok(())
}

/// What `inspect` should print about a replayed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectView {
    Cell(Coord),
    Population,
    Json,
}

/// Replay a record (the given file, or the newest valid one in the record
/// directory) and print one view of it.
pub fn inspect(
    config: &SimulationConfig,
    record_path: Option<&Path>,
    view: InspectView,
) -> Result<(), String> {
    let record = match record_path {
        Some(path) => persistence::load_record(path),
        None => persistence::load_latest_valid_record(Path::new(&config.record_directory)),
    }
    .map_err(|e| format!("Failed to load record: {}", e))?;
    let sim = persistence::replay(&record).map_err(|e| format!("Failed to replay record: {}", e))?;

    match view {
        InspectView::Cell(coord) => print!("{}", describe_cell(&sim, coord)?),
        InspectView::Population => print_population_summary(&sim.summary()),
        InspectView::Json => {
            let json = serde_json::to_string_pretty(&sim.snapshot())
                .map_err(|e| format!("Failed to encode snapshot: {}", e))?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Human-readable report of one cell and its occupant.
pub fn describe_cell(sim: &Simulation, coord: Coord) -> Result<String, String> {
    let field = sim.field();
    if !field.dims().contains(coord) {
        return Err(format!(
            "Cell ({}, {}) is outside the {}x{} grid",
            coord.x,
            coord.y,
            field.width(),
            field.height()
        ));
    }
    let cell = field.cell(coord);
    let mut out = format!("=== Cell ({}, {}) at tick {} ===\n", coord.x, coord.y, sim.tick());
    out.push_str(&format!("Biome:     {:?}\n", cell.biome));
    out.push_str(&format!("Humidity:  {:.3}\n", cell.humidity));
    out.push_str(&format!("Fertility: {:.3}\n", cell.fertility));
    match sim.registry().orc_at(coord) {
        Some(orc) => {
            out.push_str(&format!("\n--- Orc {} ---\n", orc.id.0));
            out.push_str(&format!("  Race:       {:?} ({:?})\n", orc.kind, orc.kind.affinity(cell.biome)));
            out.push_str(&format!("  Energy:     {:.2}\n", orc.energy));
            out.push_str(&format!("  Age:        {}\n", orc.age));
            out.push_str(&format!("  Strength:   {:.3}\n", orc.traits.strength));
            out.push_str(&format!("  Agility:    {:.3}\n", orc.traits.agility));
            out.push_str(&format!("  Resilience: {:.3}\n", orc.traits.resilience));
            if orc.is_infected() {
                out.push_str(&format!("  Infected:   {} ticks left\n", orc.infection_ticks));
            }
        }
        None => out.push_str("\n(empty)\n"),
    }
    Ok(out)
}

pub fn print_population_summary(summary: &TickSummary) {
    println!("=== Population at tick {} ===", summary.tick);
    println!("Total: {}", summary.total);
    for kind in Kind::ALL {
        let count = summary.count(kind);
        let pct = if summary.total == 0 {
            0.0
        } else {
            count as f32 / summary.total as f32 * 100.0
        };
        println!("  {:<8} {:>5} ({:.1}%)", format!("{:?}", kind), count, pct);
    }
    println!("Infected:        {}", summary.infected);
    println!("Mean energy:     {:.2}", summary.mean_energy);
    println!(
        "Mean traits:     str {:.3} / agi {:.3} / res {:.3}",
        summary.mean_strength, summary.mean_agility, summary.mean_resilience
    );
    println!("Diversity index: {:.3}", summary.diversity_index);
}

/// Print the records in `record_dir`, newest first.
pub fn list_records(record_dir: &Path) -> Result<(), String> {
    let records =
        persistence::list_records(record_dir).map_err(|e| format!("Error listing records: {}", e))?;
    if records.is_empty() {
        println!("No run records found in {}", record_dir.display());
        return Ok(());
    }

    println!("{:<40} {:>8} {:>12}", "File", "Tick", "Size");
    println!("{}", "-".repeat(62));
    for r in &records {
        let name = r.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        println!("{:<40} {:>8} {:>10} B", name, r.tick, r.file_size);
    }
    println!("\n{} record(s) in {}", records.len(), record_dir.display());
    Ok(())
}

/// Replay one record file and print where the run stood.
pub fn replay_record(path: &Path) -> Result<(), String> {
    let record =
        persistence::load_record(path).map_err(|e| format!("Error loading record: {}", e))?;
    let sim = persistence::replay(&record).map_err(|e| format!("Error replaying record: {}", e))?;
    println!(
        "Replayed run {} (seed {}) from {}",
        record.run_id,
        record.seed,
        path.display()
    );
    print_population_summary(&sim.summary());
    Ok(())
}
