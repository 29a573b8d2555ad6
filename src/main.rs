use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use orcsim::cli::commands::{self, InspectView};
use orcsim::config::SimulationConfig;
use orcsim::world::Coord;

#[derive(Parser)]
#[command(name = "orcsim")]
#[command(about = "A seeded grid simulation of three orc races competing for land")]
#[command(version)]
struct Cli {
    /// Path to the runtime configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Path to the simulation settings file
    #[arg(short, long, default_value = "settings.toml")]
    settings: String,

    /// Override the seed from the settings file
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a world and print its field and starting population
    Generate,

    /// Run the simulation headless until Ctrl-C
    Run {
        /// Continue from a run record instead of starting fresh
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Replay a run record and inspect it
    Inspect {
        /// Record file (defaults to the newest valid record)
        #[arg(short, long)]
        record: Option<String>,

        /// Cell to inspect, as X,Y
        #[arg(long, value_parser = commands::parse_coord)]
        cell: Option<Coord>,

        /// Print the population summary
        #[arg(long)]
        population: bool,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage run records
    Records {
        #[command(subcommand)]
        action: RecordAction,
    },
}

#[derive(Subcommand)]
enum RecordAction {
    /// List available run records
    List {
        /// Record directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<String>,
    },

    /// Replay a run record and print its population
    Replay {
        /// Path to the record file
        file: String,
    },
}

fn init_tracing(config: &SimulationConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if config.log_format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn exit_with(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SimulationConfig::from_file_or_default(Path::new(&cli.config)) {
        Ok(c) => c,
        Err(e) => exit_with("Error loading config", e),
    };
    init_tracing(&config);

    let load_settings = || match commands::load_settings(Path::new(&cli.settings), cli.seed) {
        Ok(s) => s,
        Err(e) => exit_with("Error loading settings", e),
    };

    match cli.command {
        Commands::Generate => {
            if let Err(e) = commands::generate(load_settings()) {
                exit_with("Error", e);
            }
        }

        Commands::Run { resume } => {
            let settings = load_settings();
            let resume = resume.as_deref().map(Path::new);
            if let Err(e) = commands::run_simulation(&config, settings, resume).await {
                exit_with("Simulation error", e);
            }
        }

        Commands::Inspect {
            record,
            cell,
            population,
            json,
        } => {
            let view = match (cell, population, json) {
                (Some(coord), _, _) => InspectView::Cell(coord),
                (None, _, true) => InspectView::Json,
                (None, true, false) => InspectView::Population,
                (None, false, false) => {
                    exit_with("Error", "Specify --cell X,Y, --population or --json")
                }
            };
            if let Err(e) = commands::inspect(&config, record.as_deref().map(Path::new), view) {
                exit_with("Error", e);
            }
        }

        Commands::Records { action } => match action {
            RecordAction::List { dir } => {
                let dir = dir.unwrap_or_else(|| config.record_directory.clone());
                if let Err(e) = commands::list_records(Path::new(&dir)) {
                    exit_with("Error", e);
                }
            }
            RecordAction::Replay { file } => {
                if let Err(e) = commands::replay_record(Path::new(&file)) {
                    exit_with("Error", e);
                }
            }
        },
    }
}
