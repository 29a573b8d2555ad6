pub mod settings;
pub mod simulation;

pub use settings::Settings;
pub use simulation::SimulationConfig;
