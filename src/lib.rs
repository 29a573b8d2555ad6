pub mod cli;
pub mod config;
pub mod persistence;
pub mod population;
pub mod simulation;
pub mod world;
