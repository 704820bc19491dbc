// mrcbf_sim/src/simulation/mod.rs

pub mod config;
pub mod error;
pub mod presets;
pub mod runner;
pub mod telemetry;
