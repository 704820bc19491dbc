// mrcbf_sim/src/simulation/error.rs

use std::path::PathBuf;

use mrcbf_core::error::{ConfigError, ControlError, SimulationError};
use thiserror::Error;

/// Everything that can stop a scenario run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Scenario file not found: {}", .0.display())]
    MissingScenario(PathBuf),

    #[error("Failed to load scenario: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("Failed to write the telemetry log: {0}")]
    Csv(#[from] csv::Error),
}

impl From<figment::Error> for RunError {
    fn from(err: figment::Error) -> Self {
        RunError::Load(Box::new(err))
    }
}
