// mrcbf_sim/src/prelude.rs

// Re-export the entire mrcbf_core prelude so you can easily access
// pure types like `State`, `Controller`, `SimulationLoop`, etc.
pub use mrcbf_core::prelude::*;

// Re-export common simulation-specific types for easy access.
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{load_scenario, parse_scenario};
pub use crate::simulation::error::RunError;
pub use crate::simulation::presets::{DisturbancePreset, ReferencePreset};
pub use crate::simulation::runner::{run_scenario, RunOutput, RunSummary};
pub use crate::simulation::telemetry::write_log;
