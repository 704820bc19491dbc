// mrcbf_core/src/control/mod.rs

pub mod barrier;
pub mod multirate;
pub mod pd;
pub mod planner;
pub mod riccati;
pub mod safety_filter;
pub mod telemetry;

use crate::error::ControlError;
use crate::types::{Control, State};
use telemetry::DebugLog;

// --- CONTROLLER TRAIT ---
// Anything the simulation loop can query for an input. `u = k(x, t)`
/// A feedback law invoked by the simulation loop once per internal step.
///
/// Implementations keep their own schedule: a call between two of their
/// update instants returns the previously computed input unchanged.
pub trait Controller {
    /// Returns the input to hold from time `t` until the next call.
    fn compute_input(&mut self, state: &State, t: f64) -> Result<Control, ControlError>;

    /// Telemetry recorded so far, one entry per update.
    fn debug_log(&self) -> &DebugLog;

    /// The update period, if the controller runs on a fixed schedule.
    /// The simulation loop refuses internal steps longer than this.
    fn control_period(&self) -> Option<f64> {
        None
    }
}
