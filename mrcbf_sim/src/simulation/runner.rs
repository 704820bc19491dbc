// mrcbf_sim/src/simulation/runner.rs

use std::fmt;
use std::sync::Arc;

use nalgebra::Vector3;

use mrcbf_core::control::multirate::{MultirateController, MultirateSettings};
use mrcbf_core::control::pd::PdController;
use mrcbf_core::frames::layout::{EULER, POS};
use mrcbf_core::frames::StateVariable;
use mrcbf_core::models::dynamics::quadrotor::RigidBodyModel;
use mrcbf_core::models::dynamics::Dynamics;
use mrcbf_core::models::vehicle::VehicleParameters;
use mrcbf_core::obstacles::ObstacleSet;
use mrcbf_core::simulation::{SimulationLoop, SimulationResult};
use mrcbf_core::types::State;

use crate::simulation::config::{ControllerKind, ScenarioConfig};
use crate::simulation::error::RunError;

/// Headline numbers of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub controller: ControllerKind,
    pub duration: f64,
    pub samples: usize,
    pub updates: usize,
    pub final_state: State,
    /// Smallest obstacle clearance seen at any sample or controller update.
    pub min_clearance: Option<f64>,
    pub plans_issued: Option<u64>,
    pub fast_ticks: Option<u64>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.final_state.fixed_rows::<3>(POS);
        let euler = self.final_state.fixed_rows::<3>(EULER);
        writeln!(f, "Controller:      {}", self.controller.as_str())?;
        writeln!(
            f,
            "Simulated:       {:.3} s ({} samples, {} controller updates)",
            self.duration, self.samples, self.updates
        )?;
        writeln!(f, "Final position:  [{:.4}, {:.4}, {:.4}]", p[0], p[1], p[2])?;
        writeln!(
            f,
            "Final attitude:  [{:.4}, {:.4}, {:.4}]",
            euler[0], euler[1], euler[2]
        )?;
        match self.min_clearance {
            Some(d) => writeln!(f, "Min clearance:   {d:.4} m")?,
            None => writeln!(f, "Min clearance:   n/a (no obstacles)")?,
        }
        if let Some(plans) = self.plans_issued {
            writeln!(f, "Plans issued:    {plans}")?;
        }
        if let Some(ticks) = self.fast_ticks {
            write!(f, "Fast ticks:      {ticks}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: SimulationResult,
    pub summary: RunSummary,
    /// Meaning of each state entry, for labelling telemetry.
    pub state_layout: Vec<StateVariable>,
}

/// Builds the model, obstacles and controller a scenario describes and simulates it.
pub fn run_scenario(config: &ScenarioConfig) -> Result<RunOutput, RunError> {
    // --- 1. Shared, read-only pieces ---
    let params = Arc::new(VehicleParameters::try_from(&config.vehicle)?);
    let model = RigidBodyModel::new(params);
    let state_layout = model.get_state_layout();
    let obstacles = config.obstacles.build()?;

    // --- 2. The simulation loop ---
    let settings = &config.simulation;
    let initial_state = settings.initial_state()?;
    let query_times = settings.query_times.times()?;
    let mut sim = SimulationLoop::new(model.clone(), settings.dt, settings.integrator)?;
    if let Some(bounds) = settings.bounds()? {
        sim = sim.with_bounds(bounds);
    }
    let disturbance = config.disturbance.build();

    // --- 3. The controller under test ---
    let (result, plans_issued, fast_ticks) = match config.controller {
        ControllerKind::Multirate => {
            let mut controller = MultirateController::new(
                model,
                Arc::clone(&obstacles),
                config.multirate.reference.state_reference(),
                MultirateSettings::try_from(&config.multirate)?,
            )?;
            let result =
                sim.simulate(&mut controller, &initial_state, &query_times, disturbance.as_ref())?;
            (
                result,
                Some(controller.plans_issued()),
                Some(controller.fast_ticks()),
            )
        }
        ControllerKind::Pd => {
            let mut controller =
                PdController::new(model, config.pd.reference.pose_reference(), (&config.pd).into())?;
            let result =
                sim.simulate(&mut controller, &initial_state, &query_times, disturbance.as_ref())?;
            (result, None, None)
        }
    };

    let summary = RunSummary {
        controller: config.controller,
        duration: query_times[query_times.len() - 1] - query_times[0],
        samples: result.states.len(),
        updates: result.log.len(),
        final_state: result
            .final_state()
            .cloned()
            .unwrap_or_else(|| initial_state.clone()),
        min_clearance: min_clearance(&obstacles, &result),
        plans_issued,
        fast_ticks,
    };

    Ok(RunOutput {
        result,
        summary,
        state_layout,
    })
}

fn min_clearance(obstacles: &ObstacleSet, result: &SimulationResult) -> Option<f64> {
    result
        .states
        .iter()
        .chain(result.log.entries().iter().map(|e| &e.true_state))
        .filter_map(|x| {
            let position: Vector3<f64> = x.fixed_rows::<3>(POS).into();
            obstacles.min_clearance(&position).map(|q| q.distance)
        })
        .min_by(f64::total_cmp)
}
