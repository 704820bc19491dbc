// mrcbf_core/src/simulation/mod.rs

use nalgebra::Vector3;

use crate::control::telemetry::DebugLog;
use crate::control::Controller;
use crate::error::{require_positive, ConfigError, SimulationError};
use crate::frames::layout::POS;
use crate::models::dynamics::quadrotor::RigidBodyModel;
use crate::types::{Control, DisturbanceFn, State, STATE_DIM};
use crate::utils::integrators::IntegratorKind;

/// Two instants closer than this are the same instant.
const TIME_EPS: f64 = 1e-9;

/// Axis-aligned box the vehicle is expected to stay in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialBounds {
    min: Vector3<f64>,
    max: Vector3<f64>,
}

impl SpatialBounds {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Result<Self, ConfigError> {
        if min.iter().chain(max.iter()).any(|v| !v.is_finite())
            || min.iter().zip(max.iter()).any(|(lo, hi)| lo >= hi)
        {
            return Err(ConfigError::invalid(
                "bounds",
                format!("min {min:?} must be finite and strictly below max {max:?}"),
            ));
        }
        Ok(Self { min, max })
    }

    /// A cube `[-half_width, half_width]^3`.
    pub fn symmetric(half_width: f64) -> Result<Self, ConfigError> {
        let half_width = require_positive("bounds.half_width", half_width)?;
        Self::new(Vector3::repeat(-half_width), Vector3::repeat(half_width))
    }

    pub fn contains(&self, position: &Vector3<f64>) -> bool {
        position
            .iter()
            .zip(self.min.iter().zip(self.max.iter()))
            .all(|(p, (lo, hi))| (*lo..=*hi).contains(p))
    }
}

/// Sampled trajectory and the controller telemetry of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Equal to the requested query times.
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub log: DebugLog,
}

impl SimulationResult {
    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }
}

/// Fixed-step closed-loop integration of the rigid-body model.
///
/// Internal steps lie on the grid `t0 + k * dt`, where `t0` is the first query
/// time. A step that would pass a query time is cut short to land on it, and
/// the remainder of the grid step is taken afterwards. The controller is
/// called at the start of every step and its input is held over the step.
#[derive(Debug, Clone)]
pub struct SimulationLoop {
    model: RigidBodyModel,
    dt: f64,
    integrator: IntegratorKind,
    bounds: Option<SpatialBounds>,
}

impl SimulationLoop {
    pub fn new(model: RigidBodyModel, dt: f64, integrator: IntegratorKind) -> Result<Self, ConfigError> {
        require_positive("sim_dt", dt)?;
        Ok(Self {
            model,
            dt,
            integrator,
            bounds: None,
        })
    }

    pub fn with_bounds(mut self, bounds: SpatialBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn integrator(&self) -> IntegratorKind {
        self.integrator
    }

    pub fn simulate(
        &self,
        controller: &mut dyn Controller,
        initial_state: &State,
        query_times: &[f64],
        disturbance: Option<&DisturbanceFn>,
    ) -> Result<SimulationResult, SimulationError> {
        self.validate(controller, initial_state, query_times)?;

        let t0 = query_times[0];
        let mut t = t0;
        let mut grid_index: u64 = 0;
        let mut x = initial_state.clone();
        let mut left_bounds = false;

        let mut states = Vec::with_capacity(query_times.len());
        states.push(x.clone());

        log::info!(
            "Simulating {:.3}s with dt={} ({:?}), {} query times",
            query_times[query_times.len() - 1] - t0,
            self.dt,
            self.integrator,
            query_times.len()
        );

        for &t_query in &query_times[1..] {
            while t < t_query - TIME_EPS {
                let next_grid = t0 + (grid_index + 1) as f64 * self.dt;
                let on_grid = next_grid <= t_query + TIME_EPS;
                let t_next = if on_grid { next_grid } else { t_query };

                let u = controller
                    .compute_input(&x, t)
                    .map_err(|source| SimulationError::Controller { time: t, source })?;
                x = self.step(&x, &u, t, t_next, disturbance)?;

                if x.iter().any(|v| !v.is_finite()) {
                    log::error!("State diverged at t={t_next:.3}");
                    return Err(SimulationError::Diverged { time: t_next });
                }
                if let Some(bounds) = &self.bounds {
                    let position: Vector3<f64> = x.fixed_rows::<3>(POS).into();
                    if !left_bounds && !bounds.contains(&position) {
                        log::warn!(
                            "Vehicle left the spatial bounds at t={t_next:.3}: p = [{:.3}, {:.3}, {:.3}]",
                            position.x,
                            position.y,
                            position.z
                        );
                        left_bounds = true;
                    }
                }

                if on_grid {
                    grid_index += 1;
                }
                t = t_next;
            }
            states.push(x.clone());
        }

        log::info!(
            "Simulation finished: {} controller updates logged",
            controller.debug_log().len()
        );

        Ok(SimulationResult {
            times: query_times.to_vec(),
            states,
            log: controller.debug_log().clone(),
        })
    }

    /// One integrator step with the input held and the disturbance added to the derivative.
    fn step(
        &self,
        x: &State,
        u: &Control,
        t: f64,
        t_next: f64,
        disturbance: Option<&DisturbanceFn>,
    ) -> Result<State, ConfigError> {
        if let Some(extra) = disturbance {
            let got = extra(x, t).len();
            if got != STATE_DIM {
                return Err(ConfigError::DimensionMismatch {
                    name: "disturbance",
                    expected: STATE_DIM,
                    got,
                });
            }
        }

        let derivative = |xx: &State, tt: f64| -> State {
            let x_dot = self.model.derivative(xx, u);
            match disturbance {
                Some(extra) => x_dot + extra(xx, tt),
                None => x_dot,
            }
        };
        Ok(self.integrator.integrator().step(&derivative, x, t, t_next))
    }

    fn validate(
        &self,
        controller: &dyn Controller,
        initial_state: &State,
        query_times: &[f64],
    ) -> Result<(), ConfigError> {
        if let Some(period) = controller.control_period() {
            if self.dt > period * (1.0 + TIME_EPS) {
                return Err(ConfigError::invalid(
                    "sim_dt",
                    format!("{} exceeds the controller period {}", self.dt, period),
                ));
            }
        }

        if initial_state.len() != STATE_DIM {
            return Err(ConfigError::DimensionMismatch {
                name: "initial_state",
                expected: STATE_DIM,
                got: initial_state.len(),
            });
        }

        if query_times.is_empty() {
            return Err(ConfigError::invalid("query_times", "at least one time is required"));
        }
        if query_times.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::invalid("query_times", "times must be finite"));
        }
        if query_times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::invalid("query_times", "times must be strictly increasing"));
        }
        Ok(())
    }
}

/// `count` evenly spaced times from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + i as f64 * step).collect()
        }
    }
}
