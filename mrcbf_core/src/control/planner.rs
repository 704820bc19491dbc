// mrcbf_core/src/control/planner.rs

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::control::riccati::{discretize, solve_dare, DiscreteModel};
use crate::error::{require_positive, ConfigError, ControlError};
use crate::frames::layout::EULER;
use crate::models::dynamics::quadrotor::RigidBodyModel;
use crate::types::{Control, ReferenceFn, State, CONTROL_DIM, STATE_DIM};
use crate::utils::wrap_to_pi;

/// Stage weights of the tracking cost `e'Qe + du'R du`.
#[derive(Debug, Clone, PartialEq)]
pub struct MpcWeights {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
}

impl MpcWeights {
    /// `q` must be 12x12 symmetric positive semidefinite, `r` 4x4 symmetric positive definite.
    pub fn new(q: DMatrix<f64>, r: DMatrix<f64>) -> Result<Self, ConfigError> {
        require_shape("mpc_Q", &q, STATE_DIM)?;
        require_symmetric("mpc_Q", &q)?;
        require_semidefinite("mpc_Q", &q)?;

        require_shape("mpc_R", &r, CONTROL_DIM)?;
        require_symmetric("mpc_R", &r)?;
        if r.clone().cholesky().is_none() {
            return Err(ConfigError::NotPositiveDefinite("mpc_R"));
        }

        Ok(Self { q, r })
    }

    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }
}

/// Where the terminal weight comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalCost {
    /// A user-supplied 12x12 symmetric positive semidefinite matrix.
    Fixed(DMatrix<f64>),
    /// The stabilizing DARE solution at the end of the first horizon.
    Dare,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    pub slow_rate: f64,
    /// Number of planned inputs (`mpc_T`).
    pub horizon: usize,
    pub weights: MpcWeights,
    pub terminal: TerminalCost,
}

/// Output of one planning solve.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanPacket {
    /// `horizon` inputs, one per slow period.
    pub inputs: Vec<Control>,
    /// `horizon + 1` predicted states, starting at the measured state.
    pub states: Vec<State>,
    /// `horizon + 1` reference samples the plan tracks.
    pub references: Vec<State>,
    pub issued_at: f64,
    pub sequence: u64,
}

impl PlanPacket {
    pub fn horizon(&self) -> usize {
        self.inputs.len()
    }

    /// Planned input for `step`, holding the last one past the horizon.
    pub fn input(&self, step: usize) -> &Control {
        &self.inputs[step.min(self.inputs.len() - 1)]
    }

    pub fn reference(&self, step: usize) -> &State {
        &self.references[step.min(self.references.len() - 1)]
    }
}

/// Finite-horizon linear-quadratic tracking planner.
///
/// Linearizes the rigid-body model about the hover input at each reference
/// sample, discretizes with a zero-order hold at the slow period, and solves
/// the affine LQ problem on the tracking error by a backward Riccati sweep.
pub struct HorizonPlanner {
    model: RigidBodyModel,
    reference: ReferenceFn,
    dt: f64,
    horizon: usize,
    weights: MpcWeights,
    terminal: DMatrix<f64>,
    hover: Control,
    issued: u64,
}

impl fmt::Debug for HorizonPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HorizonPlanner")
            .field("dt", &self.dt)
            .field("horizon", &self.horizon)
            .field("weights", &self.weights)
            .field("terminal", &self.terminal)
            .field("issued", &self.issued)
            .finish_non_exhaustive()
    }
}

impl HorizonPlanner {
    pub fn new(
        model: RigidBodyModel,
        reference: ReferenceFn,
        settings: PlannerSettings,
    ) -> Result<Self, ControlError> {
        let dt = 1.0 / require_positive("slow_rate", settings.slow_rate)?;
        let horizon = settings.horizon;
        if horizon == 0 {
            return Err(ConfigError::invalid("mpc_T", "horizon must contain at least one step").into());
        }

        let hover = model.hover_input();
        let terminal = match settings.terminal {
            TerminalCost::Fixed(p) => {
                require_shape("mpc_P", &p, STATE_DIM)?;
                require_symmetric("mpc_P", &p)?;
                require_semidefinite("mpc_P", &p)?;
                p
            }
            TerminalCost::Dare => {
                let x_end = sample_reference(&reference, horizon as f64 * dt)?;
                let (a, b) = model.linearize(&x_end, &hover);
                let stage = discretize(&a, &b, &DVector::zeros(STATE_DIM), dt);
                let p = solve_dare(&stage.a, &stage.b, settings.weights.q(), settings.weights.r())?;
                log::info!("Terminal cost from DARE at t={:.3}", horizon as f64 * dt);
                p
            }
        };

        Ok(Self {
            model,
            reference,
            dt,
            horizon,
            weights: settings.weights,
            terminal,
            hover,
            issued: 0,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Spacing of the plan steps (the slow period).
    pub fn step_period(&self) -> f64 {
        self.dt
    }

    pub fn terminal_cost(&self) -> &DMatrix<f64> {
        &self.terminal
    }

    pub fn reference(&self) -> &ReferenceFn {
        &self.reference
    }

    /// Plans from the measured state `x` at time `t`.
    pub fn plan(&mut self, x: &State, t: f64) -> Result<PlanPacket, ControlError> {
        let horizon = self.horizon;

        // 1. Sample the reference at the slow period.
        let references: Vec<State> = (0..=horizon)
            .map(|k| sample_reference(&self.reference, t + k as f64 * self.dt))
            .collect::<Result<_, _>>()?;

        // 2. Affine error dynamics e_{k+1} = A e_k + B du_k + c_k about each sample.
        let stages: Vec<DiscreteModel> = (0..horizon)
            .map(|k| {
                let x_ref = &references[k];
                let (a, b) = self.model.linearize(x_ref, &self.hover);
                let drift = self.model.derivative(x_ref, &self.hover);
                let mut stage = discretize(&a, &b, &drift, self.dt);
                stage.c += tracking_error(x_ref, &references[k + 1]);
                stage
            })
            .collect();

        // 3. Backward Riccati sweep for the feedback and feedforward terms.
        let mut cost_to_go = self.terminal.clone();
        let mut cost_linear = DVector::zeros(STATE_DIM);
        let mut policy = Vec::with_capacity(horizon);
        for stage in stages.iter().rev() {
            let DiscreteModel { a, b, c } = stage;
            let bt_s = b.tr_mul(&cost_to_go);
            let chol = (self.weights.r() + &bt_s * b).cholesky().ok_or_else(|| {
                ControlError::NumericalDegeneracy("R + B'SB lost positive definiteness".to_string())
            })?;

            let feedback = chol.solve(&(&bt_s * a));
            let propagated = &cost_to_go * c + &cost_linear;
            let feedforward = chol.solve(&b.tr_mul(&propagated));

            let closed_loop = a - b * &feedback;
            cost_linear = closed_loop.tr_mul(&propagated);
            let next = self.weights.q() + a.tr_mul(&cost_to_go) * &closed_loop;
            cost_to_go = (&next + next.transpose()) * 0.5;

            policy.push((feedback, feedforward));
        }
        policy.reverse();

        // 4. Roll the policy forward from the measured error.
        let mut error = tracking_error(x, &references[0]);
        let mut inputs = Vec::with_capacity(horizon);
        let mut states = Vec::with_capacity(horizon + 1);
        states.push(x.clone());
        for (k, (stage, (feedback, feedforward))) in stages.iter().zip(&policy).enumerate() {
            let du = -(feedback * &error) - feedforward;
            error = &stage.a * &error + &stage.b * &du + &stage.c;
            inputs.push(&self.hover + &du);
            states.push(&references[k + 1] + &error);
        }

        if inputs.iter().flatten().any(|u| !u.is_finite()) {
            return Err(ControlError::NumericalDegeneracy(format!(
                "plan at t={t:.3} contains non-finite inputs"
            )));
        }

        let sequence = self.issued;
        self.issued += 1;
        log::debug!("Plan #{sequence} issued at t={t:.3}");

        Ok(PlanPacket {
            inputs,
            states,
            references,
            issued_at: t,
            sequence,
        })
    }
}

/// `x - x_ref` with the Euler angle components wrapped.
fn sample_reference(reference: &ReferenceFn, t: f64) -> Result<State, ConfigError> {
    let x_ref = reference(t);
    if x_ref.len() != STATE_DIM {
        return Err(ConfigError::DimensionMismatch {
            name: "reference",
            expected: STATE_DIM,
            got: x_ref.len(),
        });
    }
    Ok(x_ref)
}

fn tracking_error(x: &State, x_ref: &State) -> DVector<f64> {
    let mut error = x - x_ref;
    for i in EULER..EULER + 3 {
        error[i] = wrap_to_pi(error[i]);
    }
    error
}

fn require_shape(name: &'static str, m: &DMatrix<f64>, dim: usize) -> Result<(), ConfigError> {
    if m.shape() == (dim, dim) {
        Ok(())
    } else {
        Err(ConfigError::MatrixShape {
            name,
            rows: m.nrows(),
            cols: m.ncols(),
            expected_rows: dim,
            expected_cols: dim,
        })
    }
}

fn require_symmetric(name: &'static str, m: &DMatrix<f64>) -> Result<(), ConfigError> {
    let tolerance = 1e-9 * (1.0 + m.amax());
    if m.iter().all(|v| v.is_finite()) && (m - m.transpose()).amax() <= tolerance {
        Ok(())
    } else {
        Err(ConfigError::NotSymmetric(name))
    }
}

fn require_semidefinite(name: &'static str, m: &DMatrix<f64>) -> Result<(), ConfigError> {
    let tolerance = 1e-9 * (1.0 + m.amax());
    if m.clone().symmetric_eigenvalues().min() >= -tolerance {
        Ok(())
    } else {
        Err(ConfigError::NotPositiveDefinite(name))
    }
}
