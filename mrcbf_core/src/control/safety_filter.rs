// mrcbf_core/src/control/safety_filter.rs

use std::sync::Arc;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT::NonnegativeConeT,
};
use nalgebra::DMatrix;

use crate::control::barrier::{
    Barrier, BarrierKind, BarrierRow, Bound, ClassK, EcbfGains, Linearization, RelativeDegree,
    SafetyMargins, TiltAxis,
};
use crate::error::ControlError;
use crate::models::dynamics::quadrotor::RigidBodyModel;
use crate::obstacles::ObstacleSet;
use crate::types::{Control, State};

/// Slack allowed when checking whether an input satisfies a row.
const FEASIBILITY_TOL: f64 = 1e-9;
/// Barrier values down to `-BOUNDARY_TOL` count as on the boundary, not outside it.
pub const BOUNDARY_TOL: f64 = 1e-6;
/// Unit-norm rows whose residual at the solution is below this are reported as active.
const ACTIVE_TOL: f64 = 1e-6;
/// Violation of a unit-norm row still accepted at a returned solution.
const SOLUTION_TOL: f64 = 1e-6;
/// Unit-norm rows slack by more than this (times `1 + |u_nom|`) sit out the first solve.
const FAR_SLACK: f64 = 1e3;
const MAX_SOLVER_ITERS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyFilterSettings {
    pub class_k: ClassK,
    pub gains: EcbfGains,
    pub margins: SafetyMargins,
}

/// What the filter did with a nominal input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub input: Control,
    /// Constraints that bind at the returned input. Empty when the nominal passed through.
    pub active: Vec<BarrierKind>,
    pub modified: bool,
}

/// Exponential control-barrier-function filter.
///
/// Returns the input closest to the nominal one (in the Euclidean sense) that
/// satisfies every obstacle, tilt and speed constraint row and keeps every
/// squared rotor speed non-negative.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    model: RigidBodyModel,
    obstacles: Arc<ObstacleSet>,
    settings: SafetyFilterSettings,
}

impl SafetyFilter {
    pub fn new(
        model: RigidBodyModel,
        obstacles: Arc<ObstacleSet>,
        settings: SafetyFilterSettings,
    ) -> Self {
        Self {
            model,
            obstacles,
            settings,
        }
    }

    pub fn settings(&self) -> &SafetyFilterSettings {
        &self.settings
    }

    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    /// Evaluates every barrier at `x`, in the order obstacles, tilt, speed.
    pub fn barriers(&self, x: &State) -> Result<Vec<Barrier>, ControlError> {
        let margins = &self.settings.margins;
        let mut barriers = Vec::with_capacity(self.obstacles.len() + 5);

        for (index, obstacle) in self.obstacles.iter().enumerate() {
            barriers.push(Barrier::obstacle(index, obstacle, x, margins.safe_dist())?);
        }
        for axis in [TiltAxis::Roll, TiltAxis::Pitch] {
            for bound in [Bound::Upper, Bound::Lower] {
                barriers.push(Barrier::tilt(axis, bound, x, margins.safe_rot()));
            }
        }
        barriers.push(Barrier::speed(x, margins.safe_vel()));

        Ok(barriers)
    }

    /// Checks that `x` is a state the filter can hold: every barrier is
    /// non-negative, and every relative-degree-2 barrier has
    /// `h_dot + p h >= 0` with `p` the faster ECBF pole. From outside that set
    /// `h` crosses zero whatever the input.
    pub fn check_recoverable(&self, x: &State) -> Result<(), ControlError> {
        let barriers = self.barriers(x)?;
        ensure_inside(&barriers)?;

        // h_dot of a relative-degree-2 barrier does not depend on the input.
        let drift = self.model.derivative(x, &self.model.hover_input());
        let pole = self.settings.gains.fast_pole();
        for barrier in barriers
            .iter()
            .filter(|b| b.relative_degree == RelativeDegree::Two)
        {
            let h_dot = barrier.rate(&drift);
            if h_dot + pole * barrier.value < -BOUNDARY_TOL {
                return Err(ControlError::InfeasibleSafetyConstraint(format!(
                    "{} cannot be held from this state (h = {:.3e}, h_dot = {:.3e}, pole {:.3})",
                    barrier.kind, barrier.value, h_dot, pole
                )));
            }
        }
        Ok(())
    }

    /// Builds one constraint row per barrier, linearizing the model at
    /// `(x, u_nom)`, followed by one `u_i >= 0` row per rotor.
    pub fn constraint_rows(&self, x: &State, u_nom: &Control) -> Result<Vec<BarrierRow>, ControlError> {
        let barriers = self.barriers(x)?;
        ensure_inside(&barriers)?;

        let (a, b) = self.model.linearize(x, u_nom);
        let lin = Linearization {
            drift: self.model.derivative(x, u_nom),
            a,
            b,
            nominal: u_nom.clone(),
        };

        let SafetyFilterSettings { class_k, gains, .. } = &self.settings;
        let n_u = u_nom.nrows();
        Ok(barriers
            .iter()
            .map(|barrier| barrier.constraint_row(&lin, class_k, gains))
            .chain((0..n_u).map(|rotor| BarrierRow::input_floor(rotor, n_u)))
            .collect())
    }

    /// Certifies `u_nom` or returns the minimally modified safe input.
    pub fn filter(&self, x: &State, u_nom: &Control) -> Result<FilterOutcome, ControlError> {
        // 1. Build the linear constraints in the input.
        let rows = self.constraint_rows(x, u_nom)?;

        // 2. The nominal input passes through untouched when it is already safe.
        if rows.iter().all(|row| row.is_satisfied_by(u_nom, FEASIBILITY_TOL)) {
            return Ok(FilterOutcome {
                input: u_nom.clone(),
                active: Vec::new(),
                modified: false,
            });
        }

        // 3. Rows the rotors cannot repair.
        for row in &rows {
            if row.lacks_authority(u_nom, FEASIBILITY_TOL) {
                return Err(ControlError::InfeasibleSafetyConstraint(format!(
                    "{} has no input authority at this state (requires {:.3e} more)",
                    row.kind,
                    -row.residual(u_nom)
                )));
            }
            if row.needs_negative_input(FEASIBILITY_TOL) {
                return Err(ControlError::InfeasibleSafetyConstraint(format!(
                    "{} can only be met with negative rotor thrust (requires 0 >= {:.3e})",
                    row.kind, row.bound
                )));
            }
        }

        // 4. Unit-norm rows. Rows without input dependence hold here, or step 3 failed.
        let rows: Vec<BarrierRow> = rows.iter().filter_map(BarrierRow::normalized).collect();

        // 5. Project the nominal input onto the safe half-spaces.
        let input = project(&rows, u_nom)?;
        let active: Vec<BarrierKind> = rows
            .iter()
            .filter(|row| row.residual(&input) <= ACTIVE_TOL)
            .map(|row| row.kind)
            .collect();

        log::debug!(
            "Safety filter modified input by {:.3e} ({} active)",
            (&input - u_nom).norm(),
            active.len()
        );

        Ok(FilterOutcome {
            input,
            active,
            modified: true,
        })
    }
}

fn ensure_inside(barriers: &[Barrier]) -> Result<(), ControlError> {
    match barriers.iter().find(|b| b.value < -BOUNDARY_TOL) {
        Some(outside) => Err(ControlError::InfeasibleSafetyConstraint(format!(
            "state already violates the {} (h = {:.3e})",
            outside.kind, outside.value
        ))),
        None => Ok(()),
    }
}

/// Solves with the rows near the nominal input first and falls back to the
/// full set if the answer breaks one of the rows left out.
fn project(rows: &[BarrierRow], u_nom: &Control) -> Result<Control, ControlError> {
    let reach = FAR_SLACK * (1.0 + u_nom.norm());
    let near: Vec<BarrierRow> = rows
        .iter()
        .filter(|row| row.residual(u_nom) <= reach)
        .cloned()
        .collect();
    if near.len() == rows.len() {
        return solve_projection(rows, u_nom);
    }

    let input = solve_projection(&near, u_nom)?;
    if satisfies_all(rows, &input) {
        Ok(input)
    } else {
        solve_projection(rows, u_nom)
    }
}

fn satisfies_all(rows: &[BarrierRow], u: &Control) -> bool {
    u.iter().all(|v| v.is_finite()) && rows.iter().all(|row| row.is_satisfied_by(u, SOLUTION_TOL))
}

/// `min 1/2 |u - u_nom|^2  s.t.  a_i^T u >= b_i`.
fn solve_projection(rows: &[BarrierRow], u_nom: &Control) -> Result<Control, ControlError> {
    let n_u = u_nom.nrows();
    let n_rows = rows.len();

    // Clarabel form: A z + s = b, s >= 0, so a^T u >= b becomes -a^T u + s = -b.
    let mut a_mat = DMatrix::zeros(n_rows, n_u);
    let mut b_vec = Vec::with_capacity(n_rows);
    for (i, row) in rows.iter().enumerate() {
        a_mat.row_mut(i).copy_from(&(-row.coefficients.transpose()));
        b_vec.push(-row.bound);
    }

    let p_csc = dmatrix_to_csc_upper_tri(&DMatrix::identity(n_u, n_u));
    let a_csc = dmatrix_to_csc(&a_mat);
    let q: Vec<f64> = u_nom.iter().map(|u| -u).collect();
    let cones = vec![NonnegativeConeT(n_rows)];

    let settings = DefaultSettingsBuilder::default()
        .max_iter(MAX_SOLVER_ITERS)
        .verbose(false)
        .build()
        .map_err(|e| ControlError::Solver(format!("invalid solver settings: {e:?}")))?;

    let mut solver = DefaultSolver::new(&p_csc, &q, &a_csc, &b_vec, &cones, settings)
        .map_err(|e| ControlError::Solver(format!("solver setup failed: {e:?}")))?;
    solver.solve();

    let solution = &solver.solution;
    let input = Control::from_column_slice(&solution.x);
    match &solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(input),
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Err(ControlError::InfeasibleSafetyConstraint(
                "barrier constraints admit no common non-negative input".to_string(),
            ))
        }
        status if satisfies_all(rows, &input) => {
            log::debug!("Safety QP stopped with status {status:?}; its iterate satisfies every row");
            Ok(input)
        }
        status => Err(ControlError::Solver(format!(
            "safety QP terminated with status {status:?}"
        ))),
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Upper triangle of a symmetric matrix, as Clarabel expects for the cost.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::layout::{EULER, OMEGA, VEL};
    use crate::models::dynamics::Dynamics;
    use crate::models::vehicle::VehicleParameters;
    use crate::obstacles::{Obstacle, SphereObstacle};
    use crate::types::STATE_DIM;
    use crate::utils::integrators::RK4;
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Vector3};

    fn unit_model() -> RigidBodyModel {
        let params =
            VehicleParameters::new(1.0, Vector3::new(1.0, 1.0, 1.0), 1.0, 1.0, 0.1, None).unwrap();
        RigidBodyModel::new(Arc::new(params))
    }

    fn settings(safe_dist: f64, safe_vel: f64, c1: f64, c2: f64) -> SafetyFilterSettings {
        SafetyFilterSettings {
            class_k: ClassK::Linear { gain: 1.0 },
            gains: EcbfGains::new(c1, c2).unwrap(),
            margins: SafetyMargins::new(safe_dist, 0.2, safe_vel).unwrap(),
        }
    }

    fn sphere_set(center: Vector3<f64>, radius: f64) -> Arc<ObstacleSet> {
        let sphere: Box<dyn Obstacle> = Box::new(SphereObstacle::new(center, radius).unwrap());
        Arc::new(ObstacleSet::new(vec![sphere]))
    }

    #[test]
    fn obstacle_free_slack_passes_nominal_through() {
        let model = unit_model();
        let hover = model.hover_input();
        let filter = SafetyFilter::new(
            model,
            Arc::new(ObstacleSet::empty()),
            settings(0.05, 5.0, 1.0, 2.0),
        );

        let mut drifting = DVector::zeros(STATE_DIM);
        drifting[0] = 3.0;
        drifting[VEL] = 0.3;
        drifting[VEL + 1] = -0.2;
        drifting[EULER + 2] = 1.0;

        for x in [DVector::zeros(STATE_DIM), drifting] {
            let outcome = filter.filter(&x, &hover).unwrap();
            assert!(!outcome.modified);
            assert!(outcome.active.is_empty());
            assert_eq!(outcome.input, hover);
        }
    }

    #[test]
    fn sphere_above_hover_leaves_input_unchanged() {
        let model = unit_model();
        let hover = model.hover_input();
        let filter = SafetyFilter::new(
            model,
            sphere_set(Vector3::new(0.0, 0.0, 0.3), 0.1),
            SafetyFilterSettings {
                class_k: ClassK::Linear { gain: 0.0001 },
                gains: EcbfGains::new(6.0, 5.0).unwrap(),
                margins: SafetyMargins::new(0.05, 0.2, 100.0).unwrap(),
            },
        );

        let outcome = filter.filter(&DVector::zeros(STATE_DIM), &hover).unwrap();
        assert!(!outcome.modified);
        assert_eq!(outcome.input, hover);
    }

    /// Hover-commanded climb into a sphere at (0, 0, 0.3), closing with filtered inputs.
    fn head_on_run(v0: f64) -> (f64, f64, bool) {
        let safe_dist = 0.05;
        let model = unit_model();
        let hover = model.hover_input();
        let obstacles = sphere_set(Vector3::new(0.0, 0.0, 0.3), 0.1);
        let filter = SafetyFilter::new(
            model.clone(),
            Arc::clone(&obstacles),
            settings(safe_dist, 100.0, 6.0, 5.0),
        );

        let mut x = DVector::zeros(STATE_DIM);
        x[VEL + 2] = v0;
        filter.check_recoverable(&x).unwrap();

        let dt = 0.01;
        let mut min_clearance = f64::INFINITY;
        let mut min_input = f64::INFINITY;
        let mut was_modified = false;
        for k in 0..300 {
            let outcome = filter.filter(&x, &hover).unwrap();
            was_modified |= outcome.modified;
            min_input = min_input.min(outcome.input.min());
            x = model.propagate(&x, &outcome.input, k as f64 * dt, dt, &RK4);

            let p = x.fixed_rows::<3>(0).into_owned();
            let clearance = obstacles.min_clearance(&p).unwrap().distance;
            min_clearance = min_clearance.min(clearance);
        }
        assert!(x[2] > 0.0, "vehicle was pushed back below the start for v0 = {v0}");
        (min_clearance, min_input, was_modified)
    }

    #[test]
    fn head_on_approach_keeps_clearance() {
        for v0 in [0.1, 0.2, 0.3] {
            let (min_clearance, min_input, was_modified) = head_on_run(v0);
            assert!(was_modified, "filter never engaged for v0 = {v0}");
            assert!(
                min_clearance >= 0.05 - 1e-6,
                "clearance {min_clearance} dropped below 0.05 for v0 = {v0}"
            );
            assert!(min_input >= -1e-6, "negative rotor input {min_input} for v0 = {v0}");
        }
    }

    #[test]
    fn approach_too_fast_to_stop_is_rejected_up_front() {
        let filter = SafetyFilter::new(
            unit_model(),
            sphere_set(Vector3::new(0.0, 0.0, 0.3), 0.1),
            settings(0.05, 100.0, 6.0, 5.0),
        );
        // h = 0.15 and the fast pole is 3, so closing faster than 0.45 m/s cannot be held.
        let mut x = DVector::zeros(STATE_DIM);
        x[VEL + 2] = 0.44;
        assert!(filter.check_recoverable(&x).is_ok());
        x[VEL + 2] = 1.0;
        let err = filter.check_recoverable(&x).unwrap_err();
        assert!(matches!(err, ControlError::InfeasibleSafetyConstraint(ref m) if m.contains("obstacle 0")));
    }

    #[test]
    fn boundary_round_off_is_not_a_violation() {
        let filter = SafetyFilter::new(
            unit_model(),
            sphere_set(Vector3::new(0.0, 0.0, 0.3), 0.1),
            settings(0.05, 100.0, 6.0, 5.0),
        );
        let mut x = DVector::zeros(STATE_DIM);
        x[2] = 0.15 + 1e-12;
        assert!(filter.check_recoverable(&x).is_ok());
        assert!(filter.constraint_rows(&x, &unit_model().hover_input()).is_ok());

        x[2] = 0.151;
        assert!(filter.check_recoverable(&x).is_err());
    }

    #[test]
    fn excessive_roll_torque_is_reduced() {
        let model = unit_model();
        let nominal = model.mix(9.81, &Vector3::new(0.4, 0.0, 0.0));
        assert!(nominal.min() > 0.0);
        let filter = SafetyFilter::new(
            model.clone(),
            Arc::new(ObstacleSet::empty()),
            settings(0.05, 5.0, 4.0, 4.0),
        );

        // Rolling towards the 0.2 rad bound: the upper row needs roll torque <= -0.2.
        let mut x = DVector::zeros(STATE_DIM);
        x[EULER] = 0.15;
        x[OMEGA] = 0.1;

        let rows = filter.constraint_rows(&x, &nominal).unwrap();
        assert!(rows.iter().any(|row| !row.is_satisfied_by(&nominal, 1e-9)));

        let outcome = filter.filter(&x, &nominal).unwrap();
        assert!(outcome.modified);
        assert!(outcome
            .active
            .contains(&BarrierKind::Tilt(TiltAxis::Roll, Bound::Upper)));

        let torque = model.body_torque(&outcome.input);
        assert!(torque.x < 0.4);
        // Collective thrust and the other axes are left alone.
        assert_relative_eq!(outcome.input.sum(), nominal.sum(), epsilon = 1e-6);
        assert_relative_eq!(torque.y, 0.0, epsilon = 1e-6);

        for row in &rows {
            assert!(row.is_satisfied_by(&outcome.input, 1e-6));
        }
    }

    #[test]
    fn pitch_stays_within_tilt_bound_in_closed_loop() {
        let model = unit_model();
        let nominal = model.mix(9.81, &Vector3::new(0.0, 0.3, 0.0));
        let filter = SafetyFilter::new(
            model.clone(),
            Arc::new(ObstacleSet::empty()),
            settings(0.05, 100.0, 6.0, 5.0),
        );

        let dt = 0.01;
        let mut x = DVector::zeros(STATE_DIM);
        let mut max_tilt = 0.0_f64;
        let mut was_modified = false;
        for k in 0..300 {
            let outcome = filter.filter(&x, &nominal).unwrap();
            was_modified |= outcome.modified;
            assert!(outcome.input.min() >= -1e-6);
            x = model.propagate(&x, &outcome.input, k as f64 * dt, dt, &RK4);
            max_tilt = max_tilt.max(x[EULER].abs()).max(x[EULER + 1].abs());
        }

        assert!(was_modified);
        assert!(max_tilt <= 0.2 + 1e-6, "tilt reached {max_tilt}");
        // The bound is approached, not undershot by a wide margin.
        assert!(x[EULER + 1] > 0.15);
    }

    #[test]
    fn climb_speed_stays_within_bound_in_closed_loop() {
        let model = unit_model();
        let nominal = model.mix(9.81 + 3.0, &Vector3::zeros());
        let filter = SafetyFilter::new(
            model.clone(),
            Arc::new(ObstacleSet::empty()),
            SafetyFilterSettings {
                class_k: ClassK::Linear { gain: 2.0 },
                gains: EcbfGains::new(6.0, 5.0).unwrap(),
                margins: SafetyMargins::new(0.05, 0.2, 0.3).unwrap(),
            },
        );

        let dt = 0.01;
        let mut x = DVector::zeros(STATE_DIM);
        let mut max_speed = 0.0_f64;
        let mut was_modified = false;
        for k in 0..200 {
            let outcome = filter.filter(&x, &nominal).unwrap();
            was_modified |= outcome.modified;
            assert!(outcome.input.min() >= -1e-6);
            x = model.propagate(&x, &outcome.input, k as f64 * dt, dt, &RK4);
            max_speed = max_speed.max(x.fixed_rows::<3>(VEL).norm());
        }

        assert!(was_modified);
        assert!(max_speed <= 0.3 + 1e-6, "speed reached {max_speed}");
        assert!(x[VEL + 2] > 0.25);
    }

    #[test]
    fn speed_bound_without_thrust_authority_is_infeasible() {
        // Pitched and sliding sideways: gravity keeps pushing the speed up along
        // body x, and only negative thrust could pull it back.
        let model = unit_model();
        let hover = model.hover_input();
        let filter = SafetyFilter::new(
            model,
            Arc::new(ObstacleSet::empty()),
            settings(0.05, 1.01, 6.0, 5.0),
        );

        let mut x = DVector::zeros(STATE_DIM);
        x[EULER + 1] = 0.15;
        x[VEL] = 1.0;
        x[VEL + 2] = 0.01;

        let err = filter.filter(&x, &hover).unwrap_err();
        assert!(
            matches!(err, ControlError::InfeasibleSafetyConstraint(ref m) if m.contains("speed bound")),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn wide_speed_margin_still_solves() {
        let model = unit_model();
        let nominal = model.mix(9.81, &Vector3::new(0.4, 0.0, 0.0));
        let mut x = DVector::zeros(STATE_DIM);
        x[EULER] = 0.15;
        x[OMEGA] = 0.1;
        x[VEL + 2] = 0.2;

        let mut inputs = Vec::new();
        for safe_vel in [5.0, 100.0, 1000.0] {
            let filter = SafetyFilter::new(
                model.clone(),
                Arc::new(ObstacleSet::empty()),
                settings(0.05, safe_vel, 6.0, 5.0),
            );
            let outcome = filter.filter(&x, &nominal).unwrap();
            assert!(outcome.modified);
            assert!(!outcome.active.contains(&BarrierKind::Speed));
            inputs.push(outcome.input);
        }
        // The slack speed row has no say in the answer.
        assert_relative_eq!(inputs[0], inputs[2], epsilon = 1e-5);
    }

    #[test]
    fn state_inside_margin_is_infeasible() {
        let model = unit_model();
        let hover = model.hover_input();
        let filter = SafetyFilter::new(
            model,
            sphere_set(Vector3::new(0.0, 0.0, 0.12), 0.1),
            settings(0.05, 5.0, 1.0, 2.0),
        );

        let err = filter.filter(&DVector::zeros(STATE_DIM), &hover).unwrap_err();
        assert!(matches!(err, ControlError::InfeasibleSafetyConstraint(_)));
    }

    #[test]
    fn obstacle_center_escalates_degeneracy() {
        let model = unit_model();
        let hover = model.hover_input();
        let filter = SafetyFilter::new(
            model,
            sphere_set(Vector3::zeros(), 0.1),
            settings(0.05, 5.0, 1.0, 2.0),
        );

        let err = filter.filter(&DVector::zeros(STATE_DIM), &hover).unwrap_err();
        assert!(matches!(err, ControlError::NumericalDegeneracy(_)));
    }

    #[test]
    fn csc_conversion_keeps_nonzeros() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let csc = dmatrix_to_csc(&m);
        assert_eq!(csc.colptr, vec![0, 1, 2, 3]);
        assert_eq!(csc.rowval, vec![0, 1, 0]);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);

        let upper = dmatrix_to_csc_upper_tri(&DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 4.0]));
        assert_eq!(upper.nzval, vec![2.0, 1.0, 4.0]);
    }
}
