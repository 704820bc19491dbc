// mrcbf_core/src/control/barrier.rs

//! Barrier functions and their exponential CBF constraint rows.
//!
//! Every barrier `h(x) >= 0` is turned into one linear inequality `a^T u >= b`
//! in the unknown input, using the model linearized at the nominal input:
//!
//! * relative degree 1: `h_dot(x, u) >= -kappa(h)`
//! * relative degree 2: `h_ddot(x, u) >= -c1 h - c2 h_dot`
//!
//! with `h_dot = grad_h^T f` and `h_ddot = (hess_h f + A^T grad_h)^T (f + B (u - u_nom))`.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

use crate::error::{require_positive, ConfigError, ControlError};
use crate::frames::layout::{EULER, POS, VEL};
use crate::obstacles::Obstacle;
use crate::types::{Control, State, STATE_DIM};

/// Coefficient magnitude below which a row is treated as independent of the input.
const NO_AUTHORITY_TOL: f64 = 1e-9;

/// Class-K shaping function for relative-degree-1 barriers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClassK {
    /// `kappa(h) = gain * h`
    Linear { gain: f64 },
    /// `kappa(h) = gain * h^3`
    Cubic { gain: f64 },
}

impl ClassK {
    pub fn eval(&self, h: f64) -> f64 {
        match *self {
            ClassK::Linear { gain } => gain * h,
            ClassK::Cubic { gain } => gain * h.powi(3),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ClassK::Linear { gain } | ClassK::Cubic { gain } => {
                require_positive("class_k.gain", gain).map(|_| ())
            }
        }
    }
}

/// Pole-placement coefficients of `s^2 + c2 s + c1` for relative-degree-2 barriers.
///
/// The polynomial must have real negative roots `-p1, -p2`. Complex roots let
/// `h` oscillate through zero even when the closed loop is stable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcbfGains {
    c1: f64,
    c2: f64,
}

impl EcbfGains {
    pub fn new(c1: f64, c2: f64) -> Result<Self, ConfigError> {
        require_positive("c1", c1)?;
        require_positive("c2", c2)?;
        if c2 * c2 < 4.0 * c1 {
            return Err(ConfigError::invalid(
                "c2",
                format!("s^2 + {c2} s + {c1} has complex roots (need c2^2 >= 4 c1)"),
            ));
        }
        Ok(Self { c1, c2 })
    }

    /// Gains with roots at `-p1` and `-p2`: `c1 = p1 p2`, `c2 = p1 + p2`.
    pub fn from_poles(p1: f64, p2: f64) -> Result<Self, ConfigError> {
        require_positive("p1", p1)?;
        require_positive("p2", p2)?;
        Self::new(p1 * p2, p1 + p2)
    }

    pub fn c1(&self) -> f64 {
        self.c1
    }

    pub fn c2(&self) -> f64 {
        self.c2
    }

    /// The larger root magnitude. `h_dot + fast_pole * h >= 0` must hold at the
    /// start for the barrier to stay non-negative.
    pub fn fast_pole(&self) -> f64 {
        0.5 * (self.c2 + (self.c2 * self.c2 - 4.0 * self.c1).max(0.0).sqrt())
    }
}

/// Margins that define the safe sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyMargins {
    safe_dist: f64,
    safe_rot: f64,
    safe_vel: f64,
}

impl SafetyMargins {
    /// * `safe_dist`: minimum clearance to every obstacle surface (m).
    /// * `safe_rot`: bound on |roll| and |pitch| (rad), below π/2.
    /// * `safe_vel`: bound on the speed (m/s).
    pub fn new(safe_dist: f64, safe_rot: f64, safe_vel: f64) -> Result<Self, ConfigError> {
        require_positive("safe_dist", safe_dist)?;
        require_positive("safe_rot", safe_rot)?;
        require_positive("safe_vel", safe_vel)?;
        if safe_rot >= std::f64::consts::FRAC_PI_2 {
            return Err(ConfigError::invalid(
                "safe_rot",
                format!("{safe_rot} rad reaches the Euler angle singularity"),
            ));
        }
        Ok(Self {
            safe_dist,
            safe_rot,
            safe_vel,
        })
    }

    pub fn safe_dist(&self) -> f64 {
        self.safe_dist
    }

    pub fn safe_rot(&self) -> f64 {
        self.safe_rot
    }

    pub fn safe_vel(&self) -> f64 {
        self.safe_vel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltAxis {
    Roll,
    Pitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Upper,
    Lower,
}

/// Identifies which safe set a constraint row protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Clearance to the obstacle at this index of the set.
    Obstacle(usize),
    Tilt(TiltAxis, Bound),
    Speed,
    /// `u_i >= 0`: squared rotor speeds cannot be negative.
    InputFloor(usize),
}

impl fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierKind::Obstacle(index) => write!(f, "obstacle {index} clearance"),
            BarrierKind::Tilt(axis, bound) => {
                let axis = match axis {
                    TiltAxis::Roll => "roll",
                    TiltAxis::Pitch => "pitch",
                };
                let bound = match bound {
                    Bound::Upper => "upper",
                    Bound::Lower => "lower",
                };
                write!(f, "{axis} {bound} bound")
            }
            BarrierKind::Speed => write!(f, "speed bound"),
            BarrierKind::InputFloor(rotor) => write!(f, "rotor {rotor} thrust floor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeDegree {
    One,
    Two,
}

/// A barrier evaluated at one state: its value, gradient and Hessian w.r.t. the full state.
#[derive(Debug, Clone)]
pub struct Barrier {
    pub kind: BarrierKind,
    pub value: f64,
    pub gradient: DVector<f64>,
    pub hessian: DMatrix<f64>,
    pub relative_degree: RelativeDegree,
}

impl Barrier {
    /// `h = d(p) - safe_dist`. Fails at points where the obstacle has no gradient.
    pub fn obstacle(
        index: usize,
        obstacle: &dyn Obstacle,
        x: &State,
        safe_dist: f64,
    ) -> Result<Self, ControlError> {
        let p = x.fixed_rows::<3>(POS).into_owned();
        let degenerate = || {
            ControlError::NumericalDegeneracy(format!(
                "obstacle {index} has no clearance gradient at {:?}",
                p.as_slice()
            ))
        };
        let grad = obstacle.gradient(&p).ok_or_else(degenerate)?;
        let hess = obstacle.hessian(&p).ok_or_else(degenerate)?;

        let mut gradient = DVector::zeros(STATE_DIM);
        gradient.fixed_rows_mut::<3>(POS).copy_from(&grad);
        let mut hessian = DMatrix::zeros(STATE_DIM, STATE_DIM);
        hessian.fixed_view_mut::<3, 3>(POS, POS).copy_from(&hess);

        Ok(Self {
            kind: BarrierKind::Obstacle(index),
            value: obstacle.distance(&p) - safe_dist,
            gradient,
            hessian,
            relative_degree: RelativeDegree::Two,
        })
    }

    /// `h = safe_rot - angle` (upper) or `h = safe_rot + angle` (lower).
    pub fn tilt(axis: TiltAxis, bound: Bound, x: &State, safe_rot: f64) -> Self {
        let index = match axis {
            TiltAxis::Roll => EULER,
            TiltAxis::Pitch => EULER + 1,
        };
        let sign = match bound {
            Bound::Upper => -1.0,
            Bound::Lower => 1.0,
        };
        let mut gradient = DVector::zeros(STATE_DIM);
        gradient[index] = sign;

        Self {
            kind: BarrierKind::Tilt(axis, bound),
            value: safe_rot + sign * x[index],
            gradient,
            hessian: DMatrix::zeros(STATE_DIM, STATE_DIM),
            relative_degree: RelativeDegree::Two,
        }
    }

    /// `h = safe_vel^2 - |v|^2`. The rotation is orthogonal, so body-frame velocity suffices.
    pub fn speed(x: &State, safe_vel: f64) -> Self {
        let v = x.fixed_rows::<3>(VEL);
        let mut gradient = DVector::zeros(STATE_DIM);
        gradient.fixed_rows_mut::<3>(VEL).copy_from(&(v * -2.0));
        let mut hessian = DMatrix::zeros(STATE_DIM, STATE_DIM);
        hessian
            .fixed_view_mut::<3, 3>(VEL, VEL)
            .fill_diagonal(-2.0);

        Self {
            kind: BarrierKind::Speed,
            value: safe_vel * safe_vel - v.norm_squared(),
            gradient,
            hessian,
            relative_degree: RelativeDegree::One,
        }
    }

    /// `h_dot = grad_h^T f`. For relative-degree-2 barriers this is independent of the input.
    pub fn rate(&self, drift: &State) -> f64 {
        self.gradient.dot(drift)
    }

    /// Builds the constraint row `a^T u >= b` for this barrier.
    pub fn constraint_row(
        &self,
        lin: &Linearization,
        class_k: &ClassK,
        gains: &EcbfGains,
    ) -> BarrierRow {
        let h_dot = self.rate(&lin.drift);

        let (coefficients, bound) = match self.relative_degree {
            RelativeDegree::One => {
                let a = lin.b.tr_mul(&self.gradient);
                let b = -class_k.eval(self.value) - h_dot + a.dot(&lin.nominal);
                (a, b)
            }
            RelativeDegree::Two => {
                let chain = &self.hessian * &lin.drift + lin.a.tr_mul(&self.gradient);
                let h_ddot = chain.dot(&lin.drift);
                let a = lin.b.tr_mul(&chain);
                let b = -gains.c1 * self.value - gains.c2 * h_dot - h_ddot + a.dot(&lin.nominal);
                (a, b)
            }
        };

        BarrierRow {
            kind: self.kind,
            coefficients,
            bound,
        }
    }
}

/// The model linearized at `(x, u_nom)`.
#[derive(Debug, Clone)]
pub struct Linearization {
    /// `f(x, u_nom)`
    pub drift: State,
    /// `df/dx`
    pub a: DMatrix<f64>,
    /// `df/du`
    pub b: DMatrix<f64>,
    pub nominal: Control,
}

/// One scalar inequality `coefficients^T u >= bound`.
#[derive(Debug, Clone, PartialEq)]
pub struct BarrierRow {
    pub kind: BarrierKind,
    pub coefficients: Control,
    pub bound: f64,
}

impl BarrierRow {
    /// `u_rotor >= 0` for an input of dimension `dim`.
    pub fn input_floor(rotor: usize, dim: usize) -> Self {
        let mut coefficients = Control::zeros(dim);
        coefficients[rotor] = 1.0;
        Self {
            kind: BarrierKind::InputFloor(rotor),
            coefficients,
            bound: 0.0,
        }
    }

    /// `a^T u - b`; non-negative when satisfied.
    pub fn residual(&self, u: &Control) -> f64 {
        self.coefficients.dot(u) - self.bound
    }

    pub fn is_satisfied_by(&self, u: &Control, tolerance: f64) -> bool {
        self.residual(u) >= -tolerance
    }

    /// True if `u` violates the row and the coefficients are too small, relative
    /// to the shortfall, for any input of sane magnitude to close it.
    pub fn lacks_authority(&self, u: &Control, tolerance: f64) -> bool {
        let shortfall = -self.residual(u);
        shortfall > tolerance && self.coefficients.norm() <= NO_AUTHORITY_TOL * shortfall.max(1.0)
    }

    /// True if the row asks for more than any non-negative input can give,
    /// i.e. every coefficient is non-positive while the bound is positive.
    pub fn needs_negative_input(&self, tolerance: f64) -> bool {
        self.bound > tolerance && self.coefficients.iter().all(|&a| a <= 0.0)
    }

    /// The same half-space with a unit-norm coefficient vector, or `None` when
    /// the row does not depend on the input.
    pub fn normalized(&self) -> Option<Self> {
        let norm = self.coefficients.norm();
        (norm > NO_AUTHORITY_TOL).then(|| Self {
            kind: self.kind,
            coefficients: &self.coefficients / norm,
            bound: self.bound / norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacles::SphereObstacle;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn gains() -> EcbfGains {
        EcbfGains::new(4.0, 4.0).unwrap()
    }

    /// A double integrator in z with the input as acceleration.
    fn vertical_linearization(vz: f64, nominal: f64) -> Linearization {
        let mut a = DMatrix::zeros(STATE_DIM, STATE_DIM);
        a[(2, VEL + 2)] = 1.0;
        let mut b = DMatrix::zeros(STATE_DIM, 1);
        b[(VEL + 2, 0)] = 1.0;
        let mut drift = DVector::zeros(STATE_DIM);
        drift[2] = vz;
        drift[VEL + 2] = nominal;
        Linearization {
            drift,
            a,
            b,
            nominal: DVector::from_element(1, nominal),
        }
    }

    #[test]
    fn class_k_shapes() {
        assert_relative_eq!(ClassK::Linear { gain: 2.0 }.eval(0.5), 1.0);
        assert_relative_eq!(ClassK::Cubic { gain: 2.0 }.eval(0.5), 0.25);
        assert!(ClassK::Linear { gain: 0.0 }.validate().is_err());
    }

    #[test]
    fn second_order_row_for_vertical_approach() {
        let sphere = SphereObstacle::new(Vector3::new(0.0, 0.0, 1.0), 0.2).unwrap();
        let mut x = DVector::zeros(STATE_DIM);
        x[VEL + 2] = 0.5;

        let barrier = Barrier::obstacle(0, &sphere, &x, 0.1).unwrap();
        assert_relative_eq!(barrier.value, 0.7, epsilon = 1e-12);

        let row = barrier.constraint_row(&vertical_linearization(0.5, 0.0), &ClassK::Linear { gain: 1.0 }, &gains());
        // d = 1 - 0.2 - z, so h_ddot = -u and h_dot = -0.5.
        assert_relative_eq!(row.coefficients[0], -1.0, epsilon = 1e-12);
        // -u >= -c1 h - c2 h_dot  =>  -u >= -2.8 + 2.0
        assert_relative_eq!(row.bound, -0.8, epsilon = 1e-12);
        assert!(row.is_satisfied_by(&DVector::from_element(1, 0.8), 1e-12));
        assert!(!row.is_satisfied_by(&DVector::from_element(1, 0.9), 1e-12));
    }

    #[test]
    fn first_order_speed_row() {
        let mut x = DVector::zeros(STATE_DIM);
        x[VEL + 2] = 1.0;
        let barrier = Barrier::speed(&x, 2.0);
        assert_relative_eq!(barrier.value, 3.0);

        let row = barrier.constraint_row(
            &vertical_linearization(1.0, 0.0),
            &ClassK::Linear { gain: 0.5 },
            &gains(),
        );
        // h_dot = -2 vz u >= -0.5 * 3
        assert_relative_eq!(row.coefficients[0], -2.0);
        assert_relative_eq!(row.bound, -1.5);
    }

    #[test]
    fn tilt_barriers_bound_both_sides() {
        let mut x = DVector::zeros(STATE_DIM);
        x[EULER + 1] = 0.15;
        let upper = Barrier::tilt(TiltAxis::Pitch, Bound::Upper, &x, 0.2);
        let lower = Barrier::tilt(TiltAxis::Pitch, Bound::Lower, &x, 0.2);
        assert_relative_eq!(upper.value, 0.05, epsilon = 1e-12);
        assert_relative_eq!(lower.value, 0.35, epsilon = 1e-12);
        assert_eq!(upper.kind.to_string(), "pitch upper bound");
    }

    #[test]
    fn obstacle_center_is_degenerate() {
        let sphere = SphereObstacle::new(Vector3::zeros(), 0.5).unwrap();
        let x = DVector::zeros(STATE_DIM);
        let err = Barrier::obstacle(3, &sphere, &x, 0.1).unwrap_err();
        assert!(matches!(err, ControlError::NumericalDegeneracy(_)));
        assert!(err.is_safety_violation());
    }

    #[test]
    fn gains_require_real_poles() {
        // The old scenario defaults: s^2 + 0.01 s + 0.005 has complex roots.
        assert!(matches!(
            EcbfGains::new(0.005, 0.01),
            Err(ConfigError::InvalidValue { field, .. }) if field == "c2"
        ));
        assert!(EcbfGains::new(4.0, 4.0).is_ok());

        let gains = EcbfGains::from_poles(2.0, 3.0).unwrap();
        assert_relative_eq!(gains.c1(), 6.0);
        assert_relative_eq!(gains.c2(), 5.0);
        assert_relative_eq!(gains.fast_pole(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(EcbfGains::new(4.0, 4.0).unwrap().fast_pole(), 2.0, epsilon = 1e-12);
        assert!(EcbfGains::from_poles(0.0, 3.0).is_err());
    }

    #[test]
    fn floor_and_authority_checks() {
        let floor = BarrierRow::input_floor(2, 4);
        assert_eq!(floor.kind.to_string(), "rotor 2 thrust floor");
        assert!(floor.is_satisfied_by(&DVector::from_vec(vec![-1.0, 0.0, 0.0, 0.0]), 0.0));
        assert!(!floor.is_satisfied_by(&DVector::from_vec(vec![0.0, 0.0, -1e-3, 0.0]), 1e-9));

        // A 1e-9 coefficient asked to close a gap of 1: only an input of 1e9 would do.
        let weak = BarrierRow {
            kind: BarrierKind::Speed,
            coefficients: DVector::from_vec(vec![1e-10, 0.0, 0.0, 0.0]),
            bound: 1.0,
        };
        let u = DVector::zeros(4);
        assert!(weak.lacks_authority(&u, 1e-9));
        assert!(weak.normalized().is_none());

        let pulls_down = BarrierRow {
            kind: BarrierKind::Speed,
            coefficients: DVector::from_vec(vec![-0.02, -0.02, -0.02, -0.02]),
            bound: 0.5,
        };
        assert!(!pulls_down.lacks_authority(&u, 1e-9));
        assert!(pulls_down.needs_negative_input(1e-9));
        assert!(!floor.needs_negative_input(1e-9));

        let unit = pulls_down.normalized().unwrap();
        assert_relative_eq!(unit.coefficients.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(unit.bound, 0.5 / 0.04, epsilon = 1e-12);
    }

    #[test]
    fn margins_reject_singular_tilt() {
        assert!(SafetyMargins::new(0.05, 0.2, 100.0).is_ok());
        assert!(SafetyMargins::new(0.05, 1.6, 100.0).is_err());
        assert!(SafetyMargins::new(-0.05, 0.2, 100.0).is_err());
    }
}
