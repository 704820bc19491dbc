// mrcbf_core/src/models/dynamics/mod.rs

use crate::frames::StateVariable;
use crate::types::{Control, State};
use crate::utils::integrators::Integrator;
use nalgebra::DMatrix;
use std::fmt::Debug;

// --- DYNAMICS MODEL TRAIT ---
// Represents the physics model of a vehicle. `x_dot = f(x, u)`
/// Defines how the vehicle's state evolves over time based on control inputs.
pub trait Dynamics: Debug + Send + Sync {
    /// Returns the complete layout of the state vector for this specific model.
    /// The order of this Vec defines the indices for the state vector `x`.
    fn get_state_layout(&self) -> Vec<StateVariable>;

    /// Computes the time derivative of the state vector: `x_dot = f(x, u, t)`.
    fn get_derivatives(&self, x: &State, u: &Control, t: f64) -> State;

    /// Propagates the state forward in time using a numerical integrator.
    /// The control input `u` is held constant over `dt`.
    fn propagate(
        &self,
        x: &State,
        u: &Control,
        t: f64,
        dt: f64,
        integrator: &dyn Integrator<f64>,
    ) -> State {
        debug_assert!(dt >= 0.0, "Dynamics::propagate: dt cannot be negative");

        let func = |func_x: &State, func_t: f64| -> State { self.get_derivatives(func_x, u, func_t) };

        integrator.step(&func, x, t, t + dt)
    }

    /// Calculates the Jacobian matrices of the dynamics function `f(x, u, t)`.
    /// Jacobian A = ∂f/∂x, Jacobian B = ∂f/∂u.
    ///
    /// The default implementation uses central finite differences, which is exact
    /// up to truncation error for the input-affine parts of a model.
    ///
    /// # Returns
    /// A tuple `(A, B)` where `A` is an NxN matrix and `B` is an NxM matrix (N=state dim, M=control dim).
    fn calculate_jacobian(&self, x: &State, u: &Control, t: f64) -> (DMatrix<f64>, DMatrix<f64>) {
        numerical_jacobian(|xx, uu| self.get_derivatives(xx, uu, t), x, u)
    }
}

/// Relative perturbation used by [`numerical_jacobian`].
const JACOBIAN_STEP: f64 = 1e-6;

/// Central-difference Jacobians of `f(x, u)` with respect to `x` and `u`.
pub fn numerical_jacobian<F>(f: F, x: &State, u: &Control) -> (DMatrix<f64>, DMatrix<f64>)
where
    F: Fn(&State, &Control) -> State,
{
    let state_dim = x.nrows();
    let control_dim = u.nrows();
    let mut a_jac = DMatrix::zeros(state_dim, state_dim);
    let mut b_jac = DMatrix::zeros(state_dim, control_dim);

    for j in 0..state_dim {
        let h = JACOBIAN_STEP * (1.0 + x[j].abs());
        let mut x_plus = x.clone();
        let mut x_minus = x.clone();
        x_plus[j] += h;
        x_minus[j] -= h;
        let column = (f(&x_plus, u) - f(&x_minus, u)) / (2.0 * h);
        a_jac.column_mut(j).copy_from(&column);
    }

    for j in 0..control_dim {
        let h = JACOBIAN_STEP * (1.0 + u[j].abs());
        let mut u_plus = u.clone();
        let mut u_minus = u.clone();
        u_plus[j] += h;
        u_minus[j] -= h;
        let column = (f(x, &u_plus) - f(x, &u_minus)) / (2.0 * h);
        b_jac.column_mut(j).copy_from(&column);
    }

    (a_jac, b_jac)
}

pub mod quadrotor;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;

    #[test]
    fn numerical_jacobian_of_linear_map_is_exact() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, -3.0, 0.5]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 4.0]);
        let f = |x: &State, u: &Control| &a * x + &b * u;

        let (a_num, b_num) =
            numerical_jacobian(f, &DVector::from_vec(vec![0.3, -1.0]), &DVector::from_vec(vec![2.0]));
        assert_abs_diff_eq!(a_num, a, epsilon = 1e-8);
        assert_abs_diff_eq!(b_num, b, epsilon = 1e-8);
    }
}
