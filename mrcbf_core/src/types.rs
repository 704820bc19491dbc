// mrcbf_core/src/types.rs

use nalgebra::DVector;
use std::sync::Arc;

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Control = DVector<f64>;

/// Length of the quadrotor state vector `[p, euler, v_body, w_body]`.
pub const STATE_DIM: usize = 12;
/// Length of the input vector (squared rotor speeds).
pub const CONTROL_DIM: usize = 4;

/// Standard gravity, m/s^2. Acts along world -z.
pub const GRAVITY: f64 = 9.81;

/// Maps simulation time to a target 12-dimensional state. Must be pure.
pub type ReferenceFn = Arc<dyn Fn(f64) -> State + Send + Sync>;

/// Additive perturbation to the state derivative: `(x, t) -> x_dot_extra`.
pub type DisturbanceFn = Arc<dyn Fn(&State, f64) -> State + Send + Sync>;

/// Wraps a closure as a [`ReferenceFn`].
pub fn reference_fn<F>(f: F) -> ReferenceFn
where
    F: Fn(f64) -> State + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`DisturbanceFn`].
pub fn disturbance_fn<F>(f: F) -> DisturbanceFn
where
    F: Fn(&State, f64) -> State + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A reference that holds a single state for all time.
pub fn constant_reference(target: State) -> ReferenceFn {
    Arc::new(move |_t| target.clone())
}
