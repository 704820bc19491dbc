// mrcbf_core/src/utils/mod.rs

pub mod integrators;

use std::f64::consts::PI;

/// Wraps an angle into `[-pi, pi)`.
pub fn wrap_to_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}
