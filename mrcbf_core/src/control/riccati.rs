// mrcbf_core/src/control/riccati.rs

//! Discretization and Riccati solvers for the horizon planner.

use nalgebra::{DMatrix, DVector};

use crate::error::ControlError;

/// Iteration cap for [`solve_dare`].
pub const DARE_MAX_ITERATIONS: usize = 10_000;
/// Relative change between iterates at which [`solve_dare`] stops.
pub const DARE_TOLERANCE: f64 = 1e-10;

/// A discrete-time affine model `x_{k+1} = A x_k + B u_k + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteModel {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub c: DVector<f64>,
}

/// Zero-order-hold discretization of `x_dot = A x + B u + drift` over `dt`.
///
/// Uses the augmented exponential
/// ```text
/// [A_d  B_d  c_d]          [A  B  drift]
/// [ 0    I    0 ] = expm(dt [0  0    0  ])
/// [ 0    0    1 ]          [0  0    0  ]
/// ```
pub fn discretize(
    a_c: &DMatrix<f64>,
    b_c: &DMatrix<f64>,
    drift: &DVector<f64>,
    dt: f64,
) -> DiscreteModel {
    let n_x = a_c.nrows();
    let n_u = b_c.ncols();
    let n_aug = n_x + n_u + 1;

    let mut aug = DMatrix::zeros(n_aug, n_aug);
    aug.view_mut((0, 0), (n_x, n_x)).copy_from(a_c);
    aug.view_mut((0, n_x), (n_x, n_u)).copy_from(b_c);
    aug.view_mut((0, n_x + n_u), (n_x, 1)).copy_from(drift);
    aug *= dt;

    let exp_aug = matrix_exp(&aug);

    DiscreteModel {
        a: exp_aug.view((0, 0), (n_x, n_x)).clone_owned(),
        b: exp_aug.view((0, n_x), (n_x, n_u)).clone_owned(),
        c: exp_aug.column(n_x + n_u).rows(0, n_x).clone_owned(),
    }
}

/// `e^M` by scaling and squaring with a truncated Taylor series.
pub fn matrix_exp(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();

    // Scale so that ||M / 2^s||_inf < 1.
    let norm_inf = m
        .row_iter()
        .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0_f64, f64::max);
    let squarings = if norm_inf > 1.0 {
        norm_inf.log2().ceil() as i32
    } else {
        0
    };
    let scaled = m / 2.0_f64.powi(squarings);

    let mut result = DMatrix::identity(n, n);
    let mut term = DMatrix::identity(n, n);
    for k in 1..=16 {
        term = &term * &scaled / (k as f64);
        result += &term;
        if term.amax() < 1e-17 {
            break;
        }
    }

    for _ in 0..squarings {
        result = &result * &result;
    }
    result
}

/// Stabilizing solution of `P = Q + A'PA - A'PB (R + B'PB)^-1 B'PA` by fixed-point iteration from `P = Q`.
pub fn solve_dare(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ControlError> {
    let mut p = q.clone();
    let mut change = f64::INFINITY;

    for iteration in 1..=DARE_MAX_ITERATIONS {
        let next = riccati_step(a, b, q, r, &p).ok_or(ControlError::RiccatiDidNotConverge {
            iterations: iteration,
            residual: change,
        })?;

        if next.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::RiccatiDidNotConverge {
                iterations: iteration,
                residual: f64::INFINITY,
            });
        }

        change = (&next - &p).amax();
        p = next;
        if change <= DARE_TOLERANCE * (1.0 + p.amax()) {
            log::debug!("DARE converged after {iteration} iterations");
            return Ok(p);
        }
    }

    Err(ControlError::RiccatiDidNotConverge {
        iterations: DARE_MAX_ITERATIONS,
        residual: change,
    })
}

/// Largest absolute entry of the DARE residual at `p`. `None` if `R + B'PB` is singular.
pub fn dare_residual(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    p: &DMatrix<f64>,
) -> Option<f64> {
    riccati_step(a, b, q, r, p).map(|next| (next - p).amax())
}

/// Feedback gain `K = (R + B'PB)^-1 B'PA`.
pub fn feedback_gain(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    r: &DMatrix<f64>,
    p: &DMatrix<f64>,
) -> Option<DMatrix<f64>> {
    let bt_p = b.tr_mul(p);
    let chol = (r + &bt_p * b).cholesky()?;
    Some(chol.solve(&(&bt_p * a)))
}

/// One Riccati map evaluation, symmetrized.
fn riccati_step(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    p: &DMatrix<f64>,
) -> Option<DMatrix<f64>> {
    let gain = feedback_gain(a, b, r, p)?;
    let at_p = a.tr_mul(p);
    let next = q + &at_p * a - &at_p * b * gain;
    Some((&next + next.transpose()) * 0.5)
}
