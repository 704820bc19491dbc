// mrcbf_core/src/utils/integrators.rs

use nalgebra::DVector;
use num_traits::Float;
use serde::Deserialize;

/// One fixed step of an explicit ODE scheme for `x_dot = func(x, t)` from `t0` to `tf`.
pub trait Integrator<T> {
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T>;
}

// Runge-Kutta methods
#[derive(Debug, Default, Clone, Copy)]
pub struct RK1;

impl<T> Integrator<T> for RK1
where
    T: Float + nalgebra::Scalar + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt: T = tf - t0;
        x0.clone() + dt * func(x0, t0) // Euler's method
    }
}

/// Heun's method.
#[derive(Debug, Default, Clone, Copy)]
pub struct RK2;

impl<T> Integrator<T> for RK2
where
    T: Float + nalgebra::Scalar + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt: T = tf - t0;
        let half = T::one() / (T::one() + T::one());
        let k1: DVector<T> = func(x0, t0);
        let k2: DVector<T> = func(&(x0.clone() + dt * k1.clone()), tf);

        x0.clone() + half * dt * (k1 + k2)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RK4;

impl<T> Integrator<T> for RK4
where
    T: Float + nalgebra::Scalar + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sixth = T::one() / (two * (two + T::one()));

        let k1 = func(x0, t0);
        let k2 = func(&(x0.clone() + half * dt * k1.clone()), t0 + half * dt);
        let k3 = func(&(x0.clone() + half * dt * k2.clone()), t0 + half * dt);
        let k4 = func(&(x0.clone() + dt * k3.clone()), tf);

        x0.clone() + dt * sixth * (k1 + two * k2 + two * k3 + k4)
    }
}

/// Integrator selection as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Forward Euler.
    Euler,
    Rk2,
    #[default]
    Rk4,
}

impl IntegratorKind {
    pub fn integrator(self) -> &'static dyn Integrator<f64> {
        match self {
            IntegratorKind::Euler => &RK1,
            IntegratorKind::Rk2 => &RK2,
            IntegratorKind::Rk4 => &RK4,
        }
    }
}
