// mrcbf_core/src/models/dynamics/quadrotor.rs

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Rotation3, Vector3, Vector4};

use crate::frames::layout::{quadrotor_state_layout, EULER, OMEGA, POS, VEL};
use crate::frames::StateVariable;
use crate::models::dynamics::Dynamics;
use crate::models::vehicle::{PropellerInertia, VehicleParameters};
use crate::types::{Control, State, CONTROL_DIM, GRAVITY, STATE_DIM};

/// Nonlinear rigid-body quadrotor dynamics in the plus configuration.
///
/// Input `u` holds the four squared rotor speeds. Rotor 1 sits on +x, 2 on +y,
/// 3 on -x and 4 on -y; rotors 1 and 3 produce +z reaction torque.
#[derive(Debug, Clone)]
pub struct RigidBodyModel {
    params: Arc<VehicleParameters>,
}

impl RigidBodyModel {
    pub fn new(params: Arc<VehicleParameters>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VehicleParameters {
        &self.params
    }

    /// `x_dot = f(x, u)`. The model is time-invariant.
    pub fn derivative(&self, x: &State, u: &Control) -> State {
        debug_assert_eq!(x.nrows(), STATE_DIM);
        debug_assert_eq!(u.nrows(), CONTROL_DIM);

        let p = &self.params;
        let euler: Vector3<f64> = x.fixed_rows::<3>(EULER).into();
        let v: Vector3<f64> = x.fixed_rows::<3>(VEL).into();
        let w: Vector3<f64> = x.fixed_rows::<3>(OMEGA).into();

        let r_wb = rotation_world_from_body(&euler);
        let thrust = p.thrust_factor() * u.sum();

        let mut x_dot = DVector::zeros(STATE_DIM);

        // --- Kinematics ---
        x_dot.fixed_rows_mut::<3>(POS).copy_from(&(r_wb * v));
        x_dot
            .fixed_rows_mut::<3>(EULER)
            .copy_from(&(euler_rate_matrix(&euler) * w));

        // --- Translational dynamics (body frame) ---
        let gravity_body = r_wb.transpose() * Vector3::new(0.0, 0.0, -GRAVITY);
        let v_dot = -w.cross(&v) + gravity_body + Vector3::new(0.0, 0.0, thrust / p.mass());
        x_dot.fixed_rows_mut::<3>(VEL).copy_from(&v_dot);

        // --- Rotational dynamics ---
        let inertia = p.inertia();
        let mut net_torque = self.body_torque(u) - w.cross(&inertia.component_mul(&w));
        if let PropellerInertia::With(jtp) = p.propeller() {
            let rotor_rate =
                signed_sqrt(u[0]) - signed_sqrt(u[1]) + signed_sqrt(u[2]) - signed_sqrt(u[3]);
            net_torque -= w.cross(&Vector3::z()) * (jtp * rotor_rate);
        }
        x_dot
            .fixed_rows_mut::<3>(OMEGA)
            .copy_from(&net_torque.component_div(inertia));

        x_dot
    }

    /// Jacobians `(A, B)` of [`derivative`](Self::derivative) at `(x, u)`.
    pub fn linearize(&self, x: &State, u: &Control) -> (DMatrix<f64>, DMatrix<f64>) {
        self.calculate_jacobian(x, u, 0.0)
    }

    /// Body-frame torque produced by the rotors.
    pub fn body_torque(&self, u: &Control) -> Vector3<f64> {
        let p = &self.params;
        let lkf = p.arm_length() * p.thrust_factor();
        Vector3::new(
            lkf * (u[1] - u[3]),
            lkf * (u[2] - u[0]),
            p.drag_factor() * (u[0] - u[1] + u[2] - u[3]),
        )
    }

    /// Maps squared rotor speeds to `[thrust, tau_x, tau_y, tau_z]`.
    pub fn allocation_matrix(&self) -> Matrix4<f64> {
        let p = &self.params;
        let kf = p.thrust_factor();
        let lkf = p.arm_length() * kf;
        let km = p.drag_factor();
        Matrix4::new(
            kf, kf, kf, kf, //
            0.0, lkf, 0.0, -lkf, //
            -lkf, 0.0, lkf, 0.0, //
            km, -km, km, -km,
        )
    }

    /// Inverse of [`allocation_matrix`](Self::allocation_matrix): the squared rotor
    /// speeds that realise a collective thrust and body torque.
    pub fn mix(&self, thrust: f64, torque: &Vector3<f64>) -> Control {
        let p = &self.params;
        let per_rotor = thrust / (4.0 * p.thrust_factor());
        let roll_pitch = 1.0 / (2.0 * p.arm_length() * p.thrust_factor());
        let yaw = torque.z / (4.0 * p.drag_factor());
        let u = Vector4::new(
            per_rotor - roll_pitch * torque.y + yaw,
            per_rotor + roll_pitch * torque.x - yaw,
            per_rotor + roll_pitch * torque.y + yaw,
            per_rotor - roll_pitch * torque.x - yaw,
        );
        DVector::from_column_slice(u.as_slice())
    }

    /// Input that balances gravity with zero body torque.
    pub fn hover_input(&self) -> Control {
        self.mix(self.params.mass() * GRAVITY, &Vector3::zeros())
    }
}

impl Dynamics for RigidBodyModel {
    fn get_state_layout(&self) -> Vec<StateVariable> {
        quadrotor_state_layout()
    }

    fn get_derivatives(&self, x: &State, u: &Control, _t: f64) -> State {
        self.derivative(x, u)
    }
}

/// `R_wb = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn rotation_world_from_body(euler: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_euler_angles(euler.x, euler.y, euler.z).into_inner()
}

/// Maps body angular velocity to ZYX Euler angle rates. Singular at pitch = ±π/2.
pub fn euler_rate_matrix(euler: &Vector3<f64>) -> Matrix3<f64> {
    let (s_roll, c_roll) = euler.x.sin_cos();
    let (s_pitch, c_pitch) = euler.y.sin_cos();
    let t_pitch = s_pitch / c_pitch;
    Matrix3::new(
        1.0, s_roll * t_pitch, c_roll * t_pitch, //
        0.0, c_roll, -s_roll, //
        0.0, s_roll / c_pitch, c_roll / c_pitch,
    )
}

fn signed_sqrt(value: f64) -> f64 {
    value.signum() * value.abs().sqrt()
}
