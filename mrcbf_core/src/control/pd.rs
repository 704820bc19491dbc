// mrcbf_core/src/control/pd.rs

use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::sync::Arc;

use nalgebra::{DVector, Rotation2, Vector2, Vector3, Vector4};

use crate::control::telemetry::{DebugEntry, DebugLog};
use crate::control::Controller;
use crate::error::{require_positive, ConfigError, ControlError};
use crate::frames::layout::{EULER, POS, VEL};
use crate::models::dynamics::quadrotor::{rotation_world_from_body, RigidBodyModel};
use crate::types::{Control, State, GRAVITY, STATE_DIM};
use crate::utils::wrap_to_pi;

/// Maps time to a target pose `[x, y, z, yaw]`.
pub type PoseReferenceFn = Arc<dyn Fn(f64) -> Vector4<f64> + Send + Sync>;

const TICK_EPS: f64 = 1e-9;

/// Proportional and derivative gains of the cascaded position/attitude loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdGains {
    pub kp_xyz: f64,
    pub kd_xyz: f64,
    pub kp_a: f64,
    pub kd_a: f64,
}

impl PdGains {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, gain) in [
            ("kp_xyz", self.kp_xyz),
            ("kd_xyz", self.kd_xyz),
            ("kp_a", self.kp_a),
            ("kd_a", self.kd_a),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(ConfigError::invalid(name, format!("gain must be finite and non-negative, got {gain}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdSettings {
    pub gains: PdGains,
    /// Update period, s.
    pub dt: f64,
    /// Largest commanded roll or pitch, rad.
    pub max_tilt: f64,
}

/// Cascaded PD baseline: world-frame position loop, then attitude loop, then the mixer.
pub struct PdController {
    model: RigidBodyModel,
    reference: PoseReferenceFn,
    settings: PdSettings,
    previous_error: Option<(Vector3<f64>, Vector3<f64>)>,
    last_input: Control,
    start_time: Option<f64>,
    updates: u64,
    log: DebugLog,
}

impl fmt::Debug for PdController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdController")
            .field("settings", &self.settings)
            .field("updates", &self.updates)
            .finish_non_exhaustive()
    }
}

impl PdController {
    pub fn new(
        model: RigidBodyModel,
        reference: PoseReferenceFn,
        settings: PdSettings,
    ) -> Result<Self, ConfigError> {
        settings.gains.validate()?;
        require_positive("sim_dt", settings.dt)?;
        if !(settings.max_tilt > 0.0 && settings.max_tilt < FRAC_PI_2) {
            return Err(ConfigError::invalid(
                "max_tilt",
                format!("must lie in (0, pi/2), got {}", settings.max_tilt),
            ));
        }

        Ok(Self {
            last_input: model.hover_input(),
            model,
            reference,
            settings,
            previous_error: None,
            start_time: None,
            updates: 0,
            log: DebugLog::new(),
        })
    }

    pub fn settings(&self) -> &PdSettings {
        &self.settings
    }

    fn tick_is_due(&self, t: f64) -> bool {
        match self.start_time {
            None => true,
            Some(t0) => t >= t0 + self.updates as f64 * self.settings.dt - TICK_EPS,
        }
    }

    fn control_law(&mut self, x: &State, pose: &Vector4<f64>) -> Control {
        let PdGains {
            kp_xyz,
            kd_xyz,
            kp_a,
            kd_a,
        } = self.settings.gains;
        let dt = self.settings.dt;
        let params = self.model.params();

        let position: Vector3<f64> = x.fixed_rows::<3>(POS).into();
        let euler: Vector3<f64> = x.fixed_rows::<3>(EULER).into();

        // --- Position loop (world frame) ---
        let position_error = pose.xyz() - position;
        let (previous_position_error, previous_attitude_error) = self
            .previous_error
            .unwrap_or((position_error, Vector3::zeros()));
        let accel = position_error * kp_xyz + (position_error - previous_position_error) * (kd_xyz / dt);

        let (roll, pitch, yaw) = (euler.x, euler.y, euler.z);
        let thrust = (params.mass() * (GRAVITY + accel.z) / (roll.cos() * pitch.cos())).max(0.0);

        // Lateral acceleration in the yaw-aligned frame maps to small-angle roll and pitch.
        let heading = Rotation2::new(-yaw) * Vector2::new(accel.x, accel.y);
        let max_tilt = self.settings.max_tilt;
        let pitch_des = (heading.x / GRAVITY).clamp(-max_tilt, max_tilt);
        let roll_des = (-heading.y / GRAVITY).clamp(-max_tilt, max_tilt);

        // --- Attitude loop ---
        let attitude_error = Vector3::new(
            roll_des - roll,
            pitch_des - pitch,
            wrap_to_pi(pose.w - yaw),
        );
        let attitude_rate = if self.previous_error.is_some() {
            (attitude_error - previous_attitude_error) / dt
        } else {
            Vector3::zeros()
        };
        let torque = params
            .inertia()
            .component_mul(&(attitude_error * kp_a + attitude_rate * kd_a));

        self.previous_error = Some((position_error, attitude_error));
        self.model.mix(thrust, &torque)
    }
}

impl Controller for PdController {
    fn compute_input(&mut self, state: &State, t: f64) -> Result<Control, ControlError> {
        if !self.tick_is_due(t) {
            return Ok(self.last_input.clone());
        }
        if self.start_time.is_none() {
            self.start_time = Some(t);
        }

        let pose = (self.reference)(t);
        let input = self.control_law(state, &pose);
        if input.iter().any(|u| !u.is_finite()) {
            return Err(ControlError::NumericalDegeneracy(format!(
                "PD input at t={t:.3} is not finite"
            )));
        }

        self.log.push(DebugEntry {
            time: t,
            true_state: state.clone(),
            ref_state: pose_to_state(&pose),
            input: input.clone(),
            input_slow: None,
            input_fast: None,
        });
        self.updates += 1;
        self.last_input = input;

        Ok(self.last_input.clone())
    }

    fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    fn control_period(&self) -> Option<f64> {
        Some(self.settings.dt)
    }
}

/// Embeds a pose in a hover state: position and yaw set, everything else zero.
pub fn pose_to_state(pose: &Vector4<f64>) -> State {
    let mut state = DVector::zeros(STATE_DIM);
    state.fixed_rows_mut::<3>(POS).copy_from(&pose.xyz());
    state[EULER + 2] = pose.w;
    state
}

/// World-frame velocity of a state whose linear velocity is stored in the body frame.
pub fn world_velocity(x: &State) -> Vector3<f64> {
    let euler: Vector3<f64> = x.fixed_rows::<3>(EULER).into();
    let v_body: Vector3<f64> = x.fixed_rows::<3>(VEL).into();
    rotation_world_from_body(&euler) * v_body
}
