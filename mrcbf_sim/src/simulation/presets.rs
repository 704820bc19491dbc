// mrcbf_sim/src/simulation/presets.rs

//! Named reference trajectories and disturbances selectable from a scenario file.

use std::sync::Arc;

use nalgebra::{DVector, Vector4};
use serde::Deserialize;

use mrcbf_core::control::pd::PoseReferenceFn;
use mrcbf_core::frames::layout::{EULER, POS, VEL};
use mrcbf_core::types::{disturbance_fn, reference_fn, DisturbanceFn, ReferenceFn, STATE_DIM};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ReferencePreset {
    /// Hold a fixed position and heading.
    Hover {
        position: [f64; 3],
        #[serde(default)]
        yaw: f64,
    },
    /// Fly a horizontal circle about the z axis at constant altitude.
    Circle {
        radius: f64,
        /// Angular rate, rad/s.
        omega: f64,
        altitude: f64,
    },
}

impl Default for ReferencePreset {
    fn default() -> Self {
        ReferencePreset::Hover {
            position: [1.0, 0.0, 0.0],
            yaw: 0.0,
        }
    }
}

impl ReferencePreset {
    /// Full 12-dimensional reference. Attitude stays level, so body and world
    /// velocities coincide.
    pub fn state_reference(&self) -> ReferenceFn {
        match *self {
            ReferencePreset::Hover { position, yaw } => reference_fn(move |_t| {
                let mut state = DVector::zeros(STATE_DIM);
                state.fixed_rows_mut::<3>(POS).copy_from_slice(&position);
                state[EULER + 2] = yaw;
                state
            }),
            ReferencePreset::Circle {
                radius,
                omega,
                altitude,
            } => reference_fn(move |t| {
                let (s, c) = (omega * t).sin_cos();
                let mut state = DVector::zeros(STATE_DIM);
                state[POS] = radius * c;
                state[POS + 1] = radius * s;
                state[POS + 2] = altitude;
                state[VEL] = -radius * omega * s;
                state[VEL + 1] = radius * omega * c;
                state
            }),
        }
    }

    /// Position and heading only, as consumed by the PD baseline.
    pub fn pose_reference(&self) -> PoseReferenceFn {
        match *self {
            ReferencePreset::Hover { position, yaw } => {
                let pose = Vector4::new(position[0], position[1], position[2], yaw);
                Arc::new(move |_t: f64| pose)
            }
            ReferencePreset::Circle {
                radius,
                omega,
                altitude,
            } => Arc::new(move |t: f64| {
                let (s, c) = (omega * t).sin_cos();
                Vector4::new(radius * c, radius * s, altitude, 0.0)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum DisturbancePreset {
    #[default]
    None,
    /// Constant extra acceleration on the body-frame velocity.
    ConstantWind { acceleration: [f64; 3] },
}

impl DisturbancePreset {
    pub fn build(&self) -> Option<DisturbanceFn> {
        match *self {
            DisturbancePreset::None => None,
            DisturbancePreset::ConstantWind { acceleration } => {
                Some(disturbance_fn(move |_x, _t| {
                    let mut extra = DVector::zeros(STATE_DIM);
                    extra.fixed_rows_mut::<3>(VEL).copy_from_slice(&acceleration);
                    extra
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn circle_reference_is_consistent_with_its_velocity() {
        let preset = ReferencePreset::Circle {
            radius: 0.3,
            omega: 0.1,
            altitude: 0.5,
        };
        let reference = preset.state_reference();

        let t = 2.0;
        let h = 1e-6;
        let numeric = (reference(t + h) - reference(t - h)) / (2.0 * h);
        let at_t = reference(t);
        assert_relative_eq!(numeric[0], at_t[VEL], epsilon = 1e-8);
        assert_relative_eq!(numeric[1], at_t[VEL + 1], epsilon = 1e-8);
        assert_relative_eq!(at_t[2], 0.5);

        let pose = preset.pose_reference()(t);
        assert_relative_eq!(pose.x, at_t[0]);
        assert_relative_eq!(pose.y, at_t[1]);
    }

    #[test]
    fn hover_reference_holds_pose() {
        let preset = ReferencePreset::Hover {
            position: [1.0, 2.0, 3.0],
            yaw: 0.5,
        };
        let state = preset.state_reference()(42.0);
        assert_eq!(&state.as_slice()[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(state[EULER + 2], 0.5);
        assert_eq!(preset.pose_reference()(0.0), Vector4::new(1.0, 2.0, 3.0, 0.5));
    }

    #[test]
    fn wind_adds_body_acceleration() {
        assert!(DisturbancePreset::None.build().is_none());

        let wind = DisturbancePreset::ConstantWind {
            acceleration: [0.1, 0.0, -0.2],
        }
        .build()
        .unwrap();
        let extra = wind(&DVector::zeros(STATE_DIM), 0.0);
        assert_eq!(extra[VEL], 0.1);
        assert_eq!(extra[VEL + 2], -0.2);
        assert_eq!(extra.rows(0, VEL).amax(), 0.0);
    }

    #[test]
    fn presets_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            reference: ReferencePreset,
            disturbance: DisturbancePreset,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            reference = { type = "circle", radius = 1.0, omega = 0.5, altitude = 1.0 }
            disturbance = { type = "constant_wind", acceleration = [0.0, 0.1, 0.0] }
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.reference,
            ReferencePreset::Circle {
                radius: 1.0,
                omega: 0.5,
                altitude: 1.0
            }
        );
        assert!(matches!(parsed.disturbance, DisturbancePreset::ConstantWind { .. }));
    }
}
