// mrcbf_sim/src/simulation/config/structs.rs

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector3};
use serde::Deserialize;

use mrcbf_core::control::barrier::{ClassK, EcbfGains, SafetyMargins};
use mrcbf_core::control::multirate::MultirateSettings;
use mrcbf_core::control::pd::{PdGains, PdSettings};
use mrcbf_core::control::planner::{MpcWeights, TerminalCost};
use mrcbf_core::control::safety_filter::SafetyFilterSettings;
use mrcbf_core::error::ConfigError;
use mrcbf_core::models::vehicle::VehicleParameters;
use mrcbf_core::obstacles::{Obstacle, ObstacleSet, SphereObstacle};
use mrcbf_core::simulation::{linspace, SpatialBounds};
use mrcbf_core::types::{State, CONTROL_DIM, STATE_DIM};
use mrcbf_core::utils::integrators::IntegratorKind;

use crate::simulation::presets::{DisturbancePreset, ReferencePreset};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// Root of the data parsed from a `scenario.toml` file. Every section is
/// optional; a missing section or field takes the built-in default.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub controller: ControllerKind,
    pub simulation: SimulationSettings,
    pub vehicle: VehicleConfig,
    pub multirate: MultirateConfig,
    pub pd: PdConfig,
    // The TOML has `[[obstacles]]`, which becomes a Vec of ObstacleConfig.
    pub obstacles: ObstacleList,
    pub disturbance: DisturbancePreset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    #[default]
    Multirate,
    Pd,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Multirate => "multirate",
            ControllerKind::Pd => "pd",
        }
    }
}

// =========================================================================
// == Simulation ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Internal integration step, s.
    pub dt: f64,
    pub integrator: IntegratorKind,
    /// Half width of the cube the vehicle should stay in. `None` disables the check.
    pub bounds: Option<f64>,
    pub initial_state: Vec<f64>,
    pub query_times: TimeGrid,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dt: 0.01,
            integrator: IntegratorKind::Rk4,
            bounds: Some(2.0),
            initial_state: vec![0.0; STATE_DIM],
            query_times: TimeGrid::default(),
        }
    }
}

impl SimulationSettings {
    pub fn initial_state(&self) -> Result<State, ConfigError> {
        if self.initial_state.len() != STATE_DIM {
            return Err(ConfigError::DimensionMismatch {
                name: "initial_state",
                expected: STATE_DIM,
                got: self.initial_state.len(),
            });
        }
        Ok(DVector::from_column_slice(&self.initial_state))
    }

    pub fn bounds(&self) -> Result<Option<SpatialBounds>, ConfigError> {
        self.bounds.map(SpatialBounds::symmetric).transpose()
    }
}

/// `count` evenly spaced query times from `start` to `stop` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeGrid {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 5.0,
            count: 51,
        }
    }
}

impl TimeGrid {
    pub fn times(&self) -> Result<Vec<f64>, ConfigError> {
        if self.count == 0 || !(self.stop > self.start || self.count == 1) {
            return Err(ConfigError::invalid(
                "query_times",
                format!(
                    "need count >= 1 and stop > start, got {} points on [{}, {}]",
                    self.count, self.start, self.stop
                ),
            ));
        }
        Ok(linspace(self.start, self.stop, self.count))
    }
}

// =========================================================================
// == Vehicle ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    pub mass: f64,
    /// Principal moments of inertia `[Ixx, Iyy, Izz]`.
    pub inertia: [f64; 3],
    pub kf: f64,
    pub km: f64,
    pub arm_length: f64,
    /// Total propeller moment about the spin axes. Enables the gyroscopic term.
    pub propeller_inertia: Option<f64>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: [1.0, 1.0, 1.0],
            kf: 1.0,
            km: 1.0,
            arm_length: 0.1,
            propeller_inertia: None,
        }
    }
}

impl TryFrom<&VehicleConfig> for VehicleParameters {
    type Error = ConfigError;

    fn try_from(config: &VehicleConfig) -> Result<Self, Self::Error> {
        VehicleParameters::new(
            config.mass,
            Vector3::from(config.inertia),
            config.kf,
            config.km,
            config.arm_length,
            config.propeller_inertia,
        )
    }
}

// =========================================================================
// == Controllers ==
// =========================================================================

/// A square weight matrix, written either as its diagonal or row by row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MatrixConfig {
    Diagonal(Vec<f64>),
    Full(Vec<Vec<f64>>),
}

impl MatrixConfig {
    pub fn to_matrix(&self, name: &'static str, dim: usize) -> Result<DMatrix<f64>, ConfigError> {
        match self {
            MatrixConfig::Diagonal(diagonal) => {
                if diagonal.len() != dim {
                    return Err(ConfigError::DimensionMismatch {
                        name,
                        expected: dim,
                        got: diagonal.len(),
                    });
                }
                Ok(DMatrix::from_diagonal(&DVector::from_column_slice(diagonal)))
            }
            MatrixConfig::Full(rows) => {
                let n_cols = rows.first().map_or(0, Vec::len);
                if rows.len() != dim || rows.iter().any(|row| row.len() != dim) {
                    return Err(ConfigError::MatrixShape {
                        name,
                        rows: rows.len(),
                        cols: n_cols,
                        expected_rows: dim,
                        expected_cols: dim,
                    });
                }
                Ok(DMatrix::from_row_iterator(
                    dim,
                    dim,
                    rows.iter().flatten().copied(),
                ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultirateConfig {
    pub slow_rate: f64,
    pub fast_rate: f64,
    /// Class-K function for relative-degree-1 barriers.
    pub class_k: ClassK,
    pub c1: f64,
    pub c2: f64,
    pub safe_dist: f64,
    pub safe_rot: f64,
    pub safe_vel: f64,
    /// Planning steps (`mpc_T`).
    pub horizon: usize,
    pub q: MatrixConfig,
    pub r: MatrixConfig,
    /// Terminal cost. `None` uses the DARE solution.
    pub p: Option<MatrixConfig>,
    pub reference: ReferencePreset,
}

impl Default for MultirateConfig {
    fn default() -> Self {
        let mut q = vec![1.0; STATE_DIM];
        q[..3].fill(5.0);
        Self {
            slow_rate: 10.0,
            fast_rate: 100.0,
            class_k: ClassK::Linear { gain: 0.0001 },
            // Poles at -2 and -3.
            c1: 6.0,
            c2: 5.0,
            safe_dist: 0.05,
            safe_rot: 0.2,
            safe_vel: 100.0,
            horizon: 5,
            q: MatrixConfig::Diagonal(q),
            r: MatrixConfig::Diagonal(vec![0.01; CONTROL_DIM]),
            p: None,
            reference: ReferencePreset::Hover {
                position: [1.0, 0.0, 0.0],
                yaw: 0.0,
            },
        }
    }
}

impl TryFrom<&MultirateConfig> for MultirateSettings {
    type Error = ConfigError;

    fn try_from(config: &MultirateConfig) -> Result<Self, Self::Error> {
        config.class_k.validate()?;
        let weights = MpcWeights::new(
            config.q.to_matrix("mpc_Q", STATE_DIM)?,
            config.r.to_matrix("mpc_R", CONTROL_DIM)?,
        )?;
        let terminal = match &config.p {
            Some(p) => TerminalCost::Fixed(p.to_matrix("mpc_P", STATE_DIM)?),
            None => TerminalCost::Dare,
        };

        Ok(MultirateSettings {
            slow_rate: config.slow_rate,
            fast_rate: config.fast_rate,
            horizon: config.horizon,
            weights,
            terminal,
            filter: SafetyFilterSettings {
                class_k: config.class_k,
                gains: EcbfGains::new(config.c1, config.c2)?,
                margins: SafetyMargins::new(config.safe_dist, config.safe_rot, config.safe_vel)?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdConfig {
    /// Controller update period, s.
    pub dt: f64,
    pub kp_xyz: f64,
    pub kd_xyz: f64,
    pub kp_a: f64,
    pub kd_a: f64,
    /// Largest commanded roll or pitch, rad.
    pub max_tilt: f64,
    pub reference: ReferencePreset,
}

impl Default for PdConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            kp_xyz: 0.02,
            kd_xyz: 0.04,
            kp_a: 10.0,
            kd_a: 5.0,
            max_tilt: 0.5,
            reference: ReferencePreset::Circle {
                radius: 0.3,
                omega: 0.1,
                altitude: 0.0,
            },
        }
    }
}

impl From<&PdConfig> for PdSettings {
    fn from(config: &PdConfig) -> Self {
        PdSettings {
            gains: PdGains {
                kp_xyz: config.kp_xyz,
                kd_xyz: config.kd_xyz,
                kp_a: config.kp_a,
                kd_a: config.kd_a,
            },
            dt: config.dt,
            max_tilt: config.max_tilt,
        }
    }
}

// =========================================================================
// == Obstacles ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ObstacleConfig {
    Sphere { center: [f64; 3], radius: f64 },
}

impl ObstacleConfig {
    pub fn build(&self) -> Result<Box<dyn Obstacle>, ConfigError> {
        match self {
            ObstacleConfig::Sphere { center, radius } => {
                Ok(Box::new(SphereObstacle::new(Vector3::from(*center), *radius)?))
            }
        }
    }
}

/// The obstacle list, defaulting to a single sphere above the origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ObstacleList(pub Vec<ObstacleConfig>);

impl Default for ObstacleList {
    fn default() -> Self {
        Self(vec![ObstacleConfig::Sphere {
            center: [0.0, 0.0, 0.3],
            radius: 0.1,
        }])
    }
}

impl ObstacleList {
    pub fn build(&self) -> Result<Arc<ObstacleSet>, ConfigError> {
        let obstacles = self
            .0
            .iter()
            .map(ObstacleConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(ObstacleSet::new(obstacles)))
    }
}
