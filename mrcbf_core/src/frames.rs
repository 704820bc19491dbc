// mrcbf_core/src/frames.rs

pub mod layout;

/// An enum that defines every variable that can exist in the vehicle state vector.
///
/// Positions are expressed in the world frame (z up), velocities and angular
/// rates in the body frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateVariable {
    // --- Cartesian Position ---
    Px,
    Py,
    Pz,
    // --- Orientation (ZYX Euler angles, body relative to world) ---
    Roll,
    Pitch,
    Yaw,
    // --- Cartesian Velocity ---
    Vx,
    Vy,
    Vz,
    // --- Angular Velocity ---
    Wx,
    Wy,
    Wz,
}

impl StateVariable {
    /// Short column label used by telemetry writers.
    pub fn label(&self) -> &'static str {
        match self {
            StateVariable::Px => "px",
            StateVariable::Py => "py",
            StateVariable::Pz => "pz",
            StateVariable::Roll => "roll",
            StateVariable::Pitch => "pitch",
            StateVariable::Yaw => "yaw",
            StateVariable::Vx => "vx",
            StateVariable::Vy => "vy",
            StateVariable::Vz => "vz",
            StateVariable::Wx => "wx",
            StateVariable::Wy => "wy",
            StateVariable::Wz => "wz",
        }
    }
}
