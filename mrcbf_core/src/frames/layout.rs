// mrcbf_core/src/frames/layout.rs
use crate::frames::StateVariable;

/// Index of the first position entry.
pub const POS: usize = 0;
/// Index of the first Euler angle (roll).
pub const EULER: usize = 3;
/// Index of the first body-frame linear velocity entry.
pub const VEL: usize = 6;
/// Index of the first body-frame angular velocity entry.
pub const OMEGA: usize = 9;

/// Returns the 12-dimensional rigid-body state layout used throughout the crate.
///
/// The state is composed of:
/// - Position (3) in World Frame
/// - Orientation (3, roll/pitch/yaw, `R_wb = Rz(yaw) * Ry(pitch) * Rx(roll)`)
/// - Linear velocity (3) in Body Frame
/// - Angular velocity (3) in Body Frame
pub fn quadrotor_state_layout() -> Vec<StateVariable> {
    vec![
        // --- Position (World Frame) --- indices 0-2
        StateVariable::Px,
        StateVariable::Py,
        StateVariable::Pz,
        // --- Orientation --- indices 3-5
        StateVariable::Roll,
        StateVariable::Pitch,
        StateVariable::Yaw,
        // --- Linear Velocity (Body Frame) --- indices 6-8
        StateVariable::Vx,
        StateVariable::Vy,
        StateVariable::Vz,
        // --- Angular Velocity (Body Frame) --- indices 9-11
        StateVariable::Wx,
        StateVariable::Wy,
        StateVariable::Wz,
    ]
}
