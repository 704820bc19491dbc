// mrcbf_core/src/models/vehicle.rs

use nalgebra::Vector3;

use crate::error::{require_positive, ConfigError};

/// Optional gyroscopic coupling from the spinning propellers.
/// Selected once at construction; the dynamics match on it instead of checking for null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropellerInertia {
    /// Total rotational moment of the propellers about their spin axes (kg m^2).
    With(f64),
    Without,
}

/// Physical parameters of the quadrotor. Validated at construction, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleParameters {
    mass: f64,
    inertia: Vector3<f64>,
    thrust_factor: f64,
    drag_factor: f64,
    arm_length: f64,
    propeller: PropellerInertia,
}

impl VehicleParameters {
    /// Validates and builds the parameter set.
    ///
    /// # Arguments
    /// * `mass`: vehicle mass (kg).
    /// * `inertia`: principal moments of inertia `[Ixx, Iyy, Izz]` (kg m^2).
    /// * `thrust_factor`: `kf`, thrust per unit squared rotor speed.
    /// * `drag_factor`: `km`, reaction torque per unit squared rotor speed.
    /// * `arm_length`: distance from the center of mass to each rotor (m).
    /// * `propeller_inertia`: `Some(Jtp)` enables the gyroscopic term.
    pub fn new(
        mass: f64,
        inertia: Vector3<f64>,
        thrust_factor: f64,
        drag_factor: f64,
        arm_length: f64,
        propeller_inertia: Option<f64>,
    ) -> Result<Self, ConfigError> {
        require_positive("mass", mass)?;
        require_positive("inertia.x", inertia.x)?;
        require_positive("inertia.y", inertia.y)?;
        require_positive("inertia.z", inertia.z)?;
        require_positive("kf", thrust_factor)?;
        require_positive("km", drag_factor)?;
        require_positive("arm_length", arm_length)?;

        let propeller = match propeller_inertia {
            Some(jtp) => PropellerInertia::With(require_positive("propeller_inertia", jtp)?),
            None => PropellerInertia::Without,
        };

        Ok(Self {
            mass,
            inertia,
            thrust_factor,
            drag_factor,
            arm_length,
            propeller,
        })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inertia(&self) -> &Vector3<f64> {
        &self.inertia
    }

    pub fn thrust_factor(&self) -> f64 {
        self.thrust_factor
    }

    pub fn drag_factor(&self) -> f64 {
        self.drag_factor
    }

    pub fn arm_length(&self) -> f64 {
        self.arm_length
    }

    pub fn propeller(&self) -> PropellerInertia {
        self.propeller
    }
}
