// mrcbf_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::control::Controller;
pub use crate::models::dynamics::Dynamics;
pub use crate::obstacles::Obstacle;
pub use crate::utils::integrators::{Integrator, IntegratorKind};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::control::telemetry::{DebugEntry, DebugLog};
pub use crate::frames::StateVariable;
pub use crate::types::{Control, DisturbanceFn, ReferenceFn, State, CONTROL_DIM, STATE_DIM};

// --- Errors ---
pub use crate::error::{ConfigError, ControlError, SimulationError};

// --- Concrete Implementations (Export common ones for convenience) ---
pub use crate::control::barrier::{ClassK, EcbfGains, SafetyMargins};
pub use crate::control::multirate::{MultirateController, MultirateSettings};
pub use crate::control::pd::{PdController, PdGains, PdSettings, PoseReferenceFn};
pub use crate::control::planner::{HorizonPlanner, MpcWeights, PlanPacket, TerminalCost};
pub use crate::control::safety_filter::{FilterOutcome, SafetyFilter, SafetyFilterSettings};
pub use crate::models::dynamics::quadrotor::RigidBodyModel;
pub use crate::models::vehicle::{PropellerInertia, VehicleParameters};
pub use crate::obstacles::{ObstacleSet, SphereObstacle};
pub use crate::simulation::{linspace, SimulationLoop, SimulationResult, SpatialBounds};
