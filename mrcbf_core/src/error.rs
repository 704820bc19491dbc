use thiserror::Error;

/// Construction-time validation failures. Always fatal, never defaulted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid rate ratio: fast_rate {fast} is not a positive integer multiple of slow_rate {slow}")]
    InvalidRateRatio { slow: f64, fast: f64 },

    #[error("Non-positive physical parameter {name}: {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },

    #[error("Degenerate obstacle: {0}")]
    DegenerateObstacle(String),

    #[error("Matrix {name} has shape {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    MatrixShape {
        name: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("Matrix {0} is not symmetric")]
    NotSymmetric(&'static str),

    #[error("Matrix {0} is not positive definite")]
    NotPositiveDefinite(&'static str),

    #[error("Dimension mismatch for {name}: expected {expected}, got {got}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Checks that `value` is finite and strictly positive.
pub fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositiveParameter { name, value })
    }
}

/// Runtime failures of the control stack. Deterministic, so never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("Infeasible safety constraint: {0}")]
    InfeasibleSafetyConstraint(String),

    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("Riccati iteration did not converge after {iterations} iterations (residual {residual:e})")]
    RiccatiDidNotConverge { iterations: usize, residual: f64 },

    #[error("QP solver error: {0}")]
    Solver(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ControlError {
    /// True for failures that mean the vehicle would leave (or already left) a safe set.
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self,
            ControlError::InfeasibleSafetyConstraint(_) | ControlError::NumericalDegeneracy(_)
        )
    }
}

/// Failures that halt a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Controller failed at t={time}: {source}")]
    Controller {
        time: f64,
        #[source]
        source: ControlError,
    },

    #[error("State diverged at t={time}: non-finite value in state")]
    Diverged { time: f64 },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
