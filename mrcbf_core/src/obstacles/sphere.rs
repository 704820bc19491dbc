use nalgebra::{Matrix3, Vector3};

use crate::error::{require_positive, ConfigError};
use crate::obstacles::Obstacle;

/// Points closer than this to the center have no usable gradient.
const CENTER_TOLERANCE: f64 = 1e-12;

/// A solid sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereObstacle {
    center: Vector3<f64>,
    radius: f64,
}

impl SphereObstacle {
    pub fn new(center: Vector3<f64>, radius: f64) -> Result<Self, ConfigError> {
        if !center.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::DegenerateObstacle(format!(
                "sphere center {:?} is not finite",
                center.as_slice()
            )));
        }
        require_positive("radius", radius)?;
        Ok(Self { center, radius })
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Obstacle for SphereObstacle {
    fn distance(&self, point: &Vector3<f64>) -> f64 {
        (point - self.center).norm() - self.radius
    }

    fn gradient(&self, point: &Vector3<f64>) -> Option<Vector3<f64>> {
        let offset = point - self.center;
        let norm = offset.norm();
        (norm > CENTER_TOLERANCE).then(|| offset / norm)
    }

    fn hessian(&self, point: &Vector3<f64>) -> Option<Matrix3<f64>> {
        let offset = point - self.center;
        let norm = offset.norm();
        if norm <= CENTER_TOLERANCE {
            return None;
        }
        let n = offset / norm;
        Some((Matrix3::identity() - n * n.transpose()) / norm)
    }
}
