// mrcbf_core/src/obstacles/mod.rs

use dyn_clone::DynClone;
use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;

pub mod sphere;

pub use sphere::SphereObstacle;

/// Result of a clearance query against one obstacle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleQuery {
    /// Signed distance from the query point to the obstacle surface. Negative inside.
    pub distance: f64,
    /// Gradient of `distance` w.r.t. the query point. `None` where it is undefined
    /// (e.g. the exact center of a sphere); callers treat that as a violation.
    pub gradient: Option<Vector3<f64>>,
}

/// The contract for any geometric primitive the safety filter must keep clear of.
pub trait Obstacle: DynClone + Debug + Send + Sync {
    /// Signed distance from `point` to the surface.
    fn distance(&self, point: &Vector3<f64>) -> f64;

    /// ∂distance/∂point, or `None` where undefined.
    fn gradient(&self, point: &Vector3<f64>) -> Option<Vector3<f64>>;

    /// ∂²distance/∂point², or `None` where undefined.
    /// Needed because the clearance barrier has relative degree two.
    fn hessian(&self, point: &Vector3<f64>) -> Option<Matrix3<f64>>;

    fn query(&self, point: &Vector3<f64>) -> ObstacleQuery {
        ObstacleQuery {
            distance: self.distance(point),
            gradient: self.gradient(point),
        }
    }
}

dyn_clone::clone_trait_object!(Obstacle);

/// A read-only collection of obstacles.
#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    obstacles: Vec<Box<dyn Obstacle>>,
}

impl ObstacleSet {
    pub fn new(obstacles: Vec<Box<dyn Obstacle>>) -> Self {
        Self { obstacles }
    }

    /// An empty set; every clearance constraint is vacuously satisfied.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Obstacle> {
        self.obstacles.iter().map(|o| o.as_ref())
    }

    /// Per-obstacle queries, in insertion order.
    pub fn query(&self, point: &Vector3<f64>) -> Vec<ObstacleQuery> {
        self.iter().map(|o| o.query(point)).collect()
    }

    /// The worst-case (minimum clearance) query across the set. `None` for an empty set.
    pub fn min_clearance(&self, point: &Vector3<f64>) -> Option<ObstacleQuery> {
        self.iter()
            .map(|o| o.query(point))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}
