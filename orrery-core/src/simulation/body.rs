//! Physical state of a single point mass.

use serde::{Deserialize, Serialize};

use crate::vector::Vector3;

/// Stable body identifier. Assigned from 1 in insertion order.
pub type BodyId = u16;

/// One simulated point mass.
///
/// Mass and id are fixed at creation; the kinematic fields are rewritten by
/// every integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub(crate) id: BodyId,
    pub(crate) mass: f64,
    pub(crate) position: Vector3,
    pub(crate) velocity: Vector3,
    pub(crate) acceleration: Vector3,
}

impl Body {
    pub(crate) fn new(id: BodyId, mass: f64, position: Vector3, velocity: Vector3) -> Self {
        Self {
            id,
            mass,
            position,
            velocity,
            acceleration: Vector3::ZERO,
        }
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn velocity(&self) -> Vector3 {
        self.velocity
    }

    /// Acceleration computed by the most recent step (zero before the first).
    pub fn acceleration(&self) -> Vector3 {
        self.acceleration
    }

    /// Linear momentum `m * v`.
    pub fn momentum(&self) -> Vector3 {
        self.velocity * self.mass
    }
}

/// Initial conditions for one body, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub mass: f64,
    pub position: [f64; 3],
    #[serde(default)]
    pub velocity: [f64; 3],
}

impl BodySpec {
    pub const fn new(mass: f64, position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self {
            mass,
            position,
            velocity,
        }
    }
}
