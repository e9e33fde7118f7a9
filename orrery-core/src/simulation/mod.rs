//! Point-mass gravitation: bodies, the integrator and ready-made scenarios.

pub mod body;
pub mod integrator;
pub mod presets;

pub use body::{Body, BodyId, BodySpec};
pub use integrator::{ForceModel, G, Simulation};

/// Errors raised while building or configuring a simulation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SimulationError {
    #[error("Body mass must be positive, got {mass}")]
    NonPositiveMass { mass: f64 },

    #[error("Simulation cannot hold more than {limit} bodies")]
    TooManyBodies { limit: usize },

    #[error("Bodies cannot be added once the simulation has started stepping")]
    Frozen,

    #[error("Time step must be finite and positive, got {dt}")]
    InvalidTimeStep { dt: f64 },

    #[error("Simulation needs at least one body")]
    EmptyConfiguration,
}
