//! Orrery Core - point-mass gravitation streamed as frames
//!
//! This crate holds the simulation engine (bodies, the kick-drift-kick
//! integrator and its force models) and the pipeline that turns each step
//! into a [`Frame`] and delivers ordered batches of frames to one client per
//! session over a [`FrameTransport`].

pub mod config;
pub mod frame;
pub mod simulation;
pub mod streaming;
pub mod tracing_setup;
pub mod vector;

// Re-export main types for convenient access
pub use config::{OrreryConfig, ServerConfig, SimulationConfig, StreamingConfig};
pub use frame::{Frame, decode_batch, encode_batch};
pub use simulation::{Body, BodyId, BodySpec, ForceModel, Simulation, SimulationError};
pub use streaming::{
    CloseReason, FrameProducer, FrameTransport, ProducerEvent, ProducerHandle, SessionReport,
    StreamSession, StreamingError,
};
pub use vector::Vector3;

/// Errors that can bubble up from any Orrery subsystem.
#[derive(Debug, thiserror::Error)]
pub enum OrreryError {
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Body file error: {0}")]
    BodyFile(#[from] serde_json::Error),
}

impl OrreryError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            OrreryError::Simulation(e) => match e {
                SimulationError::NonPositiveMass { mass } => {
                    format!("Every body needs a positive mass (found {mass})")
                }
                SimulationError::InvalidTimeStep { dt } => {
                    format!("The time step must be a positive number (found {dt})")
                }
                SimulationError::EmptyConfiguration => "No bodies to simulate".to_string(),
                _ => "Simulation setup failed".to_string(),
            },
            OrreryError::Streaming(StreamingError::Transport { .. }) => {
                "Connection to the client was lost".to_string()
            }
            OrreryError::Streaming(_) => "Streaming error occurred".to_string(),
            OrreryError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            OrreryError::Io(_) => "File system error occurred".to_string(),
            OrreryError::BodyFile(e) => format!("Could not read body definitions: {e}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            OrreryError::Configuration { .. }
                | OrreryError::BodyFile(_)
                | OrreryError::Simulation(
                    SimulationError::NonPositiveMass { .. }
                        | SimulationError::InvalidTimeStep { .. }
                        | SimulationError::EmptyConfiguration
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, OrreryError>;

/// Reads a JSON array of [`BodySpec`]s.
///
/// # Errors
/// - `OrreryError::Io` - File could not be read
/// - `OrreryError::BodyFile` - Content is not a valid body list
/// - `OrreryError::Configuration` - The list is empty
pub fn load_bodies(path: &std::path::Path) -> Result<Vec<BodySpec>> {
    let text = std::fs::read_to_string(path)?;
    let bodies: Vec<BodySpec> = serde_json::from_str(&text)?;
    if bodies.is_empty() {
        return Err(OrreryError::Configuration {
            reason: format!("{} contains no bodies", path.display()),
        });
    }
    Ok(bodies)
}
