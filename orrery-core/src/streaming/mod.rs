//! Frame production and per-connection streaming.
//!
//! A [`FrameProducer`] steps a simulation on a blocking worker and pushes
//! one frame per step into a bounded channel, followed by a single
//! completion event. A [`StreamSession`] pulls fixed-size batches out of that
//! channel whenever the client asks for more and writes each batch as one
//! text message over a [`FrameTransport`].

pub mod producer;
pub mod session;
pub mod transport;

pub use producer::{FrameProducer, ProducerEvent, ProducerHandle, ProducerOutcome};
pub use session::{CloseReason, SessionReport, StreamSession};
pub use transport::{FrameTransport, MemoryClient, MemoryTransport};

/// Errors raised while producing, encoding or delivering frames.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Frame serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame producer failed: {reason}")]
    ProducerFault { reason: String },

    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Invalid streaming configuration: {reason}")]
    Configuration { reason: String },

    #[error("Simulation error: {0}")]
    Simulation(#[from] crate::simulation::SimulationError),
}
