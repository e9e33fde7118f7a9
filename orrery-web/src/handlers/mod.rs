//! HTTP request handlers organized by functionality

pub mod assets;
pub mod simulation;

pub use assets::static_asset;
pub use simulation::simulation_session;
