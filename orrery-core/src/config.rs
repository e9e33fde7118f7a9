//! Centralized configuration for Orrery.
//!
//! Every tunable that shapes a run (bodies, step count, time step, channel
//! capacity, batch size, bind address) lives here instead of being baked
//! into the producer or the server.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use crate::simulation::{BodySpec, ForceModel, presets};

/// Central configuration for all Orrery components.
#[derive(Debug, Clone, Default)]
pub struct OrreryConfig {
    pub simulation: SimulationConfig,
    pub streaming: StreamingConfig,
    pub server: ServerConfig,
}

/// Initial conditions and stepping parameters for one run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Bodies in id order
    pub bodies: Vec<BodySpec>,
    /// Time advanced per step
    pub dt: f64,
    /// Steps per session (None = run until the client leaves)
    pub step_count: Option<u64>,
    /// How pairwise forces are combined
    pub force_model: ForceModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bodies: presets::five_body(),
            dt: 1.0,
            step_count: Some(15_000),
            force_model: ForceModel::Summed,
        }
    }
}

impl SimulationConfig {
    /// Checks bodies and time step before a producer is built.
    ///
    /// # Errors
    /// - `String` - Description of the first invalid setting
    pub fn validate(&self) -> Result<(), String> {
        if self.bodies.is_empty() {
            return Err("at least one body is required".to_string());
        }
        if let Some(spec) = self.bodies.iter().find(|spec| !(spec.mass > 0.0)) {
            return Err(format!("body mass must be positive, got {}", spec.mass));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(format!("dt must be finite and positive, got {}", self.dt));
        }
        Ok(())
    }
}

/// Channel and batching parameters for a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Frames buffered between producer and session
    pub channel_capacity: usize,
    /// Frames per outbound message
    pub batch_size: usize,
    /// Send the short final batch instead of dropping it
    pub flush_trailing_batch: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 60,
            batch_size: 60,
            flush_trailing_batch: false,
        }
    }
}

impl StreamingConfig {
    /// # Errors
    /// - `String` - Zero capacity or batch size
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_capacity == 0 {
            return Err("channel capacity must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Directory holding the browser client
    pub static_dir: PathBuf,
    /// Route of the frame streaming endpoint
    pub session_path: &'static str,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8822)),
            static_dir: PathBuf::from("orrery-web/static"),
            session_path: "/sim",
        }
    }
}

impl OrreryConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup` on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dt) = lookup("ORRERY_DT").and_then(|v| v.parse::<f64>().ok()) {
            config.simulation.dt = dt;
        }

        if let Some(steps) = lookup("ORRERY_STEPS") {
            match steps.as_str() {
                "0" | "unbounded" => config.simulation.step_count = None,
                other => {
                    if let Ok(count) = other.parse::<u64>() {
                        config.simulation.step_count = Some(count);
                    }
                }
            }
        }

        if let Some(model) = lookup("ORRERY_FORCE_MODEL").and_then(|v| v.parse().ok()) {
            config.simulation.force_model = model;
        }

        if let Some(capacity) =
            lookup("ORRERY_CHANNEL_CAPACITY").and_then(|v| v.parse::<usize>().ok())
        {
            config.streaming.channel_capacity = capacity;
        }

        if let Some(batch) = lookup("ORRERY_BATCH_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            config.streaming.batch_size = batch;
        }

        if let Some(flush) = lookup("ORRERY_FLUSH_TRAILING_BATCH") {
            config.streaming.flush_trailing_batch = flush.parse().unwrap_or(false);
        }

        if let Some(addr) = lookup("ORRERY_BIND").and_then(|v| v.parse::<SocketAddr>().ok()) {
            config.server.bind_address = addr;
        }

        if let Some(dir) = lookup("ORRERY_STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }

        config
    }

    /// Creates a configuration for fast deterministic tests.
    pub fn for_testing() -> Self {
        Self {
            simulation: SimulationConfig {
                bodies: presets::two_body(),
                step_count: Some(150),
                ..SimulationConfig::default()
            },
            streaming: StreamingConfig {
                channel_capacity: 8,
                batch_size: 10,
                flush_trailing_batch: false,
            },
            ..Default::default()
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    /// - `String` - Description of the first invalid setting
    pub fn validate(&self) -> Result<(), String> {
        self.simulation.validate()?;
        self.streaming.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_values() {
        let config = OrreryConfig::default();

        assert_eq!(config.simulation.bodies.len(), 5);
        assert_eq!(config.simulation.dt, 1.0);
        assert_eq!(config.simulation.step_count, Some(15_000));
        assert_eq!(config.simulation.force_model, ForceModel::Summed);
        assert_eq!(config.streaming.channel_capacity, 60);
        assert_eq!(config.streaming.batch_size, 60);
        assert!(!config.streaming.flush_trailing_batch);
        assert_eq!(config.server.bind_address.port(), 8822);
        assert_eq!(config.server.session_path, "/sim");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = OrreryConfig::from_lookup(lookup_from(&[
            ("ORRERY_DT", "0.5"),
            ("ORRERY_STEPS", "1500000"),
            ("ORRERY_FORCE_MODEL", "pairwise"),
            ("ORRERY_CHANNEL_CAPACITY", "120"),
            ("ORRERY_BATCH_SIZE", "30"),
            ("ORRERY_FLUSH_TRAILING_BATCH", "true"),
            ("ORRERY_BIND", "0.0.0.0:9000"),
            ("ORRERY_STATIC_DIR", "/srv/orrery"),
        ]));

        assert_eq!(config.simulation.dt, 0.5);
        assert_eq!(config.simulation.step_count, Some(1_500_000));
        assert_eq!(config.simulation.force_model, ForceModel::PairwiseOverwrite);
        assert_eq!(config.streaming.channel_capacity, 120);
        assert_eq!(config.streaming.batch_size, 30);
        assert!(config.streaming.flush_trailing_batch);
        assert_eq!(config.server.bind_address.to_string(), "0.0.0.0:9000");
        assert_eq!(config.server.static_dir, PathBuf::from("/srv/orrery"));
    }

    #[test]
    fn test_unbounded_steps_and_garbage_values() {
        let config = OrreryConfig::from_lookup(lookup_from(&[
            ("ORRERY_STEPS", "unbounded"),
            ("ORRERY_DT", "fast"),
            ("ORRERY_BATCH_SIZE", "-3"),
        ]));

        assert_eq!(config.simulation.step_count, None);
        assert_eq!(config.simulation.dt, 1.0);
        assert_eq!(config.streaming.batch_size, 60);
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let mut config = OrreryConfig::for_testing();
        config.streaming.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = OrreryConfig::for_testing();
        config.simulation.dt = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = OrreryConfig::for_testing();
        config.simulation.bodies[1].mass = -2.0;
        assert!(config.validate().unwrap_err().contains("-2"));

        let mut config = OrreryConfig::for_testing();
        config.simulation.bodies.clear();
        assert!(config.validate().is_err());
    }
}
