//! Kick-drift-kick integration under pairwise Newtonian gravity.
//!
//! Two force models are provided. `Summed` is the standard velocity-Verlet
//! step over the whole system. `PairwiseOverwrite` walks every ordered pair
//! and lets each pairing overwrite the body's acceleration, applying it
//! immediately. It is physically inconsistent beyond two bodies but is kept
//! so older trajectories can be reproduced exactly.


use super::SimulationError;
use super::body::{Body, BodyId, BodySpec};
use crate::frame::Frame;
use crate::vector::Vector3;

/// Gravitational constant in simulation units.
pub const G: f64 = 6.67e-11;

/// How pairwise contributions are combined within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ForceModel {
    /// Sum every pairwise contribution before the second half kick.
    #[default]
    Summed,
    /// Kick, drift and overwrite the acceleration once per ordered pair.
    #[value(name = "pairwise")]
    PairwiseOverwrite,
}

impl std::str::FromStr for ForceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summed" => Ok(ForceModel::Summed),
            "pairwise" | "pairwise-overwrite" => Ok(ForceModel::PairwiseOverwrite),
            _ => Err(format!("Invalid force model: {s}")),
        }
    }
}

impl std::fmt::Display for ForceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForceModel::Summed => write!(f, "summed"),
            ForceModel::PairwiseOverwrite => write!(f, "pairwise"),
        }
    }
}

/// Acceleration that a mass at `source` induces on a body at `target`.
///
/// No softening: coincident positions yield non-finite components.
pub fn gravitational_acceleration(source: Vector3, source_mass: f64, target: Vector3) -> Vector3 {
    let delta = source - target;
    let inv_r3 = delta.norm_squared().powf(-1.5);
    delta * (inv_r3 * source_mass * G)
}

/// Ordered set of bodies plus the stepping rule.
///
/// Bodies may only be appended before the first step. The per-step
/// acceleration buffer is sized once, when the set freezes.
#[derive(Debug, Clone)]
pub struct Simulation {
    bodies: Vec<Body>,
    force_model: ForceModel,
    accelerations: Vec<Vector3>,
    frozen: bool,
    steps_taken: u64,
}

impl Simulation {
    /// Upper bound on bodies, set by the width of [`BodyId`].
    pub const MAX_BODIES: usize = BodyId::MAX as usize;

    pub fn new(force_model: ForceModel) -> Self {
        Self {
            bodies: Vec::new(),
            force_model,
            accelerations: Vec::new(),
            frozen: false,
            steps_taken: 0,
        }
    }

    /// Builds a simulation from initial conditions, in order.
    ///
    /// # Errors
    /// - `SimulationError::EmptyConfiguration` - `specs` is empty
    /// - `SimulationError::NonPositiveMass` - Some spec has mass <= 0
    /// - `SimulationError::TooManyBodies` - More specs than ids available
    pub fn from_specs(specs: &[BodySpec], force_model: ForceModel) -> Result<Self, SimulationError> {
        if specs.is_empty() {
            return Err(SimulationError::EmptyConfiguration);
        }

        let mut simulation = Self::new(force_model);
        for spec in specs {
            simulation.add_body(spec.mass, spec.position.into(), spec.velocity.into())?;
        }
        Ok(simulation)
    }

    /// Appends a body at rest acceleration and returns its id.
    ///
    /// Ids run 1, 2, 3, ... in insertion order and are never reused.
    ///
    /// # Errors
    /// - `SimulationError::NonPositiveMass` - `mass` is not strictly positive
    /// - `SimulationError::TooManyBodies` - Id space exhausted
    /// - `SimulationError::Frozen` - The simulation has already stepped
    pub fn add_body(
        &mut self,
        mass: f64,
        position: Vector3,
        velocity: Vector3,
    ) -> Result<BodyId, SimulationError> {
        if self.frozen {
            return Err(SimulationError::Frozen);
        }
        // Also rejects NaN.
        if !(mass > 0.0) {
            return Err(SimulationError::NonPositiveMass { mass });
        }
        if self.bodies.len() >= Self::MAX_BODIES {
            return Err(SimulationError::TooManyBodies {
                limit: Self::MAX_BODIES,
            });
        }

        let id = (self.bodies.len() + 1) as BodyId;
        self.bodies.push(Body::new(id, mass, position, velocity));
        Ok(id)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn force_model(&self) -> ForceModel {
        self.force_model
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Sum of `m * v` over all bodies.
    pub fn total_momentum(&self) -> Vector3 {
        self.bodies
            .iter()
            .fold(Vector3::ZERO, |total, body| total + body.momentum())
    }

    /// Advances every body by `dt`.
    ///
    /// The first call freezes the body set. Non-finite results are not
    /// trapped here; they surface as degenerate frames.
    pub fn step(&mut self, dt: f64) {
        self.freeze();
        match self.force_model {
            ForceModel::Summed => self.step_summed(dt),
            ForceModel::PairwiseOverwrite => self.step_pairwise(dt),
        }
        self.steps_taken += 1;
    }

    /// Captures ids and positions in simulation order.
    pub fn snapshot_frame(&self) -> Frame {
        let mut ids = Vec::with_capacity(self.bodies.len());
        let mut positions = Vec::with_capacity(self.bodies.len() * 3);
        for body in &self.bodies {
            ids.push(body.id);
            positions.extend_from_slice(&body.position.to_array());
        }
        Frame::from_snapshot(ids, positions)
    }

    fn freeze(&mut self) {
        if !self.frozen {
            self.frozen = true;
            self.accelerations = vec![Vector3::ZERO; self.bodies.len()];
        }
    }

    fn step_summed(&mut self, dt: f64) {
        debug_assert_eq!(self.accelerations.len(), self.bodies.len());

        for body in &mut self.bodies {
            body.velocity += body.acceleration * dt * 0.5;
            body.position += body.velocity * dt;
        }

        for (i, slot) in self.accelerations.iter_mut().enumerate() {
            let target = self.bodies[i].position;
            *slot = self
                .bodies
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold(Vector3::ZERO, |total, (_, source)| {
                    total + gravitational_acceleration(source.position, source.mass, target)
                });
        }

        for (body, acceleration) in self.bodies.iter_mut().zip(&self.accelerations) {
            body.acceleration = *acceleration;
            body.velocity += body.acceleration * dt * 0.5;
        }
    }

    fn step_pairwise(&mut self, dt: f64) {
        let count = self.bodies.len();
        for i in 0..count {
            for j in 0..count {
                if i == j {
                    continue;
                }

                let source_position = self.bodies[j].position;
                let source_mass = self.bodies[j].mass;
                let body = &mut self.bodies[i];

                body.velocity += body.acceleration * dt * 0.5;
                body.position += body.velocity * dt;
                body.acceleration =
                    gravitational_acceleration(source_position, source_mass, body.position);
                body.velocity += body.acceleration * dt * 0.5;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_body(force_model: ForceModel) -> Simulation {
        let mut simulation = Simulation::new(force_model);
        simulation
            .add_body(5e8, Vector3::ZERO, Vector3::ZERO)
            .expect("valid body");
        simulation
            .add_body(2.0, Vector3::new(5.0, 0.0, 0.0), Vector3::new(0.0, -0.03, 0.0))
            .expect("valid body");
        simulation
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-12 * expected.abs().max(1e-300);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected:e}, got {actual:e}"
        );
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut simulation = Simulation::new(ForceModel::Summed);
        let ids: Vec<BodyId> = (0..5)
            .map(|k| {
                simulation
                    .add_body(1.0 + k as f64, Vector3::new(k as f64, 0.0, 0.0), Vector3::ZERO)
                    .expect("valid body")
            })
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        simulation.step(1.0);
        assert_eq!(simulation.snapshot_frame().ids(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_non_positive_mass() {
        let mut simulation = Simulation::new(ForceModel::Summed);

        assert_eq!(
            simulation.add_body(0.0, Vector3::ZERO, Vector3::ZERO),
            Err(SimulationError::NonPositiveMass { mass: 0.0 })
        );
        assert!(matches!(
            simulation.add_body(f64::NAN, Vector3::ZERO, Vector3::ZERO),
            Err(SimulationError::NonPositiveMass { .. })
        ));
        assert!(simulation.is_empty());
    }

    #[test]
    fn test_body_set_freezes_on_first_step() {
        let mut simulation = two_body(ForceModel::Summed);
        simulation.step(1.0);

        assert_eq!(
            simulation.add_body(1.0, Vector3::new(9.0, 9.0, 9.0), Vector3::ZERO),
            Err(SimulationError::Frozen)
        );
        assert_eq!(simulation.len(), 2);
    }

    #[test]
    fn test_from_specs_requires_bodies() {
        assert_eq!(
            Simulation::from_specs(&[], ForceModel::Summed).unwrap_err(),
            SimulationError::EmptyConfiguration
        );
    }

    #[test]
    fn test_acceleration_points_at_source() {
        let acceleration =
            gravitational_acceleration(Vector3::ZERO, 5e8, Vector3::new(5.0, 0.0, 0.0));

        assert!(acceleration.x < 0.0);
        assert_eq!(acceleration.y, 0.0);
        assert_close(acceleration.x, -5e8 * G / 25.0);
    }

    #[test]
    fn test_coincident_bodies_produce_non_finite_state() {
        let mut simulation = Simulation::new(ForceModel::Summed);
        simulation.add_body(1.0, Vector3::ZERO, Vector3::ZERO).unwrap();
        simulation.add_body(1.0, Vector3::ZERO, Vector3::ZERO).unwrap();

        simulation.step(1.0);
        assert!(!simulation.bodies()[0].acceleration().is_finite());
        // Positions are drifted before forces are evaluated, so the NaN
        // reaches the frame one step later.
        assert!(!simulation.snapshot_frame().is_degenerate());

        simulation.step(1.0);
        assert!(simulation.snapshot_frame().is_degenerate());
    }

    #[test]
    fn test_pairwise_two_body_golden_positions() {
        let mut simulation = two_body(ForceModel::PairwiseOverwrite);
        let mut frames = Vec::new();
        for _ in 0..3 {
            simulation.step(1.0);
            frames.push(simulation.snapshot_frame());
        }

        let expected: [[f64; 6]; 3] = [
            [0.0, 0.0, 0.0, 5.0, -0.03, 0.0],
            [
                5.336e-12,
                0.0,
                0.0,
                4.9986660720327585,
                -0.05999199643219655,
                0.0,
            ],
            [
                1.6007711868977324e-11,
                -3.201427121389811e-14,
                0.0,
                4.995997720319442,
                -0.08996797764283998,
                0.0,
            ],
        ];

        for (frame, expected) in frames.iter().zip(expected.iter()) {
            assert_eq!(frame.ids(), &[1, 2]);
            for (actual, expected) in frame.positions().iter().zip(expected.iter()) {
                if *expected == 0.0 {
                    assert_eq!(*actual, 0.0);
                } else {
                    assert_close(*actual, *expected);
                }
            }
        }
    }

    #[test]
    fn test_summed_two_body_conserves_momentum() {
        let mut simulation = two_body(ForceModel::Summed);
        let initial = simulation.total_momentum();

        for _ in 0..2_000 {
            simulation.step(1.0);
        }

        let drift = (simulation.total_momentum() - initial).norm();
        assert!(drift < 1e-12, "momentum drifted by {drift:e}");
    }

    #[test]
    fn test_summed_accumulates_all_contributions() {
        // A body midway between two equal masses feels no net pull.
        let mut simulation = Simulation::new(ForceModel::Summed);
        simulation
            .add_body(1e9, Vector3::new(-10.0, 0.0, 0.0), Vector3::ZERO)
            .unwrap();
        simulation.add_body(1.0, Vector3::ZERO, Vector3::ZERO).unwrap();
        simulation
            .add_body(1e9, Vector3::new(10.0, 0.0, 0.0), Vector3::ZERO)
            .unwrap();

        simulation.step(1.0);

        assert_eq!(simulation.bodies()[1].acceleration(), Vector3::ZERO);
        assert_eq!(simulation.bodies()[1].position(), Vector3::ZERO);
    }

    #[test]
    fn test_force_model_parsing() {
        assert_eq!("summed".parse::<ForceModel>(), Ok(ForceModel::Summed));
        assert_eq!(
            "Pairwise".parse::<ForceModel>(),
            Ok(ForceModel::PairwiseOverwrite)
        );
        assert!("verlet".parse::<ForceModel>().is_err());
        assert_eq!(ForceModel::PairwiseOverwrite.to_string(), "pairwise");
    }
}
