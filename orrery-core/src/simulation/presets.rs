//! Ready-made initial conditions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::body::BodySpec;

/// A heavy central mass with a light body starting five units out.
pub fn two_body() -> Vec<BodySpec> {
    vec![
        BodySpec::new(5e8, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
        BodySpec::new(2.0, [5.0, 0.0, 0.0], [0.0, -0.03, 0.0]),
    ]
}

/// The default server scenario: the two-body pair plus three perturbers.
pub fn five_body() -> Vec<BodySpec> {
    let mut bodies = two_body();
    bodies.extend([
        BodySpec::new(1e4, [-12.0, 0.0, 0.0], [0.0, 0.015, 0.0]),
        BodySpec::new(1e6, [10.0, 0.0, -3.0], [0.0, -0.01, -0.01]),
        BodySpec::new(1e7, [20.0, 20.0, -12.0], [0.0, 0.0, 0.01]),
    ]);
    bodies
}

/// `count` bodies scattered in a 40-unit cube, reproducible from `seed`.
pub fn random_cluster(count: usize, seed: u64) -> Vec<BodySpec> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mass = rng.random_range(1e3..1e7);
            let position = [
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
                rng.random_range(-20.0..20.0),
            ];
            let velocity = [
                rng.random_range(-0.02..0.02),
                rng.random_range(-0.02..0.02),
                rng.random_range(-0.02..0.02),
            ];
            BodySpec::new(mass, position, velocity)
        })
        .collect()
}

/// Looks a preset up by name.
pub fn by_name(name: &str) -> Option<Vec<BodySpec>> {
    match name.to_lowercase().as_str() {
        "two-body" | "two_body" => Some(two_body()),
        "five-body" | "five_body" => Some(five_body()),
        _ => None,
    }
}
