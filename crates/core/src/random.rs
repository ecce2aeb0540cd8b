//! Injected randomness
//!
//! Selection and entropy draw from a caller-supplied generator so tests can
//! seed it and replay the same choices.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub type BoxedRng = Box<dyn RngCore + Send>;

/// Entropy-seeded generator for production use
pub fn default_rng() -> BoxedRng {
    Box::new(StdRng::from_entropy())
}

/// Deterministic generator for tests and reproducible runs
pub fn seeded_rng(seed: u64) -> BoxedRng {
    Box::new(StdRng::seed_from_u64(seed))
}
