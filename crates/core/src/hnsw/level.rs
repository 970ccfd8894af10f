//! Random level assignment for new nodes.
//!
//! Levels follow `floor(-ln(U) * lambda)` with `U` uniform in (0, 1] and
//! `lambda = 1 / ln(M)`, so each level holds roughly `1/M` of the level below.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exponentially distributed level generator.
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    rng: StdRng,
    lambda: f64,
    max_level: usize,
}

impl LevelGenerator {
    /// `max_level` is the highest level that may be returned (`layers_count - 1`).
    pub fn new(lambda: f64, max_level: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            lambda,
            max_level,
        }
    }

    /// Draw the top level for a new node.
    pub fn next_level(&mut self) -> usize {
        // gen::<f64>() is in [0, 1); flip to (0, 1] so ln() stays finite.
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.lambda).floor();
        if level.is_finite() && level >= 0.0 {
            (level as usize).min(self.max_level)
        } else {
            0
        }
    }
}
