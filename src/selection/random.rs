use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// Source of independent uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Thread-local OS-seeded generator. Used for production runs.
#[derive(Debug, Clone, Default)]
pub struct SystemRandom {
    rng: ThreadRng,
}

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Reproducible generator: the same seed replays the same draws.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of draws, then keeps repeating the last one.
///
/// An empty script always draws `0.0`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    script: Vec<f64>,
    taken: usize,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: draws.into_iter().collect(),
            taken: 0,
        }
    }

    /// Number of draws consumed so far.
    pub fn draws_taken(&self) -> usize {
        self.taken
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        let draw = self
            .script
            .get(self.taken)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(0.0);
        self.taken += 1;
        draw
    }
}
