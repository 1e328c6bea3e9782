pub mod probability;
pub mod random;
pub mod sampling;

use std::collections::HashSet;

use crate::batch::CandidateRecord;
use crate::types::identifiers::RecordId;

pub use probability::{derive_probability, Clamp, DerivedProbability};
pub use random::{RandomSource, ScriptedRandom, SeededRandom, SystemRandom};
pub use sampling::{apply_selection, SelectionCounters, SelectionOutcome};

/// Per-record probabilistic selection over a validated batch.
///
/// The random source is a capability handed in at construction; nothing here
/// reaches for a global generator.
pub struct SelectionEngine<R> {
    random: R,
}

impl Default for SelectionEngine<SystemRandom> {
    fn default() -> Self {
        Self {
            random: SystemRandom::default(),
        }
    }
}

impl<R> SelectionEngine<R>
where
    R: RandomSource,
{
    pub fn new(random: R) -> Self {
        Self { random }
    }

    pub fn select(
        &mut self,
        batch: &[CandidateRecord],
        history: &HashSet<RecordId>,
        probability: f64,
    ) -> SelectionOutcome {
        let outcome = apply_selection(batch, history, probability, &mut self.random);

        debug_assert!(outcome.chosen.iter().all(|r| !r.protected_class));
        debug_assert!(outcome.chosen.iter().all(|r| !history.contains(&r.id)));

        outcome
    }

    pub fn random(&self) -> &R {
        &self.random
    }

    pub fn into_random(self) -> R {
        self.random
    }
}
