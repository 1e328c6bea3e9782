//! One selection run, start to finish.
//!
//! validate -> read history -> derive probability -> select -> log attempt
//! -> persist selections -> downgrade the attempt if persisting failed.
//!
//! Every run writes exactly one attempt record, whatever happened upstream.
//! Only a failure to write that record is returned as an error; everything
//! else is reported through the attempt's status and message.
//!
//! Runs against the same store must be serialized by the deployment. Two
//! concurrent runs can both read history before either writes; the unique
//! index on the selected id then rejects the second writer, which surfaces as
//! a persistence failure on its attempt.

use serde::Serialize;
use thiserror::Error;

use crate::batch::{CandidateRecord, RawRecord, ValidationError, Validator};
use crate::config::{ConfigError, SamplerConfig, SamplingRates};
use crate::history::{load_history, HistoryPolicy, HistoryStore};
use crate::selection::{
    derive_probability, DerivedProbability, RandomSource, SelectionCounters, SelectionEngine,
    SystemRandom,
};
use crate::store::{AttemptLog, ResultPersister, SqliteStore, StoreError};
use crate::types::attempt::{AttemptEntry, AttemptStatus};
use crate::types::identifiers::{AttemptId, RecordId};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("Failed to log selection attempt for batch {batch_label}: {source}")]
    AttemptNotLogged {
        batch_label: String,
        #[source]
        source: StoreError,
    },
}

/// Why a run produced no selection.
#[derive(Debug, Error)]
enum RunFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Selection history unavailable: {0}")]
    History(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Derivation(#[from] ConfigError),
}

struct Evaluation {
    chosen: Vec<CandidateRecord>,
    counters: SelectionCounters,
    probability: DerivedProbability,
}

/// What the caller learns about a run whose attempt was logged.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub attempt_id: AttemptId,
    pub batch_label: String,
    pub status: AttemptStatus,
    pub message: String,
    pub pool_size: usize,
    pub counters: SelectionCounters,
    /// Derived inclusion probability; `None` when the run failed before deriving it.
    pub probability: Option<f64>,
    /// Ids durably saved for this attempt. Empty unless the run succeeded.
    pub selected: Vec<RecordId>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }
}

pub struct Sampler<S, R> {
    store: S,
    engine: SelectionEngine<R>,
    validator: Validator,
    rates: SamplingRates,
    history_policy: HistoryPolicy,
}

impl Sampler<SqliteStore, SystemRandom> {
    /// A production sampler over the configured SQLite database.
    pub fn from_config(config: &SamplerConfig) -> Result<Self, ConfigError> {
        let rates = config.rates()?;
        Ok(Sampler::new(SqliteStore::new(config.database.path.clone()), rates)
            .with_history_policy(config.sampling.on_history_unavailable))
    }
}

impl<S> Sampler<S, SystemRandom> {
    pub fn new(store: S, rates: SamplingRates) -> Self {
        Self {
            store,
            engine: SelectionEngine::default(),
            validator: Validator::default(),
            rates,
            history_policy: HistoryPolicy::default(),
        }
    }
}

impl<S, R> Sampler<S, R>
where
    S: HistoryStore + AttemptLog + ResultPersister,
    R: RandomSource,
{
    pub fn with_random<R2: RandomSource>(self, random: R2) -> Sampler<S, R2> {
        Sampler {
            store: self.store,
            engine: SelectionEngine::new(random),
            validator: self.validator,
            rates: self.rates,
            history_policy: self.history_policy,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.history_policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &SelectionEngine<R> {
        &self.engine
    }

    pub fn rates(&self) -> SamplingRates {
        self.rates
    }

    /// Run one batch. `Ok` means an attempt record was written; read its
    /// status for the outcome.
    pub fn run(&mut self, batch_label: &str, batch: &[RawRecord]) -> Result<RunReport, SamplerError> {
        let pool_size = batch.len();
        tracing::info!(
            batch_label,
            pool_size,
            target_rate = self.rates.target_overall_rate(),
            estimated_eligible_ratio = self.rates.estimated_eligible_ratio(),
            "starting selection"
        );

        let (status, message, chosen, counters, probability) = match self.evaluate(batch) {
            Ok(evaluation) => {
                let message = evaluation.counters.summary();
                tracing::info!(batch_label, "{message}");
                (
                    AttemptStatus::Success,
                    message,
                    evaluation.chosen,
                    evaluation.counters,
                    Some(evaluation.probability.value),
                )
            }
            Err(failure) => {
                let message = failure.to_string();
                tracing::error!(batch_label, "{message}");
                (
                    AttemptStatus::Error,
                    message,
                    Vec::new(),
                    SelectionCounters::default(),
                    None,
                )
            }
        };

        let entry = AttemptEntry {
            batch_label: batch_label.to_string(),
            status,
            message,
            selected_count: chosen.len(),
            pool_size,
            eligibility_ratio_used: self.rates.estimated_eligible_ratio(),
        };
        let attempt_id = self.store.log_attempt(&entry).map_err(|source| {
            tracing::error!(batch_label, error = %source, "failed to log selection attempt");
            SamplerError::AttemptNotLogged {
                batch_label: batch_label.to_string(),
                source,
            }
        })?;

        let mut report = RunReport {
            attempt_id,
            batch_label: entry.batch_label,
            status: entry.status,
            message: entry.message,
            pool_size,
            counters,
            probability,
            selected: Vec::new(),
        };

        if report.status != AttemptStatus::Success {
            tracing::warn!(batch_label, %attempt_id, "batch finished with ERROR, nothing saved");
            return Ok(report);
        }

        match self.store.persist(&chosen, attempt_id) {
            Ok(()) => {
                report.selected = chosen.into_iter().map(|r| r.id).collect();
            }
            Err(err) => {
                let message = match &err {
                    StoreError::DuplicateSelection(id) => format!(
                        "Integrity error: failed to save selections, id {id} already selected. Selected: {}",
                        chosen.len()
                    ),
                    other => format!("Failed to save selections: {other}"),
                };
                tracing::error!(batch_label, %attempt_id, error = %err, "failed to save selected records");
                if let Err(downgrade_err) = self.store.downgrade_attempt(attempt_id, &message) {
                    tracing::error!(
                        %attempt_id,
                        error = %downgrade_err,
                        "failed to downgrade attempt after save failure"
                    );
                }
                report.status = AttemptStatus::Error;
                report.message = message;
            }
        }

        Ok(report)
    }

    fn evaluate(&mut self, batch: &[RawRecord]) -> Result<Evaluation, RunFailure> {
        let candidates = self.validator.validate(batch)?;
        tracing::debug!(records = candidates.len(), "input batch validated");

        let history = load_history(&self.store, self.history_policy)?;

        let probability = derive_probability(
            self.rates.target_overall_rate(),
            self.rates.estimated_eligible_ratio(),
        )?;
        tracing::info!(probability = probability.value, "derived per-record inclusion probability");

        let outcome = self.engine.select(&candidates, &history, probability.value);

        Ok(Evaluation {
            chosen: outcome.chosen,
            counters: outcome.counters,
            probability,
        })
    }
}
