//! Compliance-review sample selection for insurance application batches.
//!
//! `review-sampler` validates a batch of candidate applications, derives a
//! per-record inclusion probability that hits a target overall rate despite
//! protected-class exclusions, never re-selects an id chosen by any earlier
//! batch, and durably records every attempt together with what it selected.

pub mod batch;
pub mod config;
pub mod history;
pub mod sampler;
pub mod selection;
pub mod store;
pub mod types;

pub use batch::{CandidateRecord, RawRecord, RawValue, ValidationError, Validator, Violation};
pub use config::{ConfigError, SamplerConfig, SamplingRates};
pub use history::{HistoryPolicy, HistoryStore, SeededHistory};
pub use sampler::{RunReport, Sampler, SamplerError};
pub use selection::{
    derive_probability, RandomSource, ScriptedRandom, SeededRandom, SelectionCounters,
    SelectionEngine, SystemRandom,
};
pub use store::{AttemptLog, AttemptQuery, ResultPersister, SelectionFilter, SqliteStore, StoreError};
pub use types::{AttemptId, AttemptStatus, RecordId, SelectedRecord, SelectedRecordView, SelectionAttempt};
