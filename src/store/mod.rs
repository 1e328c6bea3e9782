//! Durable storage of attempts and selected records.

pub mod sqlite;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::batch::CandidateRecord;
use crate::types::attempt::AttemptEntry;
use crate::types::identifiers::{AttemptId, RecordId};

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Id {0} has already been selected by an earlier attempt")]
    DuplicateSelection(RecordId),
    #[error("Attempt {0} not found")]
    UnknownAttempt(AttemptId),
    #[error("Attempt {0} is not SUCCESS and cannot be downgraded")]
    NotDowngradable(AttemptId),
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Writes exactly one attempt record per run.
pub trait AttemptLog {
    fn log_attempt(&self, entry: &AttemptEntry) -> Result<AttemptId, StoreError>;

    /// Flip a SUCCESS attempt to ERROR and replace its message.
    ///
    /// The only mutation an attempt ever receives, used when persisting its
    /// selections fails.
    fn downgrade_attempt(&self, attempt_id: AttemptId, message: &str) -> Result<(), StoreError>;
}

/// Appends the records chosen by an attempt.
pub trait ResultPersister {
    /// All-or-nothing. An empty `chosen` is a successful no-op.
    fn persist(&self, chosen: &[CandidateRecord], attempt_id: AttemptId) -> Result<(), StoreError>;
}

impl<T: AttemptLog + ?Sized> AttemptLog for &T {
    fn log_attempt(&self, entry: &AttemptEntry) -> Result<AttemptId, StoreError> {
        (**self).log_attempt(entry)
    }

    fn downgrade_attempt(&self, attempt_id: AttemptId, message: &str) -> Result<(), StoreError> {
        (**self).downgrade_attempt(attempt_id, message)
    }
}

impl<T: ResultPersister + ?Sized> ResultPersister for &T {
    fn persist(&self, chosen: &[CandidateRecord], attempt_id: AttemptId) -> Result<(), StoreError> {
        (**self).persist(chosen, attempt_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Timestamp window and ordering for listing attempts. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct AttemptQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub order: AttemptOrder,
}

/// Narrows the joined selected-record view.
#[derive(Debug, Clone, Default)]
pub struct SelectionFilter {
    pub batch_label: Option<String>,
    pub attempt_id: Option<AttemptId>,
}
