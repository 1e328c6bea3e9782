//! The set of every id ever selected, across all attempts.
//!
//! History is a read-through view of durable storage: each call re-reads the
//! current truth and nothing is cached between runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::types::identifiers::RecordId;

pub trait HistoryStore {
    /// Every id present in the selected records, across all time.
    ///
    /// A store that does not exist yet, or exists without the selected-records
    /// table, yields an empty set rather than an error.
    fn member_ids(&self) -> Result<HashSet<RecordId>, StoreError>;
}

impl<T: HistoryStore + ?Sized> HistoryStore for &T {
    fn member_ids(&self) -> Result<HashSet<RecordId>, StoreError> {
        (**self).member_ids()
    }
}

/// What a run does when history cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Warn and continue as if nothing had ever been selected.
    #[default]
    AssumeEmpty,
    /// Fail the run; the attempt is logged as ERROR.
    Fail,
}

/// Read history, applying `policy` to read failures.
pub fn load_history<H: HistoryStore + ?Sized>(
    store: &H,
    policy: HistoryPolicy,
) -> Result<HashSet<RecordId>, StoreError> {
    match store.member_ids() {
        Ok(ids) => {
            tracing::debug!(previously_selected = ids.len(), "loaded selection history");
            Ok(ids)
        }
        Err(err) => match policy {
            HistoryPolicy::AssumeEmpty => {
                tracing::warn!(
                    error = %err,
                    "selection history unavailable, assuming no previous selections"
                );
                Ok(HashSet::new())
            }
            HistoryPolicy::Fail => Err(err),
        },
    }
}

/// A fixed history held in memory. Seeds tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct SeededHistory {
    ids: HashSet<RecordId>,
}

impl SeededHistory {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(RecordId::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl HistoryStore for SeededHistory {
    fn member_ids(&self) -> Result<HashSet<RecordId>, StoreError> {
        Ok(self.ids.clone())
    }
}
