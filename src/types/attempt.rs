use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::identifiers::{AttemptId, RecordId};

/// Outcome of a selection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Success,
    Error,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Success => "SUCCESS",
            AttemptStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown attempt status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AttemptStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(AttemptStatus::Success),
            "ERROR" => Ok(AttemptStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// What the attempt logger writes. The store assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptEntry {
    pub batch_label: String,
    pub status: AttemptStatus,
    pub message: String,
    pub selected_count: usize,
    pub pool_size: usize,
    pub eligibility_ratio_used: f64,
}

/// One durable record of a single run.
///
/// Immutable once written, except for the single SUCCESS -> ERROR downgrade
/// performed when persisting the selected records fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionAttempt {
    pub attempt_id: AttemptId,
    pub batch_label: String,
    pub status: AttemptStatus,
    pub message: String,
    pub selected_count: usize,
    pub pool_size: usize,
    pub eligibility_ratio_used: f64,
    pub timestamp: DateTime<Utc>,
}

/// A record chosen for review, owned by the attempt that selected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRecord {
    pub record_key: i64,
    pub attempt_id: AttemptId,
    pub id: RecordId,
    pub advisor_id: String,
    /// `YYYY-MM-DD`, or empty when the input carried no date.
    pub received_date: String,
}

/// A selected record joined to its owning attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRecordView {
    pub id: RecordId,
    pub advisor_id: String,
    pub received_date: String,
    pub attempt_id: AttemptId,
    pub batch_label: String,
    pub selection_timestamp: DateTime<Utc>,
}
