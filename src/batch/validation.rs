use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::batch::record::{
    CandidateRecord, RawRecord, FIELD_ADVISOR_ID, FIELD_BRANCH_NAME, FIELD_ID, FIELD_PAYLOAD,
    FIELD_PROTECTED_CLASS, FIELD_RECEIVED_DATE, REQUIRED_FIELDS,
};
use crate::types::identifiers::RecordId;

const PROTECTED_TOKENS: [&str; 4] = ["true", "1", "yes", "t"];
const UNPROTECTED_TOKENS: [&str; 5] = ["false", "0", "no", "f", ""];

// Tried in order; the first that parses wins.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// A single problem found in an input batch. Rows are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Input batch is empty")]
    EmptyBatch,

    #[error("Missing required fields: {} ({records} record(s) affected)", .fields.join(", "))]
    MissingFields { fields: Vec<String>, records: usize },

    #[error("Empty 'id' at row(s): {}", format_rows(.rows))]
    EmptyId { rows: Vec<usize> },

    #[error("Duplicate id(s) in input: {}", .ids.join(", "))]
    DuplicateIds { ids: Vec<String> },

    #[error("Invalid 'protected_class' value '{value}' at row {row} (expected one of true/false, 1/0, yes/no, t/f)")]
    InvalidProtectedClass { row: usize, value: String },

    #[error("Unparseable 'received_date' '{value}' at row {row}")]
    UnparseableDate { row: usize, value: String },

    #[error("Future 'received_date' {date} at row {row}")]
    FutureDate { row: usize, date: NaiveDate },

    #[error("'received_date' {date} at row {row} is before {}", earliest_received_date())]
    DateBeforeEarliest { row: usize, date: NaiveDate },
}

/// Every violation found in a batch, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Input data validation failed:{}", render(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn format_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("\n- {v}")).collect()
}

pub fn earliest_received_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Map a protected-class token to its flag. `None` means the token is not recognized.
pub fn parse_protected_class(raw: &str) -> Option<bool> {
    let token = raw.trim().to_lowercase();
    if PROTECTED_TOKENS.contains(&token.as_str()) {
        Some(true)
    } else if UNPROTECTED_TOKENS.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Parse a calendar date from the serializations feeds commonly produce.
/// Time-of-day and offsets are discarded.
pub fn parse_received_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Checks and normalizes an input batch against the record schema.
///
/// All checks run before the verdict so an operator sees every problem in one
/// pass. Only a structurally missing field short-circuits, since the remaining
/// checks cannot normalize a record without it.
///
/// Unless pinned with [`Validator::with_today`], the latest acceptable
/// received date is the local date at the moment `validate` is called.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    today: Option<NaiveDate>,
}

impl Validator {
    /// A validator that treats `today` as the latest acceptable received date.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    /// The date future-date checks compare against if validation ran now.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn validate(&self, batch: &[RawRecord]) -> Result<Vec<CandidateRecord>, ValidationError> {
        if batch.is_empty() {
            return Err(ValidationError {
                violations: vec![Violation::EmptyBatch],
            });
        }

        // 1. Structural check
        let mut missing: BTreeSet<&str> = BTreeSet::new();
        let mut records_missing = 0;
        for record in batch {
            let absent: Vec<&str> = REQUIRED_FIELDS
                .iter()
                .copied()
                .filter(|field| !record.contains(field))
                .collect();
            if !absent.is_empty() {
                records_missing += 1;
            }
            missing.extend(absent);
        }
        if !missing.is_empty() {
            // Keep the declared field order rather than alphabetical.
            let fields = REQUIRED_FIELDS
                .iter()
                .filter(|f| missing.contains(*f))
                .map(|f| f.to_string())
                .collect();
            return Err(ValidationError {
                violations: vec![Violation::MissingFields {
                    fields,
                    records: records_missing,
                }],
            });
        }

        // 2. Per-record normalization, accumulating violations
        let mut row_violations = Vec::new();
        let mut empty_id_rows = Vec::new();
        let mut candidates = Vec::with_capacity(batch.len());
        let earliest = earliest_received_date();
        let today = self.today();

        for (idx, record) in batch.iter().enumerate() {
            let row = idx + 1;
            let field = |name: &str| {
                record
                    .get(name)
                    .map(|v| v.to_trimmed_string())
                    .unwrap_or_default()
            };

            let id = field(FIELD_ID);
            if id.is_empty() {
                empty_id_rows.push(row);
            }

            let protected_raw = field(FIELD_PROTECTED_CLASS);
            let protected_class = match parse_protected_class(&protected_raw) {
                Some(flag) => flag,
                None => {
                    row_violations.push(Violation::InvalidProtectedClass {
                        row,
                        value: protected_raw,
                    });
                    false
                }
            };

            let date_raw = field(FIELD_RECEIVED_DATE);
            let received_date = if date_raw.is_empty() {
                String::new()
            } else {
                match parse_received_date(&date_raw) {
                    None => {
                        row_violations.push(Violation::UnparseableDate {
                            row,
                            value: date_raw,
                        });
                        String::new()
                    }
                    Some(date) if date > today => {
                        row_violations.push(Violation::FutureDate { row, date });
                        String::new()
                    }
                    Some(date) if date < earliest => {
                        row_violations.push(Violation::DateBeforeEarliest { row, date });
                        String::new()
                    }
                    Some(date) => date.format("%Y-%m-%d").to_string(),
                }
            };

            candidates.push(CandidateRecord {
                id: RecordId::new(id),
                protected_class,
                payload: field(FIELD_PAYLOAD),
                received_date,
                advisor_id: field(FIELD_ADVISOR_ID),
                branch_name: field(FIELD_BRANCH_NAME),
            });
        }

        let mut violations = Vec::with_capacity(row_violations.len() + 2);
        if !empty_id_rows.is_empty() {
            violations.push(Violation::EmptyId { rows: empty_id_rows });
        }
        let duplicates = duplicate_ids(&candidates);
        if !duplicates.is_empty() {
            violations.push(Violation::DuplicateIds { ids: duplicates });
        }
        violations.extend(row_violations);

        if violations.is_empty() {
            Ok(candidates)
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// Non-empty ids seen more than once, in order of first repetition.
fn duplicate_ids(candidates: &[CandidateRecord]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicates = Vec::new();
    for candidate in candidates {
        let id = candidate.id.as_str();
        if id.is_empty() {
            continue;
        }
        let count = seen.entry(id).or_default();
        *count += 1;
        if *count == 2 {
            duplicates.push(id.to_string());
        }
    }
    duplicates
}
