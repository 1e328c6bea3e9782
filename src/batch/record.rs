use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::identifiers::RecordId;

pub const FIELD_ID: &str = "id";
pub const FIELD_PROTECTED_CLASS: &str = "protected_class";
pub const FIELD_PAYLOAD: &str = "payload";
pub const FIELD_RECEIVED_DATE: &str = "received_date";
pub const FIELD_ADVISOR_ID: &str = "advisor_id";
pub const FIELD_BRANCH_NAME: &str = "branch_name";

/// Fields every input record must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    FIELD_ID,
    FIELD_PROTECTED_CLASS,
    FIELD_PAYLOAD,
    FIELD_RECEIVED_DATE,
    FIELD_ADVISOR_ID,
    FIELD_BRANCH_NAME,
];

/// A loosely-typed field value as produced by a file reader or a JSON feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Null,
}

impl RawValue {
    /// Coerce to a trimmed string. Null becomes empty.
    pub fn to_trimmed_string(&self) -> String {
        match self {
            RawValue::String(s) => s.trim().to_string(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Integer(n) => n.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Null => String::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

/// One unvalidated input record: a string-keyed field map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    inner: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        RawRecord {
            inner: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.inner.insert(key.into(), value.into());
    }

    /// Builder form of [`RawRecord::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<RawValue> {
        self.inner.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.inner.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawValue)> {
        self.inner.iter()
    }
}

/// A validated, normalized application record.
///
/// Only the validator constructs these in a run; all fields are present and
/// trimmed, and `received_date` is either empty or `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: RecordId,
    pub protected_class: bool,
    /// Opaque; stored, never interpreted.
    pub payload: String,
    pub received_date: String,
    pub advisor_id: String,
    pub branch_name: String,
}
