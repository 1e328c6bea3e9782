pub mod attempt;
pub mod identifiers;

pub use attempt::{
    AttemptEntry, AttemptStatus, SelectedRecord, SelectedRecordView, SelectionAttempt,
    UnknownStatus,
};
pub use identifiers::{AttemptId, RecordId};
