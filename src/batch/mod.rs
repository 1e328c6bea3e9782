pub mod record;
pub mod validation;

pub use record::{CandidateRecord, RawRecord, RawValue, REQUIRED_FIELDS};
pub use validation::{
    earliest_received_date, parse_protected_class, parse_received_date, ValidationError,
    Validator, Violation,
};
