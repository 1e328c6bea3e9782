use chrono::{Local, NaiveDate};
use review_sampler::batch::{
    parse_protected_class, parse_received_date, RawRecord, RawValue, Validator, Violation,
    REQUIRED_FIELDS,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn make_record(id: &str, protected: &str, date: &str) -> RawRecord {
    RawRecord::new()
        .with("id", id)
        .with("protected_class", protected)
        .with("payload", "<application/>")
        .with("received_date", date)
        .with("advisor_id", "ADV001")
        .with("branch_name", "North")
}

#[test]
fn valid_batch_is_normalized() {
    let batch = vec![
        RawRecord::new()
            .with("id", "  P-001 ")
            .with("protected_class", "Yes")
            .with("payload", " <xml/> ")
            .with("received_date", "2024-03-05 10:15:00")
            .with("advisor_id", " ADV9 ")
            .with("branch_name", "East "),
        make_record("P-002", "", ""),
    ];

    let candidates = Validator::with_today(today()).validate(&batch).unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].id.as_str(), "P-001");
    assert!(candidates[0].protected_class);
    assert_eq!(candidates[0].payload, "<xml/>");
    assert_eq!(candidates[0].received_date, "2024-03-05");
    assert_eq!(candidates[0].advisor_id, "ADV9");
    assert_eq!(candidates[0].branch_name, "East");

    assert!(!candidates[1].protected_class, "empty token means unprotected");
    assert_eq!(candidates[1].received_date, "", "empty date stays unset");
}

#[test]
fn protected_class_tokens() {
    for token in ["true", "TRUE", "1", "yes", "t", " T "] {
        assert_eq!(parse_protected_class(token), Some(true), "token {token:?}");
    }
    for token in ["false", "False", "0", "no", "f", ""] {
        assert_eq!(parse_protected_class(token), Some(false), "token {token:?}");
    }
    for token in ["2", "maybe", "-1", "1.5", "y"] {
        assert_eq!(parse_protected_class(token), None, "token {token:?}");
    }
}

#[test]
fn non_string_values_are_coerced() {
    let mut record = make_record("P-010", "0", "2024-01-01");
    record.insert("protected_class", RawValue::Bool(true));
    record.insert("advisor_id", RawValue::Integer(42));
    record.insert("payload", RawValue::Null);
    let mut numeric = make_record("P-011", "0", "2024-01-01");
    numeric.insert("protected_class", RawValue::Integer(0));

    let candidates = Validator::with_today(today())
        .validate(&[record, numeric])
        .unwrap();

    assert!(candidates[0].protected_class);
    assert_eq!(candidates[0].advisor_id, "42");
    assert_eq!(candidates[0].payload, "");
    assert!(!candidates[1].protected_class);
}

#[test]
fn accepted_date_serializations() {
    let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    for raw in [
        "2024-02-29",
        "2024/02/29",
        "02/29/2024",
        "2024-02-29 08:30:00",
        "2024-02-29T08:30:00.250",
        "2024-02-29T08:30:00+02:00",
        "2024-02-29T23:59:59Z",
    ] {
        assert_eq!(parse_received_date(raw), Some(expected), "input {raw:?}");
    }
    assert_eq!(parse_received_date("2024-02-30"), None);
    assert_eq!(parse_received_date("yesterday"), None);
    assert_eq!(parse_received_date(""), None);
}

#[test]
fn missing_field_fails_immediately() {
    let mut broken = make_record("P-001", "0", "2024-01-01");
    broken.remove("branch_name");
    broken.remove("payload");
    // Would otherwise also be reported as a duplicate and a bad token.
    let batch = vec![broken, make_record("P-001", "maybe", "2024-01-01")];

    let err = Validator::with_today(today()).validate(&batch).unwrap_err();

    assert_eq!(
        err.violations,
        vec![Violation::MissingFields {
            fields: vec!["payload".to_string(), "branch_name".to_string()],
            records: 1,
        }]
    );
    assert!(err.to_string().contains("payload, branch_name"));
}

#[test]
fn empty_batch_is_rejected() {
    let err = Validator::with_today(today()).validate(&[]).unwrap_err();
    assert_eq!(err.violations, vec![Violation::EmptyBatch]);
}

#[test]
fn every_violation_is_reported_together() {
    let batch = vec![
        make_record("", "0", "2024-01-01"),
        make_record("X", "0", "2024-01-01"),
        make_record("X", "0", "2024-01-02"),
        make_record("P-004", "0", "not-a-date"),
        make_record("P-005", "perhaps", "2024-01-01"),
        make_record("P-006", "0", "2025-07-01"),
        make_record("P-007", "0", "1999-12-31"),
    ];

    let err = Validator::with_today(today()).validate(&batch).unwrap_err();

    assert_eq!(
        err.violations,
        vec![
            Violation::EmptyId { rows: vec![1] },
            Violation::DuplicateIds {
                ids: vec!["X".to_string()]
            },
            Violation::UnparseableDate {
                row: 4,
                value: "not-a-date".to_string()
            },
            Violation::InvalidProtectedClass {
                row: 5,
                value: "perhaps".to_string()
            },
            Violation::FutureDate {
                row: 6,
                date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
            },
            Violation::DateBeforeEarliest {
                row: 7,
                date: NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()
            },
        ]
    );

    let message = err.to_string();
    assert!(message.starts_with("Input data validation failed:"));
    assert_eq!(message.lines().count(), 7);
    assert!(message.contains("Duplicate id(s) in input: X"));
    assert!(message.contains("not-a-date"));
}

#[test]
fn date_boundaries_are_inclusive() {
    let batch = vec![
        make_record("P-001", "0", "2000-01-01"),
        make_record("P-002", "0", "2025-06-30"),
    ];
    let candidates = Validator::with_today(today()).validate(&batch).unwrap();
    assert_eq!(candidates[0].received_date, "2000-01-01");
    assert_eq!(candidates[1].received_date, "2025-06-30");
}

#[test]
fn unpinned_validator_reads_the_clock_per_call() {
    let validator = Validator::default();
    let now = Local::now().date_naive();
    assert_eq!(validator.today(), now);

    // Built once and reused, it still accepts a record received today.
    let received = now.format("%Y-%m-%d").to_string();
    let candidates = validator
        .validate(&[make_record("P-001", "0", &received)])
        .unwrap();
    assert_eq!(candidates[0].received_date, received);

    let tomorrow = now.succ_opt().unwrap().format("%Y-%m-%d").to_string();
    let err = validator
        .validate(&[make_record("P-002", "0", &tomorrow)])
        .unwrap_err();
    assert!(matches!(err.violations[..], [Violation::FutureDate { row: 1, .. }]));
}

#[test]
fn pinned_validator_keeps_its_date() {
    let validator = Validator::with_today(today());
    assert_eq!(validator.today(), today());
    assert!(validator
        .validate(&[make_record("P-001", "0", "2025-07-01")])
        .is_err());
}

#[test]
fn violations_render_as_one_line_each() {
    let err = Validator::with_today(today())
        .validate(&[make_record("", "0", ""), make_record("", "0", "")])
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Input data validation failed:\n- Empty 'id' at row(s): 1, 2"
    );
    let source: &dyn std::error::Error = &err;
    assert!(source.source().is_none());
}

#[test]
fn required_fields_are_stable() {
    assert_eq!(
        REQUIRED_FIELDS,
        ["id", "protected_class", "payload", "received_date", "advisor_id", "branch_name"]
    );
}
