use review_sampler::batch::CandidateRecord;
use review_sampler::history::{load_history, HistoryPolicy, HistoryStore, SeededHistory};
use review_sampler::store::{AttemptLog, ResultPersister, SqliteStore, StoreError};
use review_sampler::types::attempt::{AttemptEntry, AttemptStatus};
use review_sampler::RecordId;
use rusqlite::Connection;
use tempfile::tempdir;

fn make_candidate(id: &str) -> CandidateRecord {
    CandidateRecord {
        id: RecordId::new(id),
        protected_class: false,
        payload: String::new(),
        received_date: "2024-05-01".to_string(),
        advisor_id: "ADV001".to_string(),
        branch_name: "North".to_string(),
    }
}

fn success_entry(label: &str) -> AttemptEntry {
    AttemptEntry {
        batch_label: label.to_string(),
        status: AttemptStatus::Success,
        message: "ok".to_string(),
        selected_count: 0,
        pool_size: 0,
        eligibility_ratio_used: 0.8,
    }
}

#[test]
fn missing_database_reads_as_empty_and_is_not_created() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("sampler.db");
    let store = SqliteStore::new(&db);

    let ids = store.member_ids().unwrap();

    assert!(ids.is_empty());
    assert!(!db.exists(), "reading history must not create the database");
}

#[test]
fn missing_table_reads_as_empty() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("sampler.db");
    Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE TABLE unrelated (x INTEGER);")
        .unwrap();

    let store = SqliteStore::new(&db);
    assert!(store.member_ids().unwrap().is_empty());
}

#[test]
fn empty_table_reads_as_empty() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("sampler.db"));
    store.ensure_schema().unwrap();

    assert!(store.member_ids().unwrap().is_empty());
}

#[test]
fn history_spans_every_attempt_and_is_re_read_each_call() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("sampler.db"));

    let first = store.log_attempt(&success_entry("JAN")).unwrap();
    store
        .persist(&[make_candidate("A"), make_candidate("B")], first)
        .unwrap();
    assert_eq!(store.member_ids().unwrap().len(), 2);

    let second = store.log_attempt(&success_entry("FEB")).unwrap();
    store.persist(&[make_candidate("C")], second).unwrap();

    let ids = store.member_ids().unwrap();
    assert_eq!(ids.len(), 3);
    for id in ["A", "B", "C"] {
        assert!(ids.contains(&RecordId::new(id)));
    }
}

#[test]
fn read_only_database_still_yields_history() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("sampler.db");
    let store = SqliteStore::new(&db);
    let attempt = store.log_attempt(&success_entry("JAN")).unwrap();
    store.persist(&[make_candidate("A")], attempt).unwrap();

    let mut perms = std::fs::metadata(&db).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&db, perms).unwrap();

    let ids = load_history(&store, HistoryPolicy::Fail).unwrap();
    assert_eq!(ids.len(), 1);
    assert!(ids.contains(&RecordId::new("A")));
}

#[test]
fn unreadable_store_degrades_or_fails_by_policy() {
    let dir = tempdir().unwrap();
    // A directory where the database file should be.
    let db = dir.path().join("not-a-db");
    std::fs::create_dir(&db).unwrap();
    let store = SqliteStore::new(&db);

    assert!(matches!(store.member_ids(), Err(StoreError::Sqlite { .. })));

    let degraded = load_history(&store, HistoryPolicy::AssumeEmpty).unwrap();
    assert!(degraded.is_empty());

    assert!(load_history(&store, HistoryPolicy::Fail).is_err());
}

#[test]
fn seeded_history_is_a_drop_in_store() {
    let history = SeededHistory::new(["A", "B"]);
    assert_eq!(history.len(), 2);

    let ids = load_history(&history, HistoryPolicy::Fail).unwrap();
    assert!(ids.contains(&RecordId::new("A")));
    assert!(!ids.contains(&RecordId::new("C")));
}
