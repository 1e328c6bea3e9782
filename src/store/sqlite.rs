use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};

use crate::batch::CandidateRecord;
use crate::history::HistoryStore;
use crate::store::{
    AttemptLog, AttemptOrder, AttemptQuery, ResultPersister, SelectionFilter, StoreError,
};
use crate::types::attempt::{
    AttemptEntry, AttemptStatus, SelectedRecord, SelectedRecordView, SelectionAttempt,
};
use crate::types::identifiers::{AttemptId, RecordId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS selection_attempts (
        attempt_id INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_label TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('SUCCESS', 'ERROR')),
        message TEXT NOT NULL,
        selected_count INTEGER NOT NULL,
        pool_size INTEGER NOT NULL,
        eligibility_ratio_used REAL NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_selection_attempts_timestamp
    ON selection_attempts (timestamp);
    CREATE TABLE IF NOT EXISTS selected_records (
        record_key INTEGER PRIMARY KEY AUTOINCREMENT,
        attempt_id INTEGER NOT NULL REFERENCES selection_attempts (attempt_id),
        id TEXT NOT NULL UNIQUE,
        advisor_id TEXT NOT NULL,
        received_date TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_selected_records_id
    ON selected_records (id);
    CREATE INDEX IF NOT EXISTS idx_selected_records_attempt
    ON selected_records (attempt_id);
";

const ATTEMPT_COLUMNS: &str = "attempt_id, batch_label, status, message, selected_count, \
                               pool_size, eligibility_ratio_used, timestamp";

fn sql(context: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { context, source }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// Fixed width so lexical order in SQL matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
        })
}

fn has_table(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(sql("check table"))
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<SelectionAttempt> {
    let status: String = row.get(2)?;
    let status = status.parse::<AttemptStatus>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;
    let selected_count: i64 = row.get(4)?;
    let pool_size: i64 = row.get(5)?;
    let timestamp: String = row.get(7)?;
    Ok(SelectionAttempt {
        attempt_id: AttemptId::new(row.get(0)?),
        batch_label: row.get(1)?,
        status,
        message: row.get(3)?,
        selected_count: selected_count as usize,
        pool_size: pool_size as usize,
        eligibility_ratio_used: row.get(6)?,
        timestamp: parse_timestamp(7, &timestamp)?,
    })
}

/// SQLite-backed store for attempts and selected records.
///
/// Opens a fresh connection per operation so each call sees current truth.
/// Calls through one handle are serialized; separate processes are not, and
/// the unique index on the selected id is what rejects a concurrent
/// double-selection.
pub struct SqliteStore {
    db_path: PathBuf,
    lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn open_connection(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
                tracing::info!(dir = %parent.display(), "created directory for database");
            }
        }
        let conn = Connection::open(&self.db_path).map_err(sql("open sqlite db"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql("set journal_mode"))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(sql("set synchronous"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql("enable foreign keys"))?;
        conn.execute_batch(SCHEMA).map_err(sql("ensure schema"))?;
        Ok(conn)
    }

    /// Read-only connection for queries. `None` when the database file does
    /// not exist; reads never bring a store into existence.
    fn open_reader(&self) -> Result<Option<Connection>, StoreError> {
        if !self.db_path.exists() {
            return Ok(None);
        }
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map(Some)
        .map_err(sql("open sqlite db for reading"))
    }

    /// A reader over a store that has every table in `tables`.
    fn open_reader_with(&self, tables: &[&str]) -> Result<Option<Connection>, StoreError> {
        let Some(conn) = self.open_reader()? else {
            return Ok(None);
        };
        for table in tables {
            if !has_table(&conn, table)? {
                return Ok(None);
            }
        }
        Ok(Some(conn))
    }

    /// Create the database file and tables if they do not exist yet.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        self.open_connection()?;
        tracing::debug!(db = %self.db_path.display(), "database schema ready");
        Ok(())
    }

    pub fn list_attempts(&self, query: &AttemptQuery) -> Result<Vec<SelectionAttempt>, StoreError> {
        let _guard = self.guard()?;
        let Some(conn) = self.open_reader_with(&["selection_attempts"])? else {
            return Ok(Vec::new());
        };

        let mut clauses = Vec::new();
        let mut bounds = Vec::new();
        if let Some(since) = &query.since {
            clauses.push("timestamp >= ?");
            bounds.push(format_timestamp(since));
        }
        if let Some(until) = &query.until {
            clauses.push("timestamp <= ?");
            bounds.push(format_timestamp(until));
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let order = match query.order {
            AttemptOrder::NewestFirst => "timestamp DESC, attempt_id DESC",
            AttemptOrder::OldestFirst => "timestamp ASC, attempt_id ASC",
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM selection_attempts{filter} ORDER BY {order}"
            ))
            .map_err(sql("prepare attempt listing"))?;
        let rows = stmt
            .query_map(params_from_iter(bounds.iter()), attempt_from_row)
            .map_err(sql("query attempts"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql("decode attempt row"))?);
        }
        Ok(out)
    }

    pub fn get_attempt(&self, attempt_id: AttemptId) -> Result<Option<SelectionAttempt>, StoreError> {
        let _guard = self.guard()?;
        let Some(conn) = self.open_reader_with(&["selection_attempts"])? else {
            return Ok(None);
        };
        conn.query_row(
            &format!("SELECT {ATTEMPT_COLUMNS} FROM selection_attempts WHERE attempt_id = ?1"),
            params![attempt_id.get()],
            attempt_from_row,
        )
        .optional()
        .map_err(sql("read attempt"))
    }

    pub fn selected_for_attempt(&self, attempt_id: AttemptId) -> Result<Vec<SelectedRecord>, StoreError> {
        let _guard = self.guard()?;
        let Some(conn) = self.open_reader_with(&["selected_records"])? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn
            .prepare(
                "SELECT record_key, attempt_id, id, advisor_id, received_date
                 FROM selected_records
                 WHERE attempt_id = ?1
                 ORDER BY record_key ASC",
            )
            .map_err(sql("prepare selected listing"))?;
        let rows = stmt
            .query_map(params![attempt_id.get()], |row| {
                let id: String = row.get(2)?;
                Ok(SelectedRecord {
                    record_key: row.get(0)?,
                    attempt_id: AttemptId::new(row.get(1)?),
                    id: RecordId::new(id),
                    advisor_id: row.get(3)?,
                    received_date: row.get(4)?,
                })
            })
            .map_err(sql("query selected records"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql("decode selected row"))?);
        }
        Ok(out)
    }

    /// Selected records joined to their attempt, newest attempt first, then by id.
    pub fn selected_views(&self, filter: &SelectionFilter) -> Result<Vec<SelectedRecordView>, StoreError> {
        let _guard = self.guard()?;
        let Some(conn) = self.open_reader_with(&["selected_records", "selection_attempts"])? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn
            .prepare(
                "SELECT sr.id, sr.advisor_id, sr.received_date, sa.attempt_id,
                        sa.batch_label, sa.timestamp
                 FROM selected_records sr
                 JOIN selection_attempts sa ON sr.attempt_id = sa.attempt_id
                 WHERE (?1 IS NULL OR sa.batch_label = ?1)
                   AND (?2 IS NULL OR sa.attempt_id = ?2)
                 ORDER BY sa.timestamp DESC, sa.attempt_id DESC, sr.id ASC",
            )
            .map_err(sql("prepare selected view"))?;
        let rows = stmt
            .query_map(
                params![filter.batch_label, filter.attempt_id.map(AttemptId::get)],
                |row| {
                    let id: String = row.get(0)?;
                    let timestamp: String = row.get(5)?;
                    Ok(SelectedRecordView {
                        id: RecordId::new(id),
                        advisor_id: row.get(1)?,
                        received_date: row.get(2)?,
                        attempt_id: AttemptId::new(row.get(3)?),
                        batch_label: row.get(4)?,
                        selection_timestamp: parse_timestamp(5, &timestamp)?,
                    })
                },
            )
            .map_err(sql("query selected view"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql("decode selected view row"))?);
        }
        Ok(out)
    }
}

impl HistoryStore for SqliteStore {
    fn member_ids(&self) -> Result<HashSet<RecordId>, StoreError> {
        let _guard = self.guard()?;
        let Some(conn) = self.open_reader()? else {
            tracing::warn!(
                db = %self.db_path.display(),
                "database not found while reading history, assuming no previous selections"
            );
            return Ok(HashSet::new());
        };
        if !has_table(&conn, "selected_records")? {
            tracing::warn!("'selected_records' table not found, assuming no previous selections");
            return Ok(HashSet::new());
        }

        let mut stmt = conn
            .prepare("SELECT id FROM selected_records")
            .map_err(sql("prepare history read"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql("query history"))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(RecordId::new(row.map_err(sql("decode history row"))?));
        }
        tracing::info!(previously_selected = ids.len(), "read selection history");
        Ok(ids)
    }
}

impl AttemptLog for SqliteStore {
    fn log_attempt(&self, entry: &AttemptEntry) -> Result<AttemptId, StoreError> {
        let _guard = self.guard()?;
        let conn = self.open_connection()?;
        let timestamp = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO selection_attempts
             (batch_label, status, message, selected_count, pool_size, eligibility_ratio_used, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.batch_label,
                entry.status.as_str(),
                entry.message,
                entry.selected_count as i64,
                entry.pool_size as i64,
                entry.eligibility_ratio_used,
                timestamp,
            ],
        )
        .map_err(sql("insert attempt"))?;
        let attempt_id = AttemptId::new(conn.last_insert_rowid());
        tracing::info!(
            batch_label = %entry.batch_label,
            status = %entry.status,
            eligibility_ratio = entry.eligibility_ratio_used,
            %attempt_id,
            "logged selection attempt"
        );
        Ok(attempt_id)
    }

    fn downgrade_attempt(&self, attempt_id: AttemptId, message: &str) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let conn = self.open_connection()?;
        let changed = conn
            .execute(
                "UPDATE selection_attempts SET status = ?1, message = ?2
                 WHERE attempt_id = ?3 AND status = ?4",
                params![
                    AttemptStatus::Error.as_str(),
                    message,
                    attempt_id.get(),
                    AttemptStatus::Success.as_str(),
                ],
            )
            .map_err(sql("downgrade attempt"))?;
        if changed == 1 {
            tracing::info!(%attempt_id, "downgraded attempt to ERROR");
            return Ok(());
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT attempt_id FROM selection_attempts WHERE attempt_id = ?1",
                params![attempt_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql("check attempt"))?;
        match exists {
            Some(_) => Err(StoreError::NotDowngradable(attempt_id)),
            None => Err(StoreError::UnknownAttempt(attempt_id)),
        }
    }
}

impl ResultPersister for SqliteStore {
    fn persist(&self, chosen: &[CandidateRecord], attempt_id: AttemptId) -> Result<(), StoreError> {
        if chosen.is_empty() {
            tracing::info!(%attempt_id, "no records selected, nothing to save");
            return Ok(());
        }

        let _guard = self.guard()?;
        let mut conn = self.open_connection()?;
        let tx = conn.transaction().map_err(sql("begin tx"))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO selected_records (attempt_id, id, advisor_id, received_date)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(sql("prepare selected insert"))?;
            for record in chosen {
                stmt.execute(params![
                    attempt_id.get(),
                    record.id.as_str(),
                    record.advisor_id,
                    record.received_date,
                ])
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        StoreError::DuplicateSelection(record.id.clone())
                    } else {
                        StoreError::Sqlite {
                            context: "insert selected record",
                            source: err,
                        }
                    }
                })?;
            }
        }
        // An early return above drops `tx` uncommitted, which rolls back every insert.
        tx.commit().map_err(sql("commit tx"))?;

        tracing::info!(%attempt_id, saved = chosen.len(), "saved selected records");
        Ok(())
    }
}
