// ==========================================
// Product Feed Import - import run history repository
// ==========================================
// Table: import_run
// A row is inserted as `running`, receives counter checkpoints, and
// is closed exactly once. Writes to a terminal row are rejected.
// ==========================================

use crate::db::{format_ts, open_sqlite_connection, parse_ts};
use crate::domain::import_run::{ImportRun, RunCounters};
use crate::domain::types::RunStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub const INTERRUPTED_MESSAGE: &str = "import interrupted: the process stopped while the run was in progress";

const RUN_COLUMNS: &str = r#"
    id, feed_id, started_at, finished_at, status, total_items,
    processed, created, updated, skipped, errors, error_message
"#;

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<ImportRun> {
    let status: String = row.get(4)?;
    let status = status
        .parse::<RunStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let count = |idx: usize| -> rusqlite::Result<u64> { Ok(row.get::<_, i64>(idx)?.max(0) as u64) };

    Ok(ImportRun {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        started_at: parse_ts(&row.get::<_, String>(2)?).unwrap_or_else(Utc::now),
        finished_at: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_ts(&s)),
        status,
        total_items: row.get::<_, Option<i64>>(5)?.map(|t| t.max(0) as u64),
        counters: RunCounters {
            processed: count(6)?,
            created: count(7)?,
            updated: count(8)?,
            skipped: count(9)?,
            errors: count(10)?,
        },
        error_message: row.get(11)?,
    })
}

// ==========================================
// ImportRunRepository
// ==========================================
pub struct ImportRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportRunRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(RepositoryError::lock)
    }

    pub fn insert(&self, run: &ImportRun) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO import_run ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RUN_COLUMNS
            ),
            params![
                run.id,
                run.feed_id,
                format_ts(run.started_at),
                run.finished_at.map(format_ts),
                run.status.as_str(),
                run.total_items.map(|t| t as i64),
                run.counters.processed as i64,
                run.counters.created as i64,
                run.counters.updated as i64,
                run.counters.skipped as i64,
                run.counters.errors as i64,
                run.error_message,
            ],
        )?;
        Ok(())
    }

    /// Persists counters of a running run.
    pub fn update_checkpoint(
        &self,
        run_id: &str,
        total_items: Option<u64>,
        counters: &RunCounters,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE import_run SET
                total_items = ?2, processed = ?3, created = ?4,
                updated = ?5, skipped = ?6, errors = ?7
            WHERE id = ?1 AND status = 'running'
            "#,
            params![
                run_id,
                total_items.map(|t| t as i64),
                counters.processed as i64,
                counters.created as i64,
                counters.updated as i64,
                counters.skipped as i64,
                counters.errors as i64,
            ],
        )?;
        if changed == 0 {
            return Err(Self::closed_or_missing(&conn, run_id, RunStatus::Running)?);
        }
        Ok(())
    }

    /// Closes a running run with its terminal status and final counters.
    ///
    /// # Errors
    /// - `InvalidStateTransition` when the run is already terminal
    /// - `NotFound` when the run does not exist
    pub fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        finished_at: DateTime<Utc>,
        total_items: Option<u64>,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> RepositoryResult<()> {
        if !status.is_terminal() {
            return Err(RepositoryError::InvalidStateTransition {
                from: RunStatus::Running.to_string(),
                to: status.to_string(),
            });
        }
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE import_run SET
                status = ?2, finished_at = ?3, total_items = ?4,
                processed = ?5, created = ?6, updated = ?7, skipped = ?8, errors = ?9,
                error_message = ?10
            WHERE id = ?1 AND status = 'running'
            "#,
            params![
                run_id,
                status.as_str(),
                format_ts(finished_at),
                total_items.map(|t| t as i64),
                counters.processed as i64,
                counters.created as i64,
                counters.updated as i64,
                counters.skipped as i64,
                counters.errors as i64,
                error_message,
            ],
        )?;
        if changed == 0 {
            return Err(Self::closed_or_missing(&conn, run_id, status)?);
        }
        Ok(())
    }

    fn closed_or_missing(
        conn: &Connection,
        run_id: &str,
        to: RunStatus,
    ) -> RepositoryResult<RepositoryError> {
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM import_run WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match current {
            Some(from) => RepositoryError::InvalidStateTransition {
                from,
                to: to.to_string(),
            },
            None => RepositoryError::not_found("ImportRun", run_id),
        })
    }

    pub fn find_by_id(&self, run_id: &str) -> RepositoryResult<Option<ImportRun>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                &format!("SELECT {} FROM import_run WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                map_run_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Runs of a feed, newest first; `None` returns all of them.
    pub fn list_by_feed(&self, feed_id: &str, limit: Option<usize>) -> RepositoryResult<Vec<ImportRun>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_run WHERE feed_id = ?1 ORDER BY started_at DESC, rowid DESC LIMIT ?2",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            // LIMIT -1 is unbounded in SQLite
            .query_map(params![feed_id, limit.map_or(-1, |n| n as i64)], map_run_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Closes every run still marked running (start-up reconciliation).
    ///
    /// Returns the ids of the runs that were closed.
    pub fn mark_interrupted(&self, at: DateTime<Utc>) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM import_run WHERE status = 'running'")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        tx.execute(
            "UPDATE import_run SET status = 'failed', finished_at = ?1, error_message = ?2 WHERE status = 'running'",
            params![format_ts(at), INTERRUPTED_MESSAGE],
        )?;
        tx.commit()?;
        Ok(ids)
    }
}
