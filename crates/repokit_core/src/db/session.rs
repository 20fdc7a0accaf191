//! SQLite-backed [`PersistenceSession`].
//!
//! # Invariants
//! - Busy, locked and interrupted statements surface as `Timeout`.
//! - An interrupted or failed fetch returns no rows; partial results are
//!   dropped with the statement.
//! - Bound values never appear in log lines.
//! - `fetch` only runs statements SQLite reports as read-only.

use crate::query::{PersistenceSession, RawRow, SessionError, SessionErrorKind, SessionResult};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, InterruptHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_SLOW_QUERY: Duration = Duration::from_millis(200);

/// Session over one borrowed connection, used by one unit of work at a time.
pub struct SqliteSession<'conn> {
    conn: &'conn Connection,
    slow_query: Duration,
}

impl<'conn> SqliteSession<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            slow_query: DEFAULT_SLOW_QUERY,
        }
    }

    /// Statements running longer than `threshold` log a `status=slow` warning.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query = threshold;
        self
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Handle that abandons the statement currently running on this
    /// connection, from any thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    fn observe(&self, op: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed >= self.slow_query {
            warn!(
                "event={} module=db status=slow elapsed_ms={} threshold_ms={}",
                op,
                elapsed.as_millis(),
                self.slow_query.as_millis()
            );
        }
    }
}

impl PersistenceSession for SqliteSession<'_> {
    fn fetch(&self, sql: &str, params: &[Value]) -> SessionResult<Vec<RawRow>> {
        let started = Instant::now();
        let mut stmt = self.conn.prepare_cached(sql).map_err(classify)?;
        if !stmt.readonly() {
            return Err(SessionError::new(
                SessionErrorKind::WriteOnReadPath,
                "statement writes to the store",
            ));
        }
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params)).map_err(classify)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(classify)? {
            let values = (0..width)
                .map(|index| row.get::<_, Value>(index))
                .collect::<Result<Vec<_>, _>>()
                .map_err(classify)?;
            out.push(RawRow::new(Arc::clone(&columns), values));
        }
        self.observe("query_fetch", started);
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> SessionResult<usize> {
        let started = Instant::now();
        let mut stmt = self.conn.prepare_cached(sql).map_err(classify)?;
        let affected = stmt.execute(params_from_iter(params)).map_err(classify)?;
        self.observe("query_mutation", started);
        Ok(affected)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> SessionResult<i64> {
        let started = Instant::now();
        let mut stmt = self.conn.prepare_cached(sql).map_err(classify)?;
        let id = stmt.insert(params_from_iter(params)).map_err(classify)?;
        self.observe("query_insert", started);
        Ok(id)
    }

    fn check(&self, sql: &str) -> SessionResult<bool> {
        let stmt = self.conn.prepare(sql).map_err(classify)?;
        Ok(stmt.readonly())
    }
}

fn classify(err: rusqlite::Error) -> SessionError {
    let kind = match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => SessionErrorKind::ConstraintViolation,
        Some(
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::OperationInterrupted,
        ) => SessionErrorKind::Timeout,
        _ => SessionErrorKind::Unavailable,
    };
    SessionError::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::SqliteSession;
    use crate::db::open_db_in_memory;
    use crate::query::{PersistenceSession, SessionErrorKind};
    use rusqlite::types::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fetch_returns_named_columns() {
        let conn = open_db_in_memory().unwrap();
        let session = SqliteSession::new(&conn);
        let id = session
            .insert(
                "INSERT INTO team (name, nationality) VALUES (?, ?)",
                &[Value::Text("teamA".into()), Value::Null],
            )
            .unwrap();

        let rows = session
            .fetch("SELECT team_id, name FROM team", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<i64>("team_id").unwrap(), id);
        assert_eq!(rows[0].get::<String>("NAME").unwrap(), "teamA");
    }

    #[test]
    fn constraint_failures_are_classified() {
        let conn = open_db_in_memory().unwrap();
        let session = SqliteSession::new(&conn);
        let err = session
            .insert(
                "INSERT INTO member (username, age, team_id) VALUES (?, ?, ?)",
                &[Value::Text("m".into()), Value::Integer(1), Value::Integer(999)],
            )
            .unwrap_err();
        assert_eq!(err.kind(), SessionErrorKind::ConstraintViolation);
    }

    #[test]
    fn check_rejects_unknown_columns() {
        let conn = open_db_in_memory().unwrap();
        let session = SqliteSession::new(&conn);
        assert!(session.check("SELECT nickname FROM member").is_err());
        assert!(session.check("SELECT username FROM member").unwrap());
        assert!(!session.check("UPDATE member SET age = 1").unwrap());
    }

    #[test]
    fn fetch_refuses_statements_that_write() {
        let conn = open_db_in_memory().unwrap();
        let session = SqliteSession::new(&conn);
        session
            .insert(
                "INSERT INTO member (username, age, team_id) VALUES (?, ?, ?)",
                &[Value::Text("m".into()), Value::Integer(10), Value::Null],
            )
            .unwrap();

        let err = session
            .fetch(
                "WITH x AS (SELECT 1) UPDATE member SET age = 99 WHERE age >= ?",
                &[Value::Integer(0)],
            )
            .unwrap_err();
        assert_eq!(err.kind(), SessionErrorKind::WriteOnReadPath);

        let rows = session.fetch("SELECT age FROM member", &[]).unwrap();
        assert_eq!(rows[0].get::<i64>("age").unwrap(), 10);
    }

    #[test]
    fn interrupted_statements_surface_as_timeout() {
        let conn = open_db_in_memory().unwrap();
        let session = SqliteSession::new(&conn);
        let handle = session.interrupt_handle();
        let done = Arc::new(AtomicBool::new(false));
        let watcher = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(10));
                    handle.interrupt();
                }
            })
        };

        let err = session
            .fetch(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT count(*) FROM n",
                &[],
            )
            .unwrap_err();
        done.store(true, Ordering::SeqCst);
        watcher.join().unwrap();
        assert_eq!(err.kind(), SessionErrorKind::Timeout);
    }
}
