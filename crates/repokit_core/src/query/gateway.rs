//! Execution gateway between bound statements and the persistence session.
//!
//! # Invariants
//! - Row-returning calls only run `Read` statements; `execute` only runs
//!   `Mutation` statements. The other pairing is `InvalidBulkOperation`.
//! - Session failures pass through unchanged, classified by kind.

use crate::query::bind::BoundQuery;
use crate::query::error::{QueryError, QueryResult};
use crate::query::session::{PersistenceSession, RawRow};
use crate::query::template::StatementKind;
use log::{debug, error};
use std::time::Instant;

pub struct ExecutionGateway<'s, S: PersistenceSession> {
    session: &'s S,
}

impl<'s, S: PersistenceSession> ExecutionGateway<'s, S> {
    pub fn new(session: &'s S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &'s S {
        self.session
    }

    /// Runs a read and returns every row in store order.
    pub fn fetch(&self, descriptor: &str, query: &BoundQuery) -> QueryResult<Vec<RawRow>> {
        require_kind(descriptor, query, StatementKind::Read)?;
        let started = Instant::now();
        let rows = self
            .session
            .fetch(&query.sql, &query.params)
            .map_err(|err| failed("query_fetch", descriptor, QueryError::from_session(descriptor, err)))?;
        debug!(
            "event=query_fetch module=query status=ok descriptor={} rows={} elapsed_ms={}",
            descriptor,
            rows.len(),
            started.elapsed().as_millis()
        );
        Ok(rows)
    }

    /// Runs a `COUNT(*)`-shaped read and returns its single scalar.
    pub fn count(&self, descriptor: &str, query: &BoundQuery) -> QueryResult<i64> {
        require_kind(descriptor, query, StatementKind::Read)?;
        let started = Instant::now();
        let rows = self
            .session
            .fetch(&query.sql, &query.params)
            .map_err(|err| failed("query_count", descriptor, QueryError::from_session(descriptor, err)))?;
        let total = match rows.as_slice() {
            [row] => row.get_at::<i64>(0).map_err(|reason| {
                QueryError::InvalidData(format!("{descriptor}: count column: {reason}"))
            })?,
            other => {
                return Err(QueryError::InvalidData(format!(
                    "{descriptor}: count query returned {} rows",
                    other.len()
                )))
            }
        };
        debug!(
            "event=query_count module=query status=ok descriptor={} total={} elapsed_ms={}",
            descriptor,
            total,
            started.elapsed().as_millis()
        );
        Ok(total)
    }

    /// Runs an update/delete and returns the affected-row count.
    pub fn execute(&self, descriptor: &str, query: &BoundQuery) -> QueryResult<usize> {
        require_kind(descriptor, query, StatementKind::Mutation)?;
        let started = Instant::now();
        let affected = self
            .session
            .execute(&query.sql, &query.params)
            .map_err(|err| failed("query_mutation", descriptor, QueryError::from_session(descriptor, err)))?;
        debug!(
            "event=query_mutation module=query status=ok descriptor={} affected={} elapsed_ms={}",
            descriptor,
            affected,
            started.elapsed().as_millis()
        );
        Ok(affected)
    }
}

fn require_kind(descriptor: &str, query: &BoundQuery, expected: StatementKind) -> QueryResult<()> {
    if query.kind == expected {
        return Ok(());
    }
    Err(QueryError::bulk(
        descriptor,
        format!(
            "{} statement cannot run through the {} path",
            query.kind.as_str(),
            expected.as_str()
        ),
    ))
}

fn failed(event: &str, descriptor: &str, err: QueryError) -> QueryError {
    error!(
        "event={} module=query status=error descriptor={} error_code={}",
        event,
        descriptor,
        err.code()
    );
    err
}

#[cfg(test)]
mod tests {
    use super::ExecutionGateway;
    use crate::query::bind::BoundQuery;
    use crate::query::error::QueryError;
    use crate::query::session::{
        PersistenceSession, RawRow, SessionError, SessionErrorKind, SessionResult,
    };
    use crate::query::template::StatementKind;
    use rusqlite::types::Value;
    use std::cell::Cell;
    use std::io;

    /// Session that fails every call with one kind and counts calls.
    struct FailingSession {
        kind: SessionErrorKind,
        calls: Cell<usize>,
    }

    impl FailingSession {
        fn fail(&self) -> SessionError {
            self.calls.set(self.calls.get() + 1);
            SessionError::new(self.kind, io::Error::other("session down"))
        }
    }

    impl PersistenceSession for FailingSession {
        fn fetch(&self, _sql: &str, _params: &[Value]) -> SessionResult<Vec<RawRow>> {
            Err(self.fail())
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> SessionResult<usize> {
            Err(self.fail())
        }

        fn insert(&self, _sql: &str, _params: &[Value]) -> SessionResult<i64> {
            Err(self.fail())
        }

        fn check(&self, _sql: &str) -> SessionResult<bool> {
            Err(self.fail())
        }
    }

    fn query(kind: StatementKind) -> BoundQuery {
        BoundQuery {
            kind,
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        }
    }

    #[test]
    fn statement_kind_is_checked_before_the_session_is_called() {
        let session = FailingSession {
            kind: SessionErrorKind::Unavailable,
            calls: Cell::new(0),
        };
        let gateway = ExecutionGateway::new(&session);
        assert!(matches!(
            gateway.execute("Member.findUser", &query(StatementKind::Read)),
            Err(QueryError::InvalidBulkOperation { .. })
        ));
        assert!(matches!(
            gateway.fetch("Member.bulkAgePlus", &query(StatementKind::Mutation)),
            Err(QueryError::InvalidBulkOperation { .. })
        ));
        assert_eq!(session.calls.get(), 0);
    }

    #[test]
    fn session_failures_keep_their_classification() {
        let cases = [
            (SessionErrorKind::Unavailable, "store_unavailable"),
            (SessionErrorKind::Timeout, "store_timeout"),
            (SessionErrorKind::ConstraintViolation, "constraint_violation"),
            (SessionErrorKind::WriteOnReadPath, "invalid_bulk_operation"),
        ];
        for (kind, code) in cases {
            let session = FailingSession {
                kind,
                calls: Cell::new(0),
            };
            let gateway = ExecutionGateway::new(&session);
            let err = gateway
                .fetch("Member.findUser", &query(StatementKind::Read))
                .unwrap_err();
            assert_eq!(err.code(), code);
            assert_eq!(session.calls.get(), 1);
        }
    }
}
