//! Persistence-session contract consumed by the execution gateway.
//!
//! The session is the external collaborator that owns the connection,
//! transaction boundary and SQL dialect. The core hands it rendered SQL plus
//! positional parameters and receives either materialized rows or counts.

use rusqlite::types::{FromSql, Value, ValueRef};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failure category reported by a persistence session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// Transport or engine failure; the store could not serve the call.
    Unavailable,
    /// A uniqueness/foreign-key/not-null constraint rejected the write.
    ConstraintViolation,
    /// The store stayed busy past its timeout, or the call was interrupted.
    Timeout,
    /// A statement handed to the row-returning path would write.
    WriteOnReadPath,
}

impl SessionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::ConstraintViolation => "constraint_violation",
            Self::Timeout => "timeout",
            Self::WriteOnReadPath => "write_on_read_path",
        }
    }
}

/// Error surfaced by a [`PersistenceSession`].
#[derive(Debug)]
pub struct SessionError {
    kind: SessionErrorKind,
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl SessionError {
    pub fn new(
        kind: SessionErrorKind,
        source: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> SessionErrorKind {
        self.kind
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "store {}: {}", self.kind.as_str(), self.source)
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One materialized result row.
///
/// Column names are shared by every row of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl RawRow {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `column`, compared case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Decodes column `column` into `T`.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T, String> {
        let index = self
            .column_index(column)
            .ok_or_else(|| format!("column `{column}` is not present in the result set"))?;
        self.get_at(index)
            .map_err(|message| format!("column `{column}`: {message}"))
    }

    /// Decodes the value at `index` into `T`.
    pub fn get_at<T: FromSql>(&self, index: usize) -> Result<T, String> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| format!("column index {index} is out of range"))?;
        T::column_result(ValueRef::from(value)).map_err(|err| err.to_string())
    }
}

/// Store collaborator able to run rendered statements.
///
/// Implementations must be usable from one logical caller at a time; the
/// core never shares a session across concurrent units of work.
pub trait PersistenceSession {
    /// Runs a row-returning statement and materializes every row.
    ///
    /// Statements that would write are refused with `WriteOnReadPath`
    /// before they run.
    fn fetch(&self, sql: &str, params: &[Value]) -> SessionResult<Vec<RawRow>>;
    /// Runs an update/delete statement and returns the affected-row count.
    fn execute(&self, sql: &str, params: &[Value]) -> SessionResult<usize>;
    /// Runs an insert statement and returns the generated primary key.
    fn insert(&self, sql: &str, params: &[Value]) -> SessionResult<i64>;
    /// Compiles `sql` without running it, reporting unknown tables/columns
    /// and syntax errors. Returns whether the statement is read-only.
    fn check(&self, sql: &str) -> SessionResult<bool>;
}
