//! Error taxonomy for query registration, binding, execution and projection.

use crate::query::descriptor::Cardinality;
use crate::query::session::{SessionError, SessionErrorKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors reported by the query engine. None of them are retried or
/// swallowed internally.
#[derive(Debug)]
pub enum QueryError {
    /// Descriptor references an unknown field, a mismatched placeholder or
    /// malformed grammar. Raised at registration.
    InvalidQuerySpec { descriptor: String, reason: String },
    /// Call-site arguments do not fit the descriptor.
    ParameterBinding { descriptor: String, reason: String },
    /// A unique-cardinality query matched more than one row.
    NonUniqueResult { descriptor: String },
    /// Transport or session failure.
    StoreUnavailable(SessionError),
    /// Store-side constraint rejected a write.
    ConstraintViolation(SessionError),
    /// Store stayed busy past its timeout or the call was abandoned.
    StoreTimeout(SessionError),
    /// Mutation issued through a read descriptor, or the reverse.
    InvalidBulkOperation { descriptor: String, reason: String },
    /// No descriptor is registered under the requested id.
    DescriptorNotFound(String),
    /// A typed accessor was used on an output of another cardinality.
    ResultShapeMismatch {
        expected: Cardinality,
        actual: Cardinality,
    },
    /// A row cannot be decoded into the requested element type.
    InvalidData(String),
}

impl QueryError {
    pub(crate) fn spec(descriptor: &str, reason: impl Into<String>) -> Self {
        Self::InvalidQuerySpec {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn binding(descriptor: &str, reason: impl Into<String>) -> Self {
        Self::ParameterBinding {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn bulk(descriptor: &str, reason: impl Into<String>) -> Self {
        Self::InvalidBulkOperation {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable snake_case code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuerySpec { .. } => "invalid_query_spec",
            Self::ParameterBinding { .. } => "parameter_binding",
            Self::NonUniqueResult { .. } => "non_unique_result",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::StoreTimeout(_) => "store_timeout",
            Self::InvalidBulkOperation { .. } => "invalid_bulk_operation",
            Self::DescriptorNotFound(_) => "descriptor_not_found",
            Self::ResultShapeMismatch { .. } => "result_shape_mismatch",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuerySpec { descriptor, reason } => {
                write!(f, "invalid query spec `{descriptor}`: {reason}")
            }
            Self::ParameterBinding { descriptor, reason } => {
                write!(f, "cannot bind arguments for `{descriptor}`: {reason}")
            }
            Self::NonUniqueResult { descriptor } => write!(
                f,
                "query `{descriptor}` expected at most one row but matched more"
            ),
            Self::StoreUnavailable(err)
            | Self::ConstraintViolation(err)
            | Self::StoreTimeout(err) => write!(f, "{err}"),
            Self::InvalidBulkOperation { descriptor, reason } => {
                write!(f, "invalid bulk operation `{descriptor}`: {reason}")
            }
            Self::DescriptorNotFound(id) => write!(f, "query descriptor not found: {id}"),
            Self::ResultShapeMismatch { expected, actual } => write!(
                f,
                "query produced a {actual} result but {expected} was requested"
            ),
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err)
            | Self::ConstraintViolation(err)
            | Self::StoreTimeout(err) => Some(err),
            _ => None,
        }
    }
}

impl QueryError {
    /// Classifies a session failure raised while running `descriptor`.
    pub(crate) fn from_session(descriptor: &str, err: SessionError) -> Self {
        match err.kind() {
            SessionErrorKind::Unavailable => Self::StoreUnavailable(err),
            SessionErrorKind::ConstraintViolation => Self::ConstraintViolation(err),
            SessionErrorKind::Timeout => Self::StoreTimeout(err),
            SessionErrorKind::WriteOnReadPath => Self::bulk(descriptor, err.to_string()),
        }
    }
}

impl From<SessionError> for QueryError {
    fn from(value: SessionError) -> Self {
        Self::from_session("session", value)
    }
}
