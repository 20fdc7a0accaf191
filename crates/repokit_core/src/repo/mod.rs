//! Repositories declaring the tutorial's data access methods.
//!
//! # Responsibility
//! - Offer entity CRUD over the persistence session.
//! - Declare every query intent once, at startup, into the
//!   [`DescriptorRegistry`].
//!
//! # Invariants
//! - Writes call `Entity::validate` before any SQL runs.
//! - Repository methods only run descriptors their `register` declared.

use crate::query::{DescriptorRegistry, QueryError, QueryResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod crud;
pub mod member_repo;
pub mod team_repo;

pub use crud::CrudRepository;
pub use member_repo::MemberRepository;
pub use team_repo::TeamRepository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error.
#[derive(Debug)]
pub enum RepoError {
    Validation {
        kind: &'static str,
        reason: String,
    },
    NotFound {
        kind: &'static str,
        id: i64,
    },
    Query(QueryError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { kind, reason } => write!(f, "invalid {kind}: {reason}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Query(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::Validation { .. } | Self::NotFound { .. } => None,
        }
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

/// Registers the descriptors of every repository.
pub fn register_all(registry: &mut DescriptorRegistry) -> QueryResult<()> {
    member_repo::register(registry)?;
    team_repo::register(registry)?;
    Ok(())
}
