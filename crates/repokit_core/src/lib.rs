//! Declarative repository core.
//!
//! Query intents are declared once per access method, compiled into
//! descriptors at startup and executed against SQLite with cardinality-aware
//! result shaping, counted/uncounted paging and explicit cache invalidation
//! after bulk writes.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_configured, open_db, open_db_in_memory, DbError, DbResult, SqliteSession};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::member::{Member, MemberDto};
pub use model::team::Team;
pub use query::{
    Arg, Args, BulkOutcome, Cardinality, DescriptorRegistry, EntityCacheContext, PageRequest,
    PageResult, QueryEngine, QueryError, QueryOutput, QueryResult, SliceResult, SortSpec,
};
pub use repo::{register_all, MemberRepository, RepoError, RepoResult, TeamRepository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
