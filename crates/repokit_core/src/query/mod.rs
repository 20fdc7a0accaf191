//! Query derivation and result projection engine.
//!
//! Control flow: a declared intent is compiled once into a
//! [`QueryDescriptor`] and kept in the [`DescriptorRegistry`]; each call
//! binds arguments, runs through the [`ExecutionGateway`] and is shaped by
//! the projector and paging strategy into a [`QueryOutput`].

mod bind;
mod bulk;
mod cache;
mod derive;
mod descriptor;
mod engine;
mod error;
mod gateway;
mod meta;
mod page;
mod predicate;
mod project;
mod registry;
mod session;
mod template;

pub use bind::{Arg, Args, BoundQuery};
pub use bulk::BulkOutcome;
pub use cache::EntityCacheContext;
pub use derive::{parse_method_name, MethodAction, MethodName};
pub use descriptor::{
    Cardinality, DescriptorBuilder, Invalidation, QueryDescriptor, QueryIntent, ResultMapping,
};
pub use engine::QueryEngine;
pub use error::{QueryError, QueryResult};
pub use gateway::ExecutionGateway;
pub use meta::{Entity, EntityMeta, FieldMeta, NamedQuery, ValueType};
pub use page::{PageRequest, PageResult, SliceResult};
pub use predicate::{
    Clause, Comparator, Connective, Direction, Multiplicity, ParameterRef, PredicateModel,
    SortOrder, SortSpec,
};
pub use project::{Projectable, QueryOutput};
pub(crate) use project::{project_all, project_unique};
pub use registry::DescriptorRegistry;
pub use session::{PersistenceSession, RawRow, SessionError, SessionErrorKind, SessionResult};
pub use template::{QueryTemplate, Segment, StatementKind};
