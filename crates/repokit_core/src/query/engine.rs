//! `QueryEngine`: the caller-facing facade over registry, binder, gateway,
//! projector and pagination.
//!
//! # Invariants
//! - Reads never run mutation descriptors and bulk calls never run read
//!   descriptors.
//! - A counted page always issues exactly one content and one count query;
//!   a slice never issues a count query.
//! - The cache passed in belongs to the caller's unit of work.

use crate::query::bind::{self, Args};
use crate::query::bulk::{self, BulkOutcome};
use crate::query::cache::EntityCacheContext;
use crate::query::descriptor::Cardinality;
use crate::query::error::{QueryError, QueryResult};
use crate::query::gateway::ExecutionGateway;
use crate::query::page::{content_window, trim_overfetch, PageResult, SliceResult, PageRequest};
use crate::query::predicate::SortSpec;
use crate::query::project::{project_all, project_unique, Projectable, QueryOutput};
use crate::query::registry::DescriptorRegistry;
use crate::query::session::PersistenceSession;

pub struct QueryEngine<'a, S: PersistenceSession> {
    registry: &'a DescriptorRegistry,
    gateway: ExecutionGateway<'a, S>,
}

impl<'a, S: PersistenceSession> QueryEngine<'a, S> {
    pub fn new(registry: &'a DescriptorRegistry, session: &'a S) -> Self {
        Self {
            registry,
            gateway: ExecutionGateway::new(session),
        }
    }

    pub fn registry(&self) -> &'a DescriptorRegistry {
        self.registry
    }

    pub fn session(&self) -> &'a S {
        self.gateway.session()
    }

    /// Runs read descriptor `id` and shapes rows per its cardinality.
    ///
    /// `page` is required for counted pages and slices, optional for lists
    /// and rejected for unique reads.
    ///
    /// # Errors
    /// - `DescriptorNotFound`, `ParameterBinding`, `NonUniqueResult`,
    ///   `InvalidData` and the store errors.
    /// - `InvalidBulkOperation` when `id` names a mutation.
    pub fn execute<T: Projectable>(
        &self,
        cache: &mut EntityCacheContext,
        id: &str,
        args: &Args,
        page: Option<&PageRequest>,
    ) -> QueryResult<QueryOutput<T>> {
        let descriptor = self.registry.get(id)?;
        if descriptor.is_mutation() {
            return Err(QueryError::bulk(
                id,
                "mutation descriptors run through execute_bulk",
            ));
        }

        let cardinality = descriptor.cardinality();
        let predicate = descriptor.predicate();
        let resolved = bind::resolve_args(descriptor, args)?;
        let window = content_window(
            id,
            cardinality,
            predicate.limit,
            predicate
                .template
                .as_ref()
                .is_some_and(|template| template.has_limit()),
            page,
        )?;
        let unsorted = SortSpec::unsorted();
        let sort = page.map_or(&unsorted, PageRequest::sort);
        let statements = bind::render(
            descriptor,
            &resolved,
            window,
            sort,
            cardinality == Cardinality::CountedPage,
        )?;

        let mut rows = self.gateway.fetch(id, &statements.content)?;
        let output = match (cardinality, page, statements.count) {
            (Cardinality::One, _, _) => QueryOutput::One(project_unique(id, &rows, cache)?),
            (Cardinality::OneOrNone, _, _) => {
                QueryOutput::OneOrNone(project_unique(id, &rows, cache)?)
            }
            (Cardinality::Many, _, _) => QueryOutput::Many(project_all(id, &rows, cache)?),
            (Cardinality::CountedPage, Some(request), Some(count)) => {
                let content = project_all(id, &rows, cache)?;
                let total = self.gateway.count(id, &count)?;
                QueryOutput::Page(PageResult::new(content, request.clone(), total))
            }
            (Cardinality::UncountedSlice, Some(request), _) => {
                let has_next = trim_overfetch(&mut rows, request.page_size());
                let content = project_all(id, &rows, cache)?;
                QueryOutput::Slice(SliceResult::new(content, request.clone(), has_next))
            }
            _ => {
                return Err(QueryError::binding(
                    id,
                    format!("{cardinality} query is missing its page request"),
                ))
            }
        };
        Ok(output)
    }

    /// Runs mutation descriptor `id`.
    ///
    /// With manual invalidation the caller must call
    /// [`BulkOutcome::invalidate`] before re-reading affected entities.
    ///
    /// # Errors
    /// - `InvalidBulkOperation` when `id` names a read descriptor.
    pub fn execute_bulk(
        &self,
        cache: &mut EntityCacheContext,
        id: &str,
        args: &Args,
    ) -> QueryResult<BulkOutcome> {
        let descriptor = self.registry.get(id)?;
        bulk::run(&self.gateway, descriptor, args, cache)
    }
}
