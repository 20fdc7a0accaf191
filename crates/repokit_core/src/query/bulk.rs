//! Bulk mutation executor and its cache invalidation step.
//!
//! A bulk statement writes straight to the store. Instances cached before it
//! ran keep their old values until the affected kind is invalidated, and
//! other units of work holding their own caches stay stale regardless.

use crate::query::bind::{self, Args};
use crate::query::cache::EntityCacheContext;
use crate::query::descriptor::{Invalidation, QueryDescriptor};
use crate::query::error::{QueryError, QueryResult};
use crate::query::gateway::ExecutionGateway;
use crate::query::page::FetchWindow;
use crate::query::predicate::SortSpec;
use crate::query::session::PersistenceSession;
use log::{info, warn};

/// Result of one bulk mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a manual-invalidation outcome may leave cached entities stale"]
pub struct BulkOutcome {
    affected_rows: usize,
    entity_kind: &'static str,
    invalidated: bool,
}

impl BulkOutcome {
    pub fn affected_rows(&self) -> usize {
        self.affected_rows
    }

    pub fn entity_kind(&self) -> &'static str {
        self.entity_kind
    }

    /// Whether cached instances of the affected kind were already dropped.
    pub fn invalidated(&self) -> bool {
        self.invalidated
    }

    /// Drops every cached instance of the affected kind; returns how many.
    pub fn invalidate(&mut self, cache: &mut EntityCacheContext) -> usize {
        let dropped = cache.clear_kind(self.entity_kind);
        self.invalidated = true;
        info!(
            "event=cache_invalidate module=query status=ok unit={} kind={} dropped={}",
            cache.unit_id(),
            self.entity_kind,
            dropped
        );
        dropped
    }
}

pub(crate) fn run<S: PersistenceSession>(
    gateway: &ExecutionGateway<'_, S>,
    descriptor: &QueryDescriptor,
    args: &Args,
    cache: &mut EntityCacheContext,
) -> QueryResult<BulkOutcome> {
    let id = descriptor.id();
    let Some(invalidation) = descriptor.invalidation() else {
        return Err(QueryError::bulk(
            id,
            "descriptor is not marked as a mutation",
        ));
    };

    let resolved = bind::resolve_args(descriptor, args)?;
    let statements = bind::render(
        descriptor,
        &resolved,
        FetchWindow::default(),
        &SortSpec::unsorted(),
        false,
    )?;
    let affected_rows = gateway.execute(id, &statements.content)?;

    let mut outcome = BulkOutcome {
        affected_rows,
        entity_kind: descriptor.entity().kind,
        invalidated: false,
    };
    match invalidation {
        Invalidation::Automatic => {
            outcome.invalidate(cache);
        }
        Invalidation::Manual => {
            let cached = cache.count_kind(outcome.entity_kind);
            if cached > 0 {
                warn!(
                    "event=bulk_mutation module=query status=stale_risk descriptor={} kind={} cached={}",
                    id, outcome.entity_kind, cached
                );
            }
        }
    }
    info!(
        "event=bulk_mutation module=query status=ok descriptor={} affected={} invalidated={}",
        id, outcome.affected_rows, outcome.invalidated
    );
    Ok(outcome)
}
