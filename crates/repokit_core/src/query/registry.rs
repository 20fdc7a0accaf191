//! Startup-built mapping from descriptor id to compiled descriptor.
//!
//! # Invariants
//! - Ids are unique; a second registration under the same id is rejected.
//! - After warm-up the registry is only read, so `&DescriptorRegistry` can be
//!   shared across threads without locking.

use crate::query::bind;
use crate::query::descriptor::{DescriptorBuilder, QueryDescriptor};
use crate::query::error::{QueryError, QueryResult};
use crate::query::session::PersistenceSession;
use log::{error, info};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<String, Arc<QueryDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers one declaration.
    ///
    /// # Errors
    /// - Any validation error from [`DescriptorBuilder::build`].
    /// - `InvalidQuerySpec` when the id is already registered.
    pub fn register(&mut self, builder: DescriptorBuilder) -> QueryResult<Arc<QueryDescriptor>> {
        let descriptor = match builder.build() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!(
                    "event=descriptor_register module=query status=error error_code={}",
                    err.code()
                );
                return Err(err);
            }
        };
        self.insert(descriptor)
    }

    /// Registers an already built descriptor.
    pub fn insert(&mut self, descriptor: QueryDescriptor) -> QueryResult<Arc<QueryDescriptor>> {
        let id = descriptor.id().to_string();
        if self.descriptors.contains_key(&id) {
            return Err(QueryError::spec(&id, "descriptor id is already registered"));
        }
        let descriptor = Arc::new(descriptor);
        self.descriptors.insert(id.clone(), Arc::clone(&descriptor));
        info!(
            "event=descriptor_register module=query status=ok descriptor={} intent={} cardinality={}",
            id,
            descriptor.intent().as_str(),
            descriptor.cardinality()
        );
        Ok(descriptor)
    }

    pub fn get(&self, id: &str) -> QueryResult<&Arc<QueryDescriptor>> {
        self.descriptors
            .get(id)
            .ok_or_else(|| QueryError::DescriptorNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<QueryDescriptor>> {
        self.descriptors.values()
    }

    /// Compiles every descriptor's statements against the live store.
    ///
    /// Returns the number of verified descriptors.
    ///
    /// # Errors
    /// - `InvalidQuerySpec` for the first statement the store refuses to
    ///   compile (unknown table/column, syntax error).
    /// - `InvalidBulkOperation` when a read descriptor's statement writes.
    pub fn verify<S: PersistenceSession>(&self, session: &S) -> QueryResult<usize> {
        for descriptor in self.descriptors.values() {
            for sql in bind::probe(descriptor)? {
                let read_only = match session.check(&sql) {
                    Ok(read_only) => read_only,
                    Err(err) => {
                        error!(
                            "event=descriptor_verify module=query status=error descriptor={} error_code={}",
                            descriptor.id(),
                            err.kind().as_str()
                        );
                        return Err(QueryError::spec(
                            descriptor.id(),
                            format!("store rejected statement: {err}"),
                        ));
                    }
                };
                if !read_only && !descriptor.is_mutation() {
                    error!(
                        "event=descriptor_verify module=query status=error descriptor={} error_code=invalid_bulk_operation",
                        descriptor.id()
                    );
                    return Err(QueryError::bulk(
                        descriptor.id(),
                        "store reports a write in a read descriptor",
                    ));
                }
            }
        }
        info!(
            "event=descriptor_verify module=query status=ok descriptors={}",
            self.descriptors.len()
        );
        Ok(self.descriptors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::DescriptorRegistry;
    use crate::model::member::MEMBER_META;
    use crate::query::descriptor::QueryDescriptor;
    use crate::query::error::QueryError;
    use crate::query::meta::ValueType;

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = DescriptorRegistry::new();
        registry
            .register(QueryDescriptor::derived(&MEMBER_META, "findByAge").param(ValueType::Integer))
            .unwrap();
        let err = registry
            .register(QueryDescriptor::derived(&MEMBER_META, "findByAge").param(ValueType::Integer))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let registry = DescriptorRegistry::new();
        assert!(matches!(
            registry.get("Member.findNothing"),
            Err(QueryError::DescriptorNotFound(id)) if id == "Member.findNothing"
        ));
    }
}
