//! Generic CRUD over any mapped [`Entity`].
//!
//! Statements are rendered from `EntityMeta`; loaded and saved instances are
//! registered in the caller's [`EntityCacheContext`].

use super::{RepoError, RepoResult};
use crate::query::{
    project_all, project_unique, Entity, EntityCacheContext, PersistenceSession, QueryError,
};
use log::info;
use rusqlite::types::Value;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct CrudRepository<'s, E: Entity, S: PersistenceSession> {
    session: &'s S,
    _entity: PhantomData<fn() -> E>,
}

impl<'s, E: Entity, S: PersistenceSession> CrudRepository<'s, E, S> {
    pub fn new(session: &'s S) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    /// Inserts an unsaved entity or updates a saved one, then caches it.
    ///
    /// # Errors
    /// - `Validation` when `Entity::validate` fails.
    /// - `NotFound` when updating an id the store does not have.
    pub fn save(&self, cache: &mut EntityCacheContext, mut entity: E) -> RepoResult<Arc<E>> {
        let meta = E::meta();
        entity.validate().map_err(|reason| RepoError::Validation {
            kind: meta.kind,
            reason,
        })?;

        let columns: Vec<&str> = meta.fields.iter().map(|field| field.column).collect();
        let mut values = entity.column_values();
        let id = match entity.id() {
            None => {
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    meta.table,
                    columns.join(", "),
                    vec!["?"; columns.len()].join(", ")
                );
                let id = self.session.insert(&sql, &values).map_err(QueryError::from)?;
                entity.set_id(id);
                info!(
                    "event=entity_save module=repo status=ok kind={} op=insert",
                    meta.kind
                );
                id
            }
            Some(id) => {
                let assignments = columns
                    .iter()
                    .map(|column| format!("{column} = ?"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    meta.table, assignments, meta.id.column
                );
                values.push(Value::Integer(id));
                let changed = self.session.execute(&sql, &values).map_err(QueryError::from)?;
                if changed == 0 {
                    return Err(RepoError::NotFound {
                        kind: meta.kind,
                        id,
                    });
                }
                info!(
                    "event=entity_save module=repo status=ok kind={} op=update",
                    meta.kind
                );
                id
            }
        };

        let saved = Arc::new(entity);
        cache.put(meta.kind, id, Arc::clone(&saved));
        Ok(saved)
    }

    /// Cached instance if present, otherwise a store lookup.
    pub fn find_by_id(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<Option<Arc<E>>> {
        let meta = E::meta();
        if let Some(cached) = cache.get::<E>(meta.kind, id) {
            return Ok(Some(cached));
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            meta.select_list(),
            meta.table,
            meta.id.column
        );
        let rows = self
            .session
            .fetch(&sql, &[Value::Integer(id)])
            .map_err(QueryError::from)?;
        Ok(project_unique(&format!("{}.findById", meta.kind), &rows, cache)?)
    }

    /// Like [`find_by_id`](Self::find_by_id) but absence is `NotFound`.
    pub fn get(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<Arc<E>> {
        self.find_by_id(cache, id)?.ok_or(RepoError::NotFound {
            kind: E::meta().kind,
            id,
        })
    }

    /// Every entity in id order.
    pub fn find_all(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<Arc<E>>> {
        let meta = E::meta();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            meta.select_list(),
            meta.table,
            meta.id.column
        );
        let rows = self.session.fetch(&sql, &[]).map_err(QueryError::from)?;
        Ok(project_all(&format!("{}.findAll", meta.kind), &rows, cache)?)
    }

    pub fn count(&self) -> RepoResult<i64> {
        let meta = E::meta();
        let sql = format!("SELECT COUNT(*) FROM {}", meta.table);
        let rows = self.session.fetch(&sql, &[]).map_err(QueryError::from)?;
        rows.first()
            .ok_or_else(|| RepoError::Query(QueryError::InvalidData("count returned no row".into())))?
            .get_at(0)
            .map_err(|reason| RepoError::Query(QueryError::InvalidData(reason)))
    }

    /// Deletes by id and evicts the cached instance.
    pub fn delete(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<()> {
        let meta = E::meta();
        let sql = format!("DELETE FROM {} WHERE {} = ?", meta.table, meta.id.column);
        let changed = self
            .session
            .execute(&sql, &[Value::Integer(id)])
            .map_err(QueryError::from)?;
        cache.evict(meta.kind, id);
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: meta.kind,
                id,
            });
        }
        info!("event=entity_delete module=repo status=ok kind={}", meta.kind);
        Ok(())
    }
}
