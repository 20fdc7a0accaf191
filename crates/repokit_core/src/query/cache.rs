//! Per-unit-of-work identity map.
//!
//! # Responsibility
//! - Hold at most one materialized instance per `(entity kind, id)`.
//! - Stay untouched by bulk statements until explicitly invalidated.
//!
//! # Invariants
//! - A context belongs to exactly one unit of work and is never shared
//!   across concurrent callers; `&mut` access enforces that.
//! - Instances handed out are `Arc` clones of the cached value, so two
//!   lookups of the same id compare equal by pointer.

use log::debug;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type CachedInstance = Arc<dyn Any + Send + Sync>;

/// Identity map scoped to one unit of work.
pub struct EntityCacheContext {
    unit_id: Uuid,
    entries: HashMap<(&'static str, i64), CachedInstance>,
}

impl EntityCacheContext {
    pub fn new() -> Self {
        Self {
            unit_id: Uuid::new_v4(),
            entries: HashMap::new(),
        }
    }

    /// Random id identifying the unit of work in log lines.
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }

    /// Returns the cached instance of `kind`/`id` if one exists with type `E`.
    pub fn get<E>(&self, kind: &'static str, id: i64) -> Option<Arc<E>>
    where
        E: Any + Send + Sync,
    {
        self.entries
            .get(&(kind, id))
            .and_then(|instance| Arc::clone(instance).downcast::<E>().ok())
    }

    /// Caches `instance`, replacing any earlier one for the same identity.
    pub fn put<E>(&mut self, kind: &'static str, id: i64, instance: Arc<E>)
    where
        E: Any + Send + Sync,
    {
        self.entries.insert((kind, id), instance);
    }

    /// Drops one identity; returns whether it was cached.
    pub fn evict(&mut self, kind: &'static str, id: i64) -> bool {
        self.entries.remove(&(kind, id)).is_some()
    }

    /// Number of cached instances of `kind`.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.entries
            .keys()
            .filter(|(cached_kind, _)| *cached_kind == kind)
            .count()
    }

    /// Drops every instance of `kind` and returns how many were dropped.
    pub fn clear_kind(&mut self, kind: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(cached_kind, _), _| *cached_kind != kind);
        let dropped = before - self.entries.len();
        debug!(
            "event=cache_clear module=query status=ok unit={} kind={} dropped={}",
            self.unit_id, kind, dropped
        );
        dropped
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EntityCacheContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityCacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCacheContext")
            .field("unit_id", &self.unit_id)
            .field("entries", &self.entries.len())
            .finish()
    }
}
