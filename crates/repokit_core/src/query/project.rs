//! Result projection: row decoding and cardinality shaping.
//!
//! # Responsibility
//! - Decode rows into the caller's element type, entity or value object,
//!   through one trait.
//! - Enforce unique cardinalities without truncation.
//!
//! # Invariants
//! - Entity rows are identity-resolved: an id already in the
//!   [`EntityCacheContext`] yields the cached instance, even if the row
//!   carries newer values.

use crate::query::cache::EntityCacheContext;
use crate::query::descriptor::Cardinality;
use crate::query::error::{QueryError, QueryResult};
use crate::query::meta::Entity;
use crate::query::page::{PageResult, SliceResult};
use crate::query::session::RawRow;
use std::sync::Arc;

/// Element type a row can be projected into.
pub trait Projectable: Sized {
    fn project(row: &RawRow, cache: &mut EntityCacheContext) -> Result<Self, String>;
}

impl<E: Entity> Projectable for Arc<E> {
    fn project(row: &RawRow, cache: &mut EntityCacheContext) -> Result<Self, String> {
        let meta = E::meta();
        let id: i64 = row.get(meta.id.column)?;
        if let Some(cached) = cache.get::<E>(meta.kind, id) {
            return Ok(cached);
        }
        let instance = Arc::new(E::from_row(row)?);
        cache.put(meta.kind, id, Arc::clone(&instance));
        Ok(instance)
    }
}

macro_rules! first_column_projection {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Projectable for $ty {
                fn project(row: &RawRow, _cache: &mut EntityCacheContext) -> Result<Self, String> {
                    row.get_at(0)
                }
            }
        )*
    };
}

first_column_projection!(String, i64, f64, bool, Option<String>, Option<i64>);

/// Output of one read, tagged with the cardinality it was declared with.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<T> {
    One(Option<T>),
    OneOrNone(Option<T>),
    Many(Vec<T>),
    Page(PageResult<T>),
    Slice(SliceResult<T>),
}

impl<T> QueryOutput<T> {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::One(_) => Cardinality::One,
            Self::OneOrNone(_) => Cardinality::OneOrNone,
            Self::Many(_) => Cardinality::Many,
            Self::Page(_) => Cardinality::CountedPage,
            Self::Slice(_) => Cardinality::UncountedSlice,
        }
    }

    /// Single value or the empty sentinel.
    pub fn into_one(self) -> QueryResult<Option<T>> {
        match self {
            Self::One(value) => Ok(value),
            other => Err(other.mismatch(Cardinality::One)),
        }
    }

    /// Explicitly optional single value.
    pub fn into_optional(self) -> QueryResult<Option<T>> {
        match self {
            Self::OneOrNone(value) => Ok(value),
            other => Err(other.mismatch(Cardinality::OneOrNone)),
        }
    }

    pub fn into_list(self) -> QueryResult<Vec<T>> {
        match self {
            Self::Many(values) => Ok(values),
            other => Err(other.mismatch(Cardinality::Many)),
        }
    }

    pub fn into_page(self) -> QueryResult<PageResult<T>> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(other.mismatch(Cardinality::CountedPage)),
        }
    }

    pub fn into_slice(self) -> QueryResult<SliceResult<T>> {
        match self {
            Self::Slice(slice) => Ok(slice),
            other => Err(other.mismatch(Cardinality::UncountedSlice)),
        }
    }

    fn mismatch(&self, expected: Cardinality) -> QueryError {
        QueryError::ResultShapeMismatch {
            expected,
            actual: self.cardinality(),
        }
    }
}

/// Decodes every row, keeping store order.
pub(crate) fn project_all<T: Projectable>(
    descriptor: &str,
    rows: &[RawRow],
    cache: &mut EntityCacheContext,
) -> QueryResult<Vec<T>> {
    rows.iter()
        .map(|row| {
            T::project(row, cache)
                .map_err(|reason| QueryError::InvalidData(format!("{descriptor}: {reason}")))
        })
        .collect()
}

/// Decodes zero or one row; more than one is `NonUniqueResult`.
pub(crate) fn project_unique<T: Projectable>(
    descriptor: &str,
    rows: &[RawRow],
    cache: &mut EntityCacheContext,
) -> QueryResult<Option<T>> {
    match rows {
        [] => Ok(None),
        [_] => Ok(project_all(descriptor, rows, cache)?.pop()),
        _ => Err(QueryError::NonUniqueResult {
            descriptor: descriptor.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{project_unique, QueryOutput};
    use crate::query::cache::EntityCacheContext;
    use crate::query::descriptor::Cardinality;
    use crate::query::error::QueryError;
    use crate::query::session::RawRow;
    use rusqlite::types::Value;
    use std::sync::Arc;

    fn rows(names: &[&str]) -> Vec<RawRow> {
        let columns: Arc<[String]> = vec!["username".to_string()].into();
        names
            .iter()
            .map(|name| RawRow::new(Arc::clone(&columns), vec![Value::Text((*name).into())]))
            .collect()
    }

    #[test]
    fn unique_projection_never_truncates() {
        let mut cache = EntityCacheContext::new();
        let none: Option<String> = project_unique("d", &rows(&[]), &mut cache).unwrap();
        assert!(none.is_none());
        let one: Option<String> = project_unique("d", &rows(&["AAA"]), &mut cache).unwrap();
        assert_eq!(one.as_deref(), Some("AAA"));
        assert!(matches!(
            project_unique::<String>("d", &rows(&["AAA", "BBB"]), &mut cache),
            Err(QueryError::NonUniqueResult { .. })
        ));
    }

    #[test]
    fn wrong_accessor_reports_both_shapes() {
        let output = QueryOutput::Many(vec![1_i64]);
        match output.into_optional() {
            Err(QueryError::ResultShapeMismatch { expected, actual }) => {
                assert_eq!(expected, Cardinality::OneOrNone);
                assert_eq!(actual, Cardinality::Many);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
