//! Static entity metadata: table, id and field-to-column mapping.

use crate::query::session::RawRow;
use rusqlite::types::Value;
use std::fmt::{Display, Formatter};

/// Storage type of a mapped field or declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ValueType {
    /// Whether a parameter of type `self` may be compared with a field of
    /// type `field`.
    pub fn compatible_with(self, field: ValueType) -> bool {
        matches!(
            (self, field),
            (Self::Integer, Self::Integer)
                | (Self::Integer, Self::Real)
                | (Self::Real, Self::Real)
                | (Self::Text, Self::Text)
                | (Self::Boolean, Self::Boolean)
                | (Self::Integer, Self::Boolean)
        )
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// One mapped entity property.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldMeta {
    /// Property name used by method grammar and sort specs, e.g. `teamId`.
    pub name: &'static str,
    /// Column name in the entity table, e.g. `team_id`.
    pub column: &'static str,
    pub ty: ValueType,
    pub nullable: bool,
}

/// Query template registered on an entity under a stable name.
#[derive(Debug, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: &'static str,
    pub template: &'static str,
}

/// Mapping of one entity kind onto its table.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityMeta {
    /// Entity kind, also the namespace of its descriptors (`Member`).
    pub kind: &'static str,
    pub table: &'static str,
    pub id: FieldMeta,
    /// Non-id fields in insert order.
    pub fields: &'static [FieldMeta],
    pub named_queries: &'static [NamedQuery],
}

impl EntityMeta {
    /// Looks up a property by name, the id included.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        if self.id.name == name {
            return Some(&self.id);
        }
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn named_query(&self, name: &str) -> Option<&'static str> {
        self.named_queries
            .iter()
            .find(|query| query.name == name)
            .map(|query| query.template)
    }

    /// Id column followed by every mapped column.
    pub fn select_list(&self) -> String {
        std::iter::once(self.id.column)
            .chain(self.fields.iter().map(|field| field.column))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Persistent entity type mapped by a static [`EntityMeta`].
pub trait Entity: Clone + Send + Sync + 'static {
    fn meta() -> &'static EntityMeta;

    /// Primary key, `None` until the entity is first saved.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Rebuilds an instance from a row selected with [`EntityMeta::select_list`].
    fn from_row(row: &RawRow) -> Result<Self, String>;

    /// Values of `meta().fields`, in the same order.
    fn column_values(&self) -> Vec<Value>;

    /// Checks write invariants; the error is a human-readable reason.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
