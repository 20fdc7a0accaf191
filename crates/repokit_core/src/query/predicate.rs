//! Typed filter/sort/limit model produced by query derivation.
//!
//! Leaf data only. Rendering lives in the binder, parsing in `derive`.

use crate::query::meta::{FieldMeta, ValueType};
use crate::query::template::QueryTemplate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Comparison applied by one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    Like,
    StartingWith,
    EndingWith,
    Containing,
    IsNull,
    IsNotNull,
}

impl Comparator {
    /// Number of parameters consumed by the comparator.
    pub fn arity(self) -> usize {
        match self {
            Self::IsNull | Self::IsNotNull => 0,
            Self::Between => 2,
            _ => 1,
        }
    }

    /// Whether the comparator expects a collection parameter.
    pub fn takes_collection(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Whether the comparator only applies to text fields.
    pub fn is_text_match(self) -> bool {
        matches!(
            self,
            Self::Like | Self::StartingWith | Self::EndingWith | Self::Containing
        )
    }
}

/// Boolean connective joining clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connective {
    #[default]
    And,
}

/// Whether a parameter carries one value or a set (IN semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Scalar,
    Collection,
}

/// Declared query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRef {
    /// Placeholder name; `None` for purely positional parameters.
    pub name: Option<String>,
    /// Zero-based declaration position.
    pub index: usize,
    pub ty: ValueType,
    pub multiplicity: Multiplicity,
}

impl ParameterRef {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!(":{name}"),
            None => format!("?{}", self.index + 1),
        }
    }
}

/// One `(field, comparator, parameters)` filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: &'static FieldMeta,
    pub comparator: Comparator,
    /// Indexes into the descriptor's declared parameters, `arity()` long.
    pub params: Vec<usize>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One sort key expressed by entity field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: Direction,
}

/// Ordered sort keys; empty means store-defined order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    orders: Vec<SortOrder>,
}

impl SortSpec {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sorts by every field in `fields` with the same direction.
    pub fn by(direction: Direction, fields: &[&str]) -> Self {
        Self {
            orders: fields
                .iter()
                .map(|field| SortOrder {
                    field: (*field).to_string(),
                    direction,
                })
                .collect(),
        }
    }

    pub fn asc(field: &str) -> Self {
        Self::by(Direction::Asc, &[field])
    }

    pub fn desc(field: &str) -> Self {
        Self::by(Direction::Desc, &[field])
    }

    /// Appends `other`'s keys after this spec's keys.
    pub fn and(mut self, other: SortSpec) -> Self {
        self.orders.extend(other.orders);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, direction: Direction) {
        self.orders.push(SortOrder {
            field: field.into(),
            direction,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.orders
    }
}

impl Display for SortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.orders.is_empty() {
            return f.write_str("UNSORTED");
        }
        let rendered = self
            .orders
            .iter()
            .map(|order| format!("{}: {}", order.field, order.direction.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

/// Compiled filter/sort/limit intent of one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateModel {
    pub clauses: Vec<Clause>,
    pub connective: Connective,
    pub distinct: bool,
    /// `Top<N>` / `First<N>` row cap.
    pub limit: Option<u64>,
    /// Static sort from an `OrderBy` suffix.
    pub sort: SortSpec,
    /// Explicit query overriding derived clauses.
    pub template: Option<QueryTemplate>,
    /// Explicit count query for counted pages.
    pub count_template: Option<QueryTemplate>,
}

impl PredicateModel {
    /// Total number of parameters consumed by the derived clauses.
    pub fn clause_arity(&self) -> usize {
        self.clauses
            .iter()
            .map(|clause| clause.comparator.arity())
            .sum()
    }
}
