//! Call-site argument binding and statement rendering.
//!
//! # Responsibility
//! - Match arguments to declared parameters by name or by position.
//! - Coerce argument values to the declared parameter types.
//! - Render the content statement, and the count statement for counted
//!   pages, as SQLite text with anonymous `?` parameters.
//!
//! # Invariants
//! - Collection parameters expand to `(?, ?, ...)`; an empty set renders
//!   `()`, which matches no row.
//! - Appended clauses start on a new line so a trailing `--` comment in a
//!   template cannot swallow them.
//! - Sort and window clauses are never carried into a count statement.

use crate::query::descriptor::{Cardinality, QueryDescriptor, ResultMapping};
use crate::query::error::{QueryError, QueryResult};
use crate::query::meta::{EntityMeta, ValueType};
use crate::query::page::FetchWindow;
use crate::query::predicate::{Clause, Comparator, Multiplicity, ParameterRef, SortSpec};
use crate::query::template::{QueryTemplate, Segment, StatementKind};
use rusqlite::types::Value;

/// One call-site argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    /// Value set for collection parameters.
    List(Vec<Arg>),
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Arguments of one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Args {
    /// Matched to declared parameters in declaration order.
    Positional(Vec<Arg>),
    /// Matched to declared parameters by placeholder name.
    Named(Vec<(String, Arg)>),
    /// Named values added to a positional list; always refused at bind time.
    Mixed {
        positional: Vec<Arg>,
        named: Vec<(String, Arg)>,
    },
    #[default]
    None,
}

impl Args {
    pub fn positional<I, A>(values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Starts an empty named argument list.
    pub fn named() -> Self {
        Self::Named(Vec::new())
    }

    /// Adds `name = value`. On a positional list the result is
    /// [`Args::Mixed`], which binding rejects.
    pub fn with(self, name: &str, value: impl Into<Arg>) -> Self {
        let pair = (name.to_string(), value.into());
        match self {
            Self::Named(mut pairs) => {
                pairs.push(pair);
                Self::Named(pairs)
            }
            Self::None => Self::Named(vec![pair]),
            Self::Positional(positional) => Self::Mixed {
                positional,
                named: vec![pair],
            },
            Self::Mixed {
                positional,
                mut named,
            } => {
                named.push(pair);
                Self::Mixed { positional, named }
            }
        }
    }
}

/// Rendered statement plus its ordered parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Argument resolved against its declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    Scalar(Value),
    Collection(Vec<Value>),
}

/// Statements for one execution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoundStatements {
    pub content: BoundQuery,
    pub count: Option<BoundQuery>,
}

/// Matches `args` to the descriptor's declared parameters.
pub(crate) fn resolve_args(descriptor: &QueryDescriptor, args: &Args) -> QueryResult<Vec<Resolved>> {
    let id = descriptor.id();
    let params = descriptor.params();
    match args {
        Args::Mixed { positional, named } => Err(QueryError::binding(
            id,
            format!(
                "{} positional and {} named arguments cannot be mixed",
                positional.len(),
                named.len()
            ),
        )),
        Args::Positional(_) | Args::None => {
            let values: &[Arg] = match args {
                Args::Positional(values) => values,
                _ => &[],
            };
            if values.len() != params.len() {
                return Err(QueryError::binding(
                    id,
                    format!("expected {} arguments, got {}", params.len(), values.len()),
                ));
            }
            params
                .iter()
                .zip(values)
                .map(|(param, arg)| coerce(id, param, arg))
                .collect()
        }
        Args::Named(pairs) => {
            if !descriptor.binds_by_name() {
                return Err(QueryError::binding(
                    id,
                    "named arguments need a template with named placeholders",
                ));
            }
            for (index, (name, _)) in pairs.iter().enumerate() {
                if descriptor.param_by_name(name).is_none() {
                    return Err(QueryError::binding(id, format!("unknown parameter `{name}`")));
                }
                if pairs[..index].iter().any(|(earlier, _)| earlier == name) {
                    return Err(QueryError::binding(
                        id,
                        format!("parameter `{name}` is bound twice"),
                    ));
                }
            }
            if pairs.len() != params.len() {
                return Err(QueryError::binding(
                    id,
                    format!("expected {} arguments, got {}", params.len(), pairs.len()),
                ));
            }
            params
                .iter()
                .map(|param| {
                    let label = param.label();
                    let arg = pairs
                        .iter()
                        .find(|(name, _)| param.name.as_deref() == Some(name.as_str()))
                        .map(|(_, arg)| arg)
                        .ok_or_else(|| {
                            QueryError::binding(id, format!("missing argument for {label}"))
                        })?;
                    coerce(id, param, arg)
                })
                .collect()
        }
    }
}

fn coerce(id: &str, param: &ParameterRef, arg: &Arg) -> QueryResult<Resolved> {
    match (param.multiplicity, arg) {
        (Multiplicity::Collection, Arg::List(items)) => items
            .iter()
            .map(|item| match item {
                Arg::List(_) => Err(QueryError::binding(
                    id,
                    format!("{} does not accept nested collections", param.label()),
                )),
                scalar => coerce_scalar(id, param, scalar),
            })
            .collect::<QueryResult<Vec<_>>>()
            .map(Resolved::Collection),
        (Multiplicity::Collection, _) => Err(QueryError::binding(
            id,
            format!("{} expects a collection", param.label()),
        )),
        (Multiplicity::Scalar, Arg::List(_)) => Err(QueryError::binding(
            id,
            format!("{} expects a single value", param.label()),
        )),
        (Multiplicity::Scalar, scalar) => coerce_scalar(id, param, scalar).map(Resolved::Scalar),
    }
}

fn coerce_scalar(id: &str, param: &ParameterRef, arg: &Arg) -> QueryResult<Value> {
    let value = match (param.ty, arg) {
        (_, Arg::Null) => Some(Value::Null),
        (ValueType::Integer, Arg::Integer(value)) => Some(Value::Integer(*value)),
        (ValueType::Integer, Arg::Boolean(value)) => Some(Value::Integer(i64::from(*value))),
        (ValueType::Real, Arg::Real(value)) => Some(Value::Real(*value)),
        (ValueType::Real, Arg::Integer(value)) => Some(Value::Real(*value as f64)),
        (ValueType::Text, Arg::Text(value)) => Some(Value::Text(value.clone())),
        (ValueType::Boolean, Arg::Boolean(value)) => Some(Value::Integer(i64::from(*value))),
        (ValueType::Boolean, Arg::Integer(value)) if matches!(value, 0 | 1) => {
            Some(Value::Integer(*value))
        }
        _ => None,
    };
    value.ok_or_else(|| {
        QueryError::binding(
            id,
            format!("{} expects {}, got {arg:?}", param.label(), param.ty),
        )
    })
}

/// Renders every statement one execution needs.
pub(crate) fn render(
    descriptor: &QueryDescriptor,
    resolved: &[Resolved],
    window: FetchWindow,
    sort: &SortSpec,
    with_count: bool,
) -> QueryResult<BoundStatements> {
    let predicate = descriptor.predicate();
    let id = descriptor.id();
    match &predicate.template {
        Some(template) => {
            let content = render_template_content(descriptor, template, resolved, window, sort)?;
            let count = if with_count {
                let count_template = match &predicate.count_template {
                    Some(explicit) => explicit.clone(),
                    None => template
                        .without_result_shaping()
                        .map_err(|reason| QueryError::spec(id, reason))?,
                };
                let mut out = Statement::default();
                if predicate.count_template.is_some() {
                    render_segments(descriptor, &count_template, resolved, &mut out)?;
                } else {
                    out.sql.push_str("SELECT COUNT(*) FROM (\n");
                    render_segments(descriptor, &count_template, resolved, &mut out)?;
                    out.sql.push_str("\n)");
                }
                Some(out.finish(StatementKind::Read))
            } else {
                None
            };
            Ok(BoundStatements { content, count })
        }
        None => {
            let content = render_derived_content(descriptor, resolved, window, sort)?;
            let count = if with_count {
                Some(render_derived_count(descriptor, resolved)?)
            } else {
                None
            };
            Ok(BoundStatements { content, count })
        }
    }
}

/// Renders the statements of `descriptor` with placeholder values, for
/// compile-only verification against the store.
pub(crate) fn probe(descriptor: &QueryDescriptor) -> QueryResult<Vec<String>> {
    let resolved: Vec<Resolved> = descriptor
        .params()
        .iter()
        .map(|param| {
            let sample = match param.ty {
                ValueType::Integer | ValueType::Boolean => Value::Integer(0),
                ValueType::Real => Value::Real(0.0),
                ValueType::Text => Value::Text(String::new()),
            };
            match param.multiplicity {
                Multiplicity::Scalar => Resolved::Scalar(sample),
                Multiplicity::Collection => Resolved::Collection(vec![sample]),
            }
        })
        .collect();
    let cardinality = descriptor.cardinality();
    let window = FetchWindow {
        limit: (!descriptor.is_mutation()
            && !descriptor
                .predicate()
                .template
                .as_ref()
                .is_some_and(QueryTemplate::has_limit))
        .then_some(1),
        offset: 0,
    };
    let statements = render(
        descriptor,
        &resolved,
        window,
        &SortSpec::unsorted(),
        cardinality == Cardinality::CountedPage,
    )?;
    let mut out = vec![statements.content.sql];
    if let Some(count) = statements.count {
        out.push(count.sql);
    }
    Ok(out)
}

#[derive(Default)]
struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    fn push_resolved(&mut self, value: &Resolved) {
        match value {
            Resolved::Scalar(value) => {
                self.sql.push('?');
                self.params.push(value.clone());
            }
            Resolved::Collection(values) => {
                self.sql.push('(');
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        self.sql.push_str(", ");
                    }
                    self.sql.push('?');
                    self.params.push(value.clone());
                }
                self.sql.push(')');
            }
        }
    }

    fn push_window(&mut self, window: FetchWindow) {
        match (window.limit, window.offset) {
            (None, 0) => {}
            (Some(limit), 0) => {
                self.sql.push_str("\nLIMIT ?");
                self.params.push(Value::Integer(to_sql_int(limit)));
            }
            (Some(limit), offset) => {
                self.sql.push_str("\nLIMIT ? OFFSET ?");
                self.params.push(Value::Integer(to_sql_int(limit)));
                self.params.push(Value::Integer(to_sql_int(offset)));
            }
            (None, offset) => {
                self.sql.push_str("\nLIMIT -1 OFFSET ?");
                self.params.push(Value::Integer(to_sql_int(offset)));
            }
        }
    }

    fn finish(self, kind: StatementKind) -> BoundQuery {
        BoundQuery {
            kind,
            sql: self.sql,
            params: self.params,
        }
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn render_segments(
    descriptor: &QueryDescriptor,
    template: &QueryTemplate,
    resolved: &[Resolved],
    out: &mut Statement,
) -> QueryResult<()> {
    let id = descriptor.id();
    for segment in template.segments() {
        let index = match segment {
            Segment::Text(text) => {
                out.sql.push_str(text);
                continue;
            }
            Segment::Named(name) => descriptor
                .param_by_name(name)
                .map(|param| param.index)
                .ok_or_else(|| QueryError::binding(id, format!("no argument for :{name}")))?,
            Segment::Positional(position) => position - 1,
        };
        let value = resolved
            .get(index)
            .ok_or_else(|| QueryError::binding(id, format!("no argument at position {}", index + 1)))?;
        out.push_resolved(value);
    }
    Ok(())
}

fn render_template_content(
    descriptor: &QueryDescriptor,
    template: &QueryTemplate,
    resolved: &[Resolved],
    window: FetchWindow,
    sort: &SortSpec,
) -> QueryResult<BoundQuery> {
    let id = descriptor.id();
    if template.has_limit() && (!sort.is_empty() || window != FetchWindow::default()) {
        return Err(QueryError::binding(
            id,
            "template limits its own rows and cannot take a sort or page window",
        ));
    }
    let mut out = Statement::default();
    render_segments(descriptor, template, resolved, &mut out)?;
    if !sort.is_empty() {
        let order = render_order(id, descriptor.entity(), sort)?;
        if template.has_order_by() {
            out.sql.push_str("\n, ");
        } else {
            out.sql.push_str("\nORDER BY ");
        }
        out.sql.push_str(&order);
    }
    out.push_window(window);
    Ok(out.finish(template.kind()))
}

fn render_derived_content(
    descriptor: &QueryDescriptor,
    resolved: &[Resolved],
    window: FetchWindow,
    sort: &SortSpec,
) -> QueryResult<BoundQuery> {
    let id = descriptor.id();
    let entity = descriptor.entity();
    let predicate = descriptor.predicate();
    let mut out = Statement::default();

    if *descriptor.mapping() == ResultMapping::Count {
        render_count_body(descriptor, resolved, &mut out)?;
        return Ok(out.finish(StatementKind::Read));
    }

    out.sql.push_str("SELECT ");
    if predicate.distinct {
        out.sql.push_str("DISTINCT ");
    }
    out.sql.push_str(&select_list(descriptor));
    out.sql.push_str(" FROM ");
    out.sql.push_str(entity.table);
    render_where(descriptor, resolved, &mut out)?;

    let combined = predicate.sort.clone().and(sort.clone());
    if !combined.is_empty() {
        out.sql.push_str("\nORDER BY ");
        out.sql.push_str(&render_order(id, entity, &combined)?);
    }
    out.push_window(window);
    Ok(out.finish(StatementKind::Read))
}

fn render_derived_count(descriptor: &QueryDescriptor, resolved: &[Resolved]) -> QueryResult<BoundQuery> {
    let mut out = Statement::default();
    render_count_body(descriptor, resolved, &mut out)?;
    Ok(out.finish(StatementKind::Read))
}

fn render_count_body(
    descriptor: &QueryDescriptor,
    resolved: &[Resolved],
    out: &mut Statement,
) -> QueryResult<()> {
    let entity = descriptor.entity();
    if descriptor.predicate().distinct {
        out.sql.push_str("SELECT COUNT(*) FROM (SELECT DISTINCT ");
        out.sql.push_str(&select_list(descriptor));
        out.sql.push_str(" FROM ");
        out.sql.push_str(entity.table);
        render_where(descriptor, resolved, out)?;
        out.sql.push(')');
    } else {
        out.sql.push_str("SELECT COUNT(*) FROM ");
        out.sql.push_str(entity.table);
        render_where(descriptor, resolved, out)?;
    }
    Ok(())
}

fn select_list(descriptor: &QueryDescriptor) -> String {
    let entity = descriptor.entity();
    match descriptor.mapping() {
        ResultMapping::Projection(fields) => fields
            .iter()
            .filter_map(|name| entity.field(name))
            .map(|field| field.column)
            .collect::<Vec<_>>()
            .join(", "),
        ResultMapping::Entity | ResultMapping::Count => entity.select_list(),
    }
}

fn render_where(
    descriptor: &QueryDescriptor,
    resolved: &[Resolved],
    out: &mut Statement,
) -> QueryResult<()> {
    let clauses = &descriptor.predicate().clauses;
    for (index, clause) in clauses.iter().enumerate() {
        out.sql.push_str(if index == 0 { " WHERE " } else { " AND " });
        render_clause(descriptor.id(), clause, resolved, out)?;
    }
    Ok(())
}

fn render_clause(
    id: &str,
    clause: &Clause,
    resolved: &[Resolved],
    out: &mut Statement,
) -> QueryResult<()> {
    let column = clause.field.column;
    let arg = |position: usize| -> QueryResult<&Resolved> {
        clause
            .params
            .get(position)
            .and_then(|index| resolved.get(*index))
            .ok_or_else(|| QueryError::binding(id, format!("missing argument for `{}`", clause.field.name)))
    };
    let binary = |out: &mut Statement, operator: &str, value: &Resolved| {
        out.sql.push_str(column);
        out.sql.push(' ');
        out.sql.push_str(operator);
        out.sql.push(' ');
        out.push_resolved(value);
    };

    match clause.comparator {
        Comparator::Equal => match arg(0)? {
            Resolved::Scalar(Value::Null) => {
                out.sql.push_str(column);
                out.sql.push_str(" IS NULL");
            }
            value => binary(out, "=", value),
        },
        Comparator::NotEqual => match arg(0)? {
            Resolved::Scalar(Value::Null) => {
                out.sql.push_str(column);
                out.sql.push_str(" IS NOT NULL");
            }
            value => binary(out, "<>", value),
        },
        Comparator::GreaterThan => binary(out, ">", arg(0)?),
        Comparator::GreaterThanEqual => binary(out, ">=", arg(0)?),
        Comparator::LessThan => binary(out, "<", arg(0)?),
        Comparator::LessThanEqual => binary(out, "<=", arg(0)?),
        Comparator::Between => {
            let (low, high) = (arg(0)?, arg(1)?);
            binary(out, "BETWEEN", low);
            out.sql.push_str(" AND ");
            out.push_resolved(high);
        }
        Comparator::In => binary(out, "IN", arg(0)?),
        Comparator::NotIn => binary(out, "NOT IN", arg(0)?),
        Comparator::Like
        | Comparator::StartingWith
        | Comparator::EndingWith
        | Comparator::Containing => {
            let pattern = like_pattern(clause.comparator, arg(0)?);
            binary(out, "LIKE", &pattern);
            out.sql.push_str(" ESCAPE '\\'");
        }
        Comparator::IsNull => {
            out.sql.push_str(column);
            out.sql.push_str(" IS NULL");
        }
        Comparator::IsNotNull => {
            out.sql.push_str(column);
            out.sql.push_str(" IS NOT NULL");
        }
    }
    Ok(())
}

fn like_pattern(comparator: Comparator, value: &Resolved) -> Resolved {
    let Resolved::Scalar(Value::Text(text)) = value else {
        return value.clone();
    };
    let escaped = || {
        text.replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    };
    let pattern = match comparator {
        Comparator::StartingWith => format!("{}%", escaped()),
        Comparator::EndingWith => format!("%{}", escaped()),
        Comparator::Containing => format!("%{}%", escaped()),
        _ => text.clone(),
    };
    Resolved::Scalar(Value::Text(pattern))
}

fn render_order(id: &str, entity: &EntityMeta, sort: &SortSpec) -> QueryResult<String> {
    sort.orders()
        .iter()
        .map(|order| {
            entity
                .field(&order.field)
                .map(|field| format!("{} {}", field.column, order.direction.as_sql()))
                .ok_or_else(|| {
                    QueryError::binding(
                        id,
                        format!("sort property `{}` does not exist on {}", order.field, entity.kind),
                    )
                })
        })
        .collect::<QueryResult<Vec<_>>>()
        .map(|orders| orders.join(", "))
}

#[cfg(test)]
mod tests {
    use super::{probe, render, resolve_args, Arg, Args, Resolved};
    use crate::model::member::MEMBER_META;
    use crate::query::descriptor::{Cardinality, QueryDescriptor};
    use crate::query::error::QueryError;
    use crate::query::meta::ValueType;
    use crate::query::page::FetchWindow;
    use crate::query::predicate::SortSpec;
    use rusqlite::types::Value;

    fn unbounded() -> FetchWindow {
        FetchWindow {
            limit: None,
            offset: 0,
        }
    }

    #[test]
    fn derived_clauses_render_in_declaration_order() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByUsernameAndAgeGreaterThan")
            .param(ValueType::Text)
            .param(ValueType::Integer)
            .build()
            .unwrap();
        let resolved = resolve_args(&descriptor, &Args::positional([Arg::from("AAA"), Arg::from(15)])).unwrap();
        let bound = render(&descriptor, &resolved, unbounded(), &SortSpec::unsorted(), false).unwrap();
        assert_eq!(
            bound.content.sql,
            "SELECT member_id, username, age, team_id FROM member WHERE username = ? AND age > ?"
        );
        assert_eq!(
            bound.content.params,
            vec![Value::Text("AAA".into()), Value::Integer(15)]
        );
    }

    #[test]
    fn null_equality_renders_is_null() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByTeamId")
            .param(ValueType::Integer)
            .build()
            .unwrap();
        let resolved = resolve_args(&descriptor, &Args::positional([Arg::Null])).unwrap();
        let bound = render(&descriptor, &resolved, unbounded(), &SortSpec::unsorted(), false).unwrap();
        assert!(bound.content.sql.ends_with("WHERE team_id IS NULL"));
        assert!(bound.content.params.is_empty());
    }

    #[test]
    fn empty_collection_renders_an_empty_in_list() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByUsernameIn")
            .collection_param(ValueType::Text)
            .build()
            .unwrap();
        let resolved = resolve_args(&descriptor, &Args::positional([Arg::List(Vec::new())])).unwrap();
        assert_eq!(resolved, vec![Resolved::Collection(Vec::new())]);
        let bound = render(&descriptor, &resolved, unbounded(), &SortSpec::unsorted(), false).unwrap();
        assert!(bound.content.sql.ends_with("WHERE username IN ()"));
    }

    #[test]
    fn starting_with_escapes_wildcards() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByUsernameStartingWith")
            .param(ValueType::Text)
            .build()
            .unwrap();
        let resolved = resolve_args(&descriptor, &Args::positional(["a_b%"])).unwrap();
        let bound = render(&descriptor, &resolved, unbounded(), &SortSpec::unsorted(), false).unwrap();
        assert!(bound.content.sql.ends_with("username LIKE ? ESCAPE '\\'"));
        assert_eq!(bound.content.params, vec![Value::Text("a\\_b\\%%".into())]);
    }

    #[test]
    fn derived_count_drops_sort_and_window() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findPageByAge")
            .param(ValueType::Integer)
            .returns(Cardinality::CountedPage)
            .build()
            .unwrap();
        let resolved = resolve_args(&descriptor, &Args::positional([10])).unwrap();
        let window = FetchWindow {
            limit: Some(3),
            offset: 3,
        };
        let bound = render(&descriptor, &resolved, window, &SortSpec::desc("username"), true).unwrap();
        assert!(bound
            .content
            .sql
            .ends_with("WHERE age = ?\nORDER BY username DESC\nLIMIT ? OFFSET ?"));
        let count = bound.count.unwrap();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM member WHERE age = ?");
        assert_eq!(count.params, vec![Value::Integer(10)]);
    }

    #[test]
    fn template_count_wraps_the_unshaped_template() {
        let descriptor = QueryDescriptor::template(
            &MEMBER_META,
            "findPageWithCustomQueryByAge",
            "SELECT m.* FROM member m LEFT JOIN team t ON m.team_id = t.team_id WHERE m.age = :age ORDER BY m.username",
        )
        .named_param("age", ValueType::Integer)
        .returns(Cardinality::CountedPage)
        .build()
        .unwrap();
        let resolved = resolve_args(&descriptor, &Args::named().with("age", 10)).unwrap();
        let window = FetchWindow {
            limit: Some(3),
            offset: 0,
        };
        let bound = render(&descriptor, &resolved, window, &SortSpec::desc("age"), true).unwrap();
        assert!(bound.content.sql.ends_with("ORDER BY m.username\n, age DESC\nLIMIT ?"));
        let count = bound.count.unwrap();
        assert!(count.sql.starts_with("SELECT COUNT(*) FROM (\nSELECT m.* FROM member m"));
        assert!(!count.sql.contains("ORDER BY"));
        assert_eq!(count.params, vec![Value::Integer(10)]);
    }

    #[test]
    fn appended_sort_starts_below_a_trailing_comment() {
        let descriptor = QueryDescriptor::template(
            &MEMBER_META,
            "findAllByAgeOrder",
            "SELECT m.* FROM member m ORDER BY m.age -- by age",
        )
        .build()
        .unwrap();
        let bound = render(&descriptor, &[], unbounded(), &SortSpec::desc("username"), false).unwrap();
        assert_eq!(
            bound.content.sql,
            "SELECT m.* FROM member m ORDER BY m.age -- by age\n, username DESC"
        );
    }

    #[test]
    fn named_values_on_a_positional_list_are_refused() {
        let descriptor = QueryDescriptor::template(
            &MEMBER_META,
            "findByAgeTemplate",
            "SELECT m.* FROM member m WHERE m.age = :age",
        )
        .named_param("age", ValueType::Integer)
        .build()
        .unwrap();
        let args = Args::positional([10]).with("age", 20).with("other", 1);
        assert_eq!(
            args,
            Args::Mixed {
                positional: vec![Arg::from(10)],
                named: vec![("age".to_string(), Arg::from(20)), ("other".to_string(), Arg::from(1))],
            }
        );
        assert!(matches!(
            resolve_args(&descriptor, &args),
            Err(QueryError::ParameterBinding { .. })
        ));
    }

    #[test]
    fn argument_count_and_type_are_checked() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByAge")
            .param(ValueType::Integer)
            .build()
            .unwrap();
        assert!(matches!(
            resolve_args(&descriptor, &Args::None),
            Err(QueryError::ParameterBinding { .. })
        ));
        assert!(matches!(
            resolve_args(&descriptor, &Args::positional(["ten"])),
            Err(QueryError::ParameterBinding { .. })
        ));
        assert!(matches!(
            resolve_args(&descriptor, &Args::named().with("age", 10)),
            Err(QueryError::ParameterBinding { .. })
        ));
    }

    #[test]
    fn probe_renders_every_statement() {
        let descriptor = QueryDescriptor::derived(&MEMBER_META, "findPageByAge")
            .param(ValueType::Integer)
            .returns(Cardinality::CountedPage)
            .build()
            .unwrap();
        assert_eq!(probe(&descriptor).unwrap().len(), 2);
    }
}
