//! Compiled query descriptors and their registration-time validation.
//!
//! # Invariants
//! - A descriptor is immutable once built; every grammar, field, arity and
//!   placeholder check happens in [`DescriptorBuilder::build`].
//! - Cardinality is declared by the caller, never inferred from the predicate.

use crate::query::derive::{parse_method_name, MethodAction};
use crate::query::error::{QueryError, QueryResult};
use crate::query::meta::{EntityMeta, ValueType};
use crate::query::predicate::{
    Clause, Connective, Multiplicity, ParameterRef, PredicateModel, SortSpec,
};
use crate::query::template::{QueryTemplate, StatementKind};
use log::warn;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Declared result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Single row; absence is a plain `None`.
    One,
    /// Single row; absence is an explicit optional value.
    OneOrNone,
    Many,
    CountedPage,
    UncountedSlice,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "ONE",
            Self::OneOrNone => "ONE_OR_NONE",
            Self::Many => "MANY",
            Self::CountedPage => "COUNTED_PAGE",
            Self::UncountedSlice => "UNCOUNTED_SLICE",
        }
    }

    pub fn is_unique(self) -> bool {
        matches!(self, Self::One | Self::OneOrNone)
    }

    pub fn is_paged(self) -> bool {
        matches!(self, Self::CountedPage | Self::UncountedSlice)
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of one result element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultMapping {
    /// Full entity reconstruction, identity-resolved through the cache.
    Entity,
    /// Fixed set of properties assembled into a value object.
    Projection(Vec<&'static str>),
    /// Single `COUNT(*)` scalar.
    Count,
}

/// Where a descriptor's query comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryIntent {
    /// Derived from the method-name grammar.
    Derived,
    /// Explicit template text.
    Template(String),
    /// Template registered on the entity under this name.
    Named(String),
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Derived => "derived",
            Self::Template(_) => "template",
            Self::Named(_) => "named",
        }
    }
}

/// When the entity cache is cleared after a bulk mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Invalidation {
    /// The caller must call `BulkOutcome::invalidate`.
    #[default]
    Manual,
    /// The engine clears the affected kind right after the write.
    Automatic,
}

/// Immutable compiled form of one declared access method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    id: String,
    method: String,
    intent: QueryIntent,
    entity: &'static EntityMeta,
    params: Vec<ParameterRef>,
    predicate: PredicateModel,
    cardinality: Cardinality,
    mapping: ResultMapping,
    mutation: Option<Invalidation>,
}

impl QueryDescriptor {
    /// Starts a descriptor derived from `method`'s name.
    pub fn derived(entity: &'static EntityMeta, method: &str) -> DescriptorBuilder {
        DescriptorBuilder::new(entity, method, QueryIntent::Derived)
    }

    /// Starts a descriptor backed by an explicit template.
    pub fn template(
        entity: &'static EntityMeta,
        method: &str,
        template: impl Into<String>,
    ) -> DescriptorBuilder {
        DescriptorBuilder::new(entity, method, QueryIntent::Template(template.into()))
    }

    /// Starts a descriptor backed by one of the entity's named queries.
    pub fn named(
        entity: &'static EntityMeta,
        method: &str,
        query_name: impl Into<String>,
    ) -> DescriptorBuilder {
        DescriptorBuilder::new(entity, method, QueryIntent::Named(query_name.into()))
    }

    /// Registry key, `<EntityKind>.<method>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn intent(&self) -> &QueryIntent {
        &self.intent
    }

    pub fn entity(&self) -> &'static EntityMeta {
        self.entity
    }

    pub fn params(&self) -> &[ParameterRef] {
        &self.params
    }

    pub fn predicate(&self) -> &PredicateModel {
        &self.predicate
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn mapping(&self) -> &ResultMapping {
        &self.mapping
    }

    pub fn is_mutation(&self) -> bool {
        self.mutation.is_some()
    }

    pub fn invalidation(&self) -> Option<Invalidation> {
        self.mutation
    }

    /// Whether arguments are matched by placeholder name.
    pub fn binds_by_name(&self) -> bool {
        self.predicate
            .template
            .as_ref()
            .is_some_and(|template| template.named_placeholders().next().is_some())
    }

    pub(crate) fn param_by_name(&self, name: &str) -> Option<&ParameterRef> {
        self.params
            .iter()
            .find(|param| param.name.as_deref() == Some(name))
    }
}

/// Collects a declaration and validates it once in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    entity: &'static EntityMeta,
    method: String,
    intent: QueryIntent,
    params: Vec<(Option<String>, ValueType, Multiplicity)>,
    cardinality: Cardinality,
    mapping: ResultMapping,
    count_template: Option<String>,
    mutation: Option<Invalidation>,
}

impl DescriptorBuilder {
    fn new(entity: &'static EntityMeta, method: &str, intent: QueryIntent) -> Self {
        Self {
            entity,
            method: method.to_string(),
            intent,
            params: Vec::new(),
            cardinality: Cardinality::Many,
            mapping: ResultMapping::Entity,
            count_template: None,
            mutation: None,
        }
    }

    /// Declares the next positional scalar parameter.
    pub fn param(mut self, ty: ValueType) -> Self {
        self.params.push((None, ty, Multiplicity::Scalar));
        self
    }

    /// Declares the next positional collection parameter.
    pub fn collection_param(mut self, ty: ValueType) -> Self {
        self.params.push((None, ty, Multiplicity::Collection));
        self
    }

    /// Declares the next scalar parameter, bound to `:name`.
    pub fn named_param(mut self, name: &str, ty: ValueType) -> Self {
        self.params
            .push((Some(name.to_string()), ty, Multiplicity::Scalar));
        self
    }

    /// Declares the next collection parameter, bound to `:name`.
    pub fn named_collection_param(mut self, name: &str, ty: ValueType) -> Self {
        self.params
            .push((Some(name.to_string()), ty, Multiplicity::Collection));
        self
    }

    pub fn returns(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Maps rows to a value object. Derived methods select only the named
    /// properties; templates list the result columns they produce.
    pub fn projection(mut self, fields: &[&'static str]) -> Self {
        self.mapping = ResultMapping::Projection(fields.to_vec());
        self
    }

    /// Supplies an explicit count query for a counted page.
    pub fn count_query(mut self, template: impl Into<String>) -> Self {
        self.count_template = Some(template.into());
        self
    }

    /// Marks the descriptor as a bulk mutation.
    pub fn modifying(mut self, invalidation: Invalidation) -> Self {
        self.mutation = Some(invalidation);
        self
    }

    /// Validates the declaration and compiles it.
    ///
    /// # Errors
    /// - `InvalidQuerySpec` for grammar, field, arity, type or placeholder problems.
    /// - `InvalidBulkOperation` when the statement form contradicts `modifying`.
    pub fn build(self) -> QueryResult<QueryDescriptor> {
        let id = format!("{}.{}", self.entity.kind, self.method);
        let params = self.declared_params(&id)?;

        let (predicate, mapping) = match &self.intent {
            QueryIntent::Derived => self.compile_derived(&id, &params)?,
            QueryIntent::Template(source) => (
                self.compile_template(&id, source, &params)?,
                self.mapping.clone(),
            ),
            QueryIntent::Named(name) => {
                let source = self.entity.named_query(name).ok_or_else(|| {
                    QueryError::spec(&id, format!("named query `{name}` is not declared"))
                })?;
                (
                    self.compile_template(&id, source, &params)?,
                    self.mapping.clone(),
                )
            }
        };

        if let ResultMapping::Projection(fields) = &mapping {
            if fields.is_empty() {
                return Err(QueryError::spec(&id, "projection must name at least one field"));
            }
            // Template projections name result columns, not entity properties.
            let derived_fields: &[&str] = if self.intent == QueryIntent::Derived {
                fields.as_slice()
            } else {
                &[]
            };
            for field in derived_fields {
                if self.entity.field(field).is_none() {
                    return Err(QueryError::spec(
                        &id,
                        format!("projection field `{field}` does not exist on {}", self.entity.kind),
                    ));
                }
            }
        }

        Ok(QueryDescriptor {
            id,
            method: self.method,
            intent: self.intent,
            entity: self.entity,
            params,
            predicate,
            cardinality: self.cardinality,
            mapping,
            mutation: self.mutation,
        })
    }

    fn declared_params(&self, id: &str) -> QueryResult<Vec<ParameterRef>> {
        let mut seen = BTreeSet::new();
        let mut params = Vec::with_capacity(self.params.len());
        for (index, (name, ty, multiplicity)) in self.params.iter().enumerate() {
            if let Some(name) = name {
                if !seen.insert(name.as_str()) {
                    return Err(QueryError::spec(
                        id,
                        format!("parameter `{name}` is declared twice"),
                    ));
                }
            }
            params.push(ParameterRef {
                name: name.clone(),
                index,
                ty: *ty,
                multiplicity: *multiplicity,
            });
        }
        Ok(params)
    }

    fn compile_derived(
        &self,
        id: &str,
        params: &[ParameterRef],
    ) -> QueryResult<(PredicateModel, ResultMapping)> {
        if self.mutation.is_some() {
            return Err(QueryError::spec(
                id,
                "derived methods cannot be modifying; declare an explicit update template",
            ));
        }
        if self.count_template.is_some() {
            return Err(QueryError::spec(
                id,
                "count queries can only accompany explicit templates",
            ));
        }

        let method = parse_method_name(&self.method).map_err(|reason| QueryError::spec(id, reason))?;
        let mapping = match method.action {
            MethodAction::Count => {
                if self.cardinality != Cardinality::One {
                    return Err(QueryError::spec(id, "count methods must return ONE"));
                }
                ResultMapping::Count
            }
            MethodAction::Find => self.mapping.clone(),
        };
        if method.limit.is_some() && self.cardinality.is_paged() {
            return Err(QueryError::spec(
                id,
                format!("Top/First limits cannot be combined with {}", self.cardinality),
            ));
        }

        let mut clauses = Vec::with_capacity(method.parts.len());
        let mut next_param = 0;
        for (property, comparator) in &method.parts {
            let field = self.entity.field(property).ok_or_else(|| {
                QueryError::spec(
                    id,
                    format!("property `{property}` does not exist on {}", self.entity.kind),
                )
            })?;
            if comparator.is_text_match() && field.ty != ValueType::Text {
                return Err(QueryError::spec(
                    id,
                    format!("{comparator:?} requires a text property, `{property}` is {}", field.ty),
                ));
            }

            let arity = comparator.arity();
            if next_param + arity > params.len() {
                return Err(QueryError::spec(
                    id,
                    format!(
                        "method consumes more parameters than the {} declared",
                        params.len()
                    ),
                ));
            }
            let indexes: Vec<usize> = (next_param..next_param + arity).collect();
            for index in &indexes {
                let param = &params[*index];
                let expected = if comparator.takes_collection() {
                    Multiplicity::Collection
                } else {
                    Multiplicity::Scalar
                };
                if param.multiplicity != expected {
                    return Err(QueryError::spec(
                        id,
                        format!(
                            "parameter {} for `{property}` must be {expected:?}",
                            param.label()
                        ),
                    ));
                }
                if !param.ty.compatible_with(field.ty) {
                    return Err(QueryError::spec(
                        id,
                        format!(
                            "parameter {} is {} but `{property}` is {}",
                            param.label(),
                            param.ty,
                            field.ty
                        ),
                    ));
                }
            }
            next_param += arity;
            clauses.push(Clause {
                field,
                comparator: *comparator,
                params: indexes,
            });
        }
        let mut sort = SortSpec::unsorted();
        for (property, direction) in method.order {
            if self.entity.field(&property).is_none() {
                return Err(QueryError::spec(
                    id,
                    format!("order property `{property}` does not exist on {}", self.entity.kind),
                ));
            }
            sort.push(property, direction);
        }

        let predicate = PredicateModel {
            clauses,
            connective: Connective::And,
            distinct: method.distinct,
            limit: method.limit,
            sort,
            template: None,
            count_template: None,
        };
        let consumed = predicate.clause_arity();
        if consumed != params.len() {
            return Err(QueryError::spec(
                id,
                format!(
                    "method consumes {consumed} parameters but {} are declared",
                    params.len()
                ),
            ));
        }
        Ok((predicate, mapping))
    }

    fn compile_template(
        &self,
        id: &str,
        source: &str,
        params: &[ParameterRef],
    ) -> QueryResult<PredicateModel> {
        let template = QueryTemplate::parse(source).map_err(|reason| QueryError::spec(id, reason))?;
        match (template.kind(), self.mutation.is_some()) {
            (StatementKind::Mutation, false) => {
                return Err(QueryError::bulk(
                    id,
                    "template is an update/delete statement but the descriptor is not modifying",
                ));
            }
            (StatementKind::Read, true) => {
                return Err(QueryError::bulk(
                    id,
                    "descriptor is modifying but the template is a read statement",
                ));
            }
            _ => {}
        }
        if self.cardinality.is_paged() && template.has_limit() {
            return Err(QueryError::spec(
                id,
                format!("{} templates must not carry their own LIMIT", self.cardinality),
            ));
        }
        validate_placeholders(id, &template, params)?;

        let count_template = match &self.count_template {
            Some(count_source) => {
                if self.cardinality != Cardinality::CountedPage {
                    return Err(QueryError::spec(
                        id,
                        format!("count query is meaningless for {}", self.cardinality),
                    ));
                }
                let count = QueryTemplate::parse(count_source)
                    .map_err(|reason| QueryError::spec(id, format!("count query: {reason}")))?;
                if count.kind() != StatementKind::Read {
                    return Err(QueryError::spec(id, "count query must be a read statement"));
                }
                validate_placeholders(id, &count, params)?;
                Some(count)
            }
            None => None,
        };

        let unused: Vec<&str> = params
            .iter()
            .filter_map(|param| param.name.as_deref())
            .filter(|name| {
                !template.named_placeholders().any(|used| used == *name)
                    && !count_template
                        .as_ref()
                        .is_some_and(|count| count.named_placeholders().any(|used| used == *name))
            })
            .collect();
        if !unused.is_empty() {
            warn!(
                "event=descriptor_register module=query status=warn descriptor={} unused_params={}",
                id,
                unused.join(",")
            );
        }

        Ok(PredicateModel {
            template: Some(template),
            count_template,
            ..PredicateModel::default()
        })
    }
}

fn validate_placeholders(
    id: &str,
    template: &QueryTemplate,
    params: &[ParameterRef],
) -> QueryResult<()> {
    for name in template.named_placeholders() {
        if !params.iter().any(|param| param.name.as_deref() == Some(name)) {
            return Err(QueryError::spec(
                id,
                format!("placeholder `:{name}` has no declared parameter"),
            ));
        }
    }
    for position in template.positional_placeholders() {
        if position > params.len() {
            return Err(QueryError::spec(
                id,
                format!(
                    "placeholder `?{position}` exceeds the {} declared parameters",
                    params.len()
                ),
            ));
        }
    }
    Ok(())
}
