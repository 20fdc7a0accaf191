mod common;

use common::registry;
use repokit_core::db::open_db_in_memory;
use repokit_core::model::member::MEMBER_META;
use repokit_core::query::{
    Cardinality, DescriptorBuilder, DescriptorRegistry, Invalidation, QueryDescriptor, QueryError,
    ValueType,
};
use repokit_core::SqliteSession;

fn register(builder: DescriptorBuilder) -> QueryError {
    DescriptorRegistry::new().register(builder).unwrap_err()
}

fn assert_spec_error(builder: DescriptorBuilder, needle: &str) {
    match register(builder) {
        QueryError::InvalidQuerySpec { reason, .. } => {
            assert!(reason.contains(needle), "reason `{reason}` lacks `{needle}`")
        }
        other => panic!("expected InvalidQuerySpec, got {other:?}"),
    }
}

#[test]
fn unknown_property_is_rejected() {
    assert_spec_error(
        QueryDescriptor::derived(&MEMBER_META, "findByNickname").param(ValueType::Text),
        "nickname",
    );
}

#[test]
fn argument_count_must_match_the_method() {
    let err = register(
        QueryDescriptor::derived(&MEMBER_META, "findByUsernameAndAge").param(ValueType::Text),
    );
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));

    let err = register(
        QueryDescriptor::derived(&MEMBER_META, "findByAge")
            .param(ValueType::Integer)
            .param(ValueType::Integer),
    );
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
}

#[test]
fn between_consumes_two_declared_parameters() {
    let descriptor = QueryDescriptor::derived(&MEMBER_META, "findByAgeBetweenAndUsername")
        .param(ValueType::Integer)
        .param(ValueType::Integer)
        .param(ValueType::Text)
        .build()
        .unwrap();
    assert_eq!(descriptor.predicate().clause_arity(), 3);
    assert_eq!(descriptor.params().len(), 3);

    assert_spec_error(
        QueryDescriptor::derived(&MEMBER_META, "findByAgeBetween")
            .param(ValueType::Integer)
            .param(ValueType::Integer)
            .param(ValueType::Integer),
        "consumes 2 parameters but 3 are declared",
    );
}

#[test]
fn or_connective_is_rejected() {
    assert_spec_error(
        QueryDescriptor::derived(&MEMBER_META, "findByUsernameOrAge")
            .param(ValueType::Text)
            .param(ValueType::Integer),
        "Or",
    );
}

#[test]
fn text_operators_need_text_properties() {
    let err = register(
        QueryDescriptor::derived(&MEMBER_META, "findByAgeContaining").param(ValueType::Text),
    );
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
}

#[test]
fn undeclared_placeholder_is_rejected() {
    assert_spec_error(
        QueryDescriptor::template(
            &MEMBER_META,
            "findByCity",
            "SELECT m.* FROM member m WHERE m.username = :username AND m.age = :age",
        )
        .named_param("username", ValueType::Text),
        "age",
    );
}

#[test]
fn unknown_named_query_is_rejected() {
    assert_spec_error(
        QueryDescriptor::named(&MEMBER_META, "findByTeam", "Member.findByTeam")
            .named_param("team", ValueType::Integer),
        "Member.findByTeam",
    );
}

#[test]
fn write_template_must_be_marked_modifying() {
    let err = register(
        QueryDescriptor::template(
            &MEMBER_META,
            "resetAges",
            "UPDATE member SET age = 0 WHERE age >= :age",
        )
        .named_param("age", ValueType::Integer),
    );
    assert!(matches!(err, QueryError::InvalidBulkOperation { .. }));
}

#[test]
fn write_behind_a_with_clause_must_be_marked_modifying() {
    let source = "WITH x AS (SELECT 1) UPDATE member SET age = 99 WHERE age >= :age";
    let err = register(
        QueryDescriptor::template(&MEMBER_META, "raiseAges", source)
            .named_param("age", ValueType::Integer),
    );
    match err {
        QueryError::InvalidBulkOperation { descriptor, .. } => {
            assert_eq!(descriptor, "Member.raiseAges")
        }
        other => panic!("expected InvalidBulkOperation, got {other:?}"),
    }

    let mut registry = DescriptorRegistry::new();
    registry
        .register(
            QueryDescriptor::template(&MEMBER_META, "raiseAges", source)
                .named_param("age", ValueType::Integer)
                .modifying(Invalidation::Automatic),
        )
        .unwrap();
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    assert_eq!(registry.verify(&session).unwrap(), 1);
}

#[test]
fn read_template_cannot_be_modifying() {
    let err = register(
        QueryDescriptor::template(&MEMBER_META, "listAll", "SELECT m.* FROM member m")
            .modifying(Invalidation::Automatic),
    );
    assert!(matches!(err, QueryError::InvalidBulkOperation { .. }));
}

#[test]
fn derived_method_cannot_be_modifying() {
    let err = register(
        QueryDescriptor::derived(&MEMBER_META, "findByAge")
            .param(ValueType::Integer)
            .modifying(Invalidation::Manual),
    );
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
}

#[test]
fn top_cannot_be_combined_with_paging() {
    for cardinality in [Cardinality::CountedPage, Cardinality::UncountedSlice] {
        let err = register(
            QueryDescriptor::derived(&MEMBER_META, "findTop3ByAge")
                .param(ValueType::Integer)
                .returns(cardinality),
        );
        assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
    }
}

#[test]
fn count_query_requires_a_counted_page() {
    assert_spec_error(
        QueryDescriptor::template(
            &MEMBER_META,
            "findAllByAge",
            "SELECT m.* FROM member m WHERE m.age = :age",
        )
        .named_param("age", ValueType::Integer)
        .count_query("SELECT COUNT(*) FROM member m WHERE m.age = :age"),
        "count query",
    );
}

#[test]
fn paged_template_cannot_carry_its_own_limit() {
    let err = register(
        QueryDescriptor::template(
            &MEMBER_META,
            "findFirstPage",
            "SELECT m.* FROM member m LIMIT 10",
        )
        .returns(Cardinality::UncountedSlice),
    );
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
}

#[test]
fn duplicate_descriptor_ids_are_rejected() {
    let mut registry = registry();
    let err = registry
        .register(QueryDescriptor::derived(&MEMBER_META, "findTop3By"))
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidQuerySpec { .. }));
}

#[test]
fn registered_descriptors_compile_against_the_schema() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();

    let verified = registry.verify(&session).unwrap();
    assert_eq!(verified, registry.len());
    assert!(registry.contains("Member.findPageWithCustomQueryCountQueryByAge"));
    assert!(registry.contains("Team.findByNationality"));
}

#[test]
fn verify_reports_statements_the_store_refuses() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let mut registry = DescriptorRegistry::new();
    registry
        .register(
            QueryDescriptor::template(
                &MEMBER_META,
                "findNicknames",
                "SELECT m.nickname FROM member m",
            )
            .projection(&["nickname"]),
        )
        .unwrap();

    let err = registry.verify(&session).unwrap_err();
    match err {
        QueryError::InvalidQuerySpec { descriptor, .. } => {
            assert_eq!(descriptor, "Member.findNicknames")
        }
        other => panic!("expected InvalidQuerySpec, got {other:?}"),
    }
}
