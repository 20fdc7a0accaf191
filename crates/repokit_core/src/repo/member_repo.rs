//! Member repository: the tutorial's declared query methods.
//!
//! Every method maps onto one descriptor registered by [`register`]; the
//! descriptor id is `Member.<methodName>`.

use super::crud::CrudRepository;
use super::RepoResult;
use crate::model::member::{Member, MemberDto, MEMBER_META};
use crate::query::{
    Arg, Args, BulkOutcome, Cardinality, DescriptorRegistry, EntityCacheContext, Invalidation,
    PageRequest, PageResult, PersistenceSession, Projectable, QueryDescriptor, QueryEngine,
    QueryResult, SliceResult, ValueType,
};
use std::sync::Arc;

const FIND_BY_USERNAME_AND_AGE_GREATER_THAN: &str = "Member.findByUsernameAndAgeGreaterThan";
const FIND_TOP3: &str = "Member.findTop3By";
const FIND_BY_USERNAME: &str = "Member.findByUsername";
const FIND_USER: &str = "Member.findUser";
const FIND_USERNAME_LIST: &str = "Member.findUsernameList";
const FIND_MEMBER_DTO: &str = "Member.findMemberDto";
const FIND_BY_NAMES: &str = "Member.findByNames";
const FIND_LIST_BY_USERNAME: &str = "Member.findListByUsername";
const FIND_MEMBER_BY_USERNAME: &str = "Member.findMemberByUsername";
const FIND_OPTIONAL_BY_USERNAME: &str = "Member.findOptionalByUsername";
const FIND_PAGE_BY_AGE: &str = "Member.findPageByAge";
const FIND_PAGE_WITH_CUSTOM_QUERY_BY_AGE: &str = "Member.findPageWithCustomQueryByAge";
const FIND_PAGE_WITH_CUSTOM_QUERY_COUNT_QUERY_BY_AGE: &str =
    "Member.findPageWithCustomQueryCountQueryByAge";
const FIND_SLICE_BY_AGE: &str = "Member.findSliceByAge";
const FIND_LIST_BY_AGE: &str = "Member.findListByAge";
const COUNT_BY_AGE: &str = "Member.countByAge";
const BULK_AGE_PLUS: &str = "Member.bulkAgePlus";
const BULK_AGE_PLUS_AND_CLEAR: &str = "Member.bulkAgePlusAndClear";

/// Join used by the custom page queries; the team is only joined, never
/// filtered on.
const MEMBER_WITH_TEAM_BY_AGE: &str = "SELECT m.* FROM member m \
     LEFT JOIN team t ON m.team_id = t.team_id \
     WHERE m.age = :age";
const BULK_AGE_PLUS_SQL: &str = "UPDATE member SET age = age + 1 WHERE age >= :age";

/// Declares every member query.
pub fn register(registry: &mut DescriptorRegistry) -> QueryResult<()> {
    let m = &MEMBER_META;
    registry.register(
        QueryDescriptor::derived(m, "findByUsernameAndAgeGreaterThan")
            .param(ValueType::Text)
            .param(ValueType::Integer),
    )?;
    registry.register(QueryDescriptor::derived(m, "findTop3By"))?;
    registry.register(
        QueryDescriptor::named(m, "findByUsername", FIND_BY_USERNAME)
            .named_param("username", ValueType::Text),
    )?;
    registry.register(
        QueryDescriptor::template(
            m,
            "findUser",
            "SELECT m.* FROM member m WHERE m.username = :username AND m.age = :age",
        )
        .named_param("username", ValueType::Text)
        .named_param("age", ValueType::Integer),
    )?;
    registry.register(
        QueryDescriptor::template(
            m,
            "findUsernameList",
            "SELECT m.username FROM member m ORDER BY m.member_id",
        )
        .projection(&["username"]),
    )?;
    registry.register(
        QueryDescriptor::template(
            m,
            "findMemberDto",
            "SELECT m.member_id, m.username, t.name AS team_name \
             FROM member m JOIN team t ON m.team_id = t.team_id \
             ORDER BY m.member_id",
        )
        .projection(&["member_id", "username", "team_name"]),
    )?;
    registry.register(
        QueryDescriptor::template(
            m,
            "findByNames",
            "SELECT m.* FROM member m WHERE m.username IN :names ORDER BY m.member_id",
        )
        .named_collection_param("names", ValueType::Text),
    )?;
    registry.register(QueryDescriptor::derived(m, "findListByUsername").param(ValueType::Text))?;
    registry.register(
        QueryDescriptor::derived(m, "findMemberByUsername")
            .param(ValueType::Text)
            .returns(Cardinality::One),
    )?;
    registry.register(
        QueryDescriptor::derived(m, "findOptionalByUsername")
            .param(ValueType::Text)
            .returns(Cardinality::OneOrNone),
    )?;
    registry.register(
        QueryDescriptor::derived(m, "findPageByAge")
            .param(ValueType::Integer)
            .returns(Cardinality::CountedPage),
    )?;
    registry.register(
        QueryDescriptor::template(m, "findPageWithCustomQueryByAge", MEMBER_WITH_TEAM_BY_AGE)
            .named_param("age", ValueType::Integer)
            .returns(Cardinality::CountedPage),
    )?;
    registry.register(
        QueryDescriptor::template(
            m,
            "findPageWithCustomQueryCountQueryByAge",
            MEMBER_WITH_TEAM_BY_AGE,
        )
        .named_param("age", ValueType::Integer)
        .returns(Cardinality::CountedPage)
        .count_query("SELECT COUNT(m.member_id) FROM member m WHERE m.age = :age"),
    )?;
    registry.register(
        QueryDescriptor::derived(m, "findSliceByAge")
            .param(ValueType::Integer)
            .returns(Cardinality::UncountedSlice),
    )?;
    registry.register(QueryDescriptor::derived(m, "findListByAge").param(ValueType::Integer))?;
    registry.register(
        QueryDescriptor::derived(m, "countByAge")
            .param(ValueType::Integer)
            .returns(Cardinality::One),
    )?;
    registry.register(
        QueryDescriptor::template(m, "bulkAgePlus", BULK_AGE_PLUS_SQL)
            .named_param("age", ValueType::Integer)
            .modifying(Invalidation::Manual),
    )?;
    registry.register(
        QueryDescriptor::template(m, "bulkAgePlusAndClear", BULK_AGE_PLUS_SQL)
            .named_param("age", ValueType::Integer)
            .modifying(Invalidation::Automatic),
    )?;
    Ok(())
}

pub struct MemberRepository<'a, S: PersistenceSession> {
    engine: &'a QueryEngine<'a, S>,
    crud: CrudRepository<'a, Member, S>,
}

impl<'a, S: PersistenceSession> MemberRepository<'a, S> {
    pub fn new(engine: &'a QueryEngine<'a, S>) -> Self {
        Self {
            engine,
            crud: CrudRepository::new(engine.session()),
        }
    }

    pub fn crud(&self) -> &CrudRepository<'a, Member, S> {
        &self.crud
    }

    pub fn save(&self, cache: &mut EntityCacheContext, member: Member) -> RepoResult<Arc<Member>> {
        self.crud.save(cache, member)
    }

    pub fn find_by_id(
        &self,
        cache: &mut EntityCacheContext,
        id: i64,
    ) -> RepoResult<Option<Arc<Member>>> {
        self.crud.find_by_id(cache, id)
    }

    pub fn find_all(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<Arc<Member>>> {
        self.crud.find_all(cache)
    }

    pub fn count(&self) -> RepoResult<i64> {
        self.crud.count()
    }

    pub fn delete(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<()> {
        self.crud.delete(cache, id)
    }

    pub fn find_by_username_and_age_greater_than(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Arc<Member>>> {
        let args = Args::positional([Arg::from(username), Arg::from(age)]);
        self.list(cache, FIND_BY_USERNAME_AND_AGE_GREATER_THAN, &args)
    }

    /// First three members in store order.
    pub fn find_top3(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<Arc<Member>>> {
        self.list(cache, FIND_TOP3, &Args::None)
    }

    pub fn find_by_username(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
    ) -> RepoResult<Vec<Arc<Member>>> {
        self.list(cache, FIND_BY_USERNAME, &Args::named().with("username", username))
    }

    pub fn find_user(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
        age: i64,
    ) -> RepoResult<Vec<Arc<Member>>> {
        let args = Args::named().with("username", username).with("age", age);
        self.list(cache, FIND_USER, &args)
    }

    pub fn find_username_list(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<String>> {
        self.list(cache, FIND_USERNAME_LIST, &Args::None)
    }

    /// Members that belong to a team, with the team name.
    pub fn find_member_dto(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<MemberDto>> {
        self.list(cache, FIND_MEMBER_DTO, &Args::None)
    }

    pub fn find_by_names(
        &self,
        cache: &mut EntityCacheContext,
        names: &[&str],
    ) -> RepoResult<Vec<Arc<Member>>> {
        let args = Args::named().with("names", names.to_vec());
        self.list(cache, FIND_BY_NAMES, &args)
    }

    pub fn find_list_by_username(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
    ) -> RepoResult<Vec<Arc<Member>>> {
        self.list(cache, FIND_LIST_BY_USERNAME, &Args::positional([username]))
    }

    /// Single member or `None`; two matches are `NonUniqueResult`.
    pub fn find_member_by_username(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
    ) -> RepoResult<Option<Arc<Member>>> {
        Ok(self
            .engine
            .execute(cache, FIND_MEMBER_BY_USERNAME, &Args::positional([username]), None)?
            .into_one()?)
    }

    pub fn find_optional_by_username(
        &self,
        cache: &mut EntityCacheContext,
        username: &str,
    ) -> RepoResult<Option<Arc<Member>>> {
        Ok(self
            .engine
            .execute(cache, FIND_OPTIONAL_BY_USERNAME, &Args::positional([username]), None)?
            .into_optional()?)
    }

    pub fn find_page_by_age(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
        page: &PageRequest,
    ) -> RepoResult<PageResult<Arc<Member>>> {
        self.page(cache, FIND_PAGE_BY_AGE, &Args::positional([age]), page)
    }

    /// Page over a team join whose count query is derived from the template.
    pub fn find_page_with_custom_query_by_age(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
        page: &PageRequest,
    ) -> RepoResult<PageResult<Arc<Member>>> {
        let args = Args::named().with("age", age);
        self.page(cache, FIND_PAGE_WITH_CUSTOM_QUERY_BY_AGE, &args, page)
    }

    /// Same page, counted by an explicit join-free count query.
    pub fn find_page_with_custom_query_count_query_by_age(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
        page: &PageRequest,
    ) -> RepoResult<PageResult<Arc<Member>>> {
        let args = Args::named().with("age", age);
        self.page(cache, FIND_PAGE_WITH_CUSTOM_QUERY_COUNT_QUERY_BY_AGE, &args, page)
    }

    pub fn find_slice_by_age(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
        page: &PageRequest,
    ) -> RepoResult<SliceResult<Arc<Member>>> {
        Ok(self
            .engine
            .execute(cache, FIND_SLICE_BY_AGE, &Args::positional([age]), Some(page))?
            .into_slice()?)
    }

    /// Window of members without any page metadata.
    pub fn find_list_by_age(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
        page: &PageRequest,
    ) -> RepoResult<Vec<Arc<Member>>> {
        Ok(self
            .engine
            .execute(cache, FIND_LIST_BY_AGE, &Args::positional([age]), Some(page))?
            .into_list()?)
    }

    pub fn count_by_age(&self, cache: &mut EntityCacheContext, age: i64) -> RepoResult<i64> {
        let total: Option<i64> = self
            .engine
            .execute(cache, COUNT_BY_AGE, &Args::positional([age]), None)?
            .into_one()?;
        Ok(total.unwrap_or(0))
    }

    /// Adds one year to every member aged `age` or older.
    ///
    /// Cached members keep their old age until the caller invalidates.
    pub fn bulk_age_plus(&self, cache: &mut EntityCacheContext, age: i64) -> RepoResult<BulkOutcome> {
        let args = Args::named().with("age", age);
        Ok(self.engine.execute_bulk(cache, BULK_AGE_PLUS, &args)?)
    }

    /// Same update; the member cache is cleared right after it.
    pub fn bulk_age_plus_and_clear(
        &self,
        cache: &mut EntityCacheContext,
        age: i64,
    ) -> RepoResult<BulkOutcome> {
        let args = Args::named().with("age", age);
        Ok(self.engine.execute_bulk(cache, BULK_AGE_PLUS_AND_CLEAR, &args)?)
    }

    fn list<T: Projectable>(
        &self,
        cache: &mut EntityCacheContext,
        id: &str,
        args: &Args,
    ) -> RepoResult<Vec<T>> {
        Ok(self.engine.execute(cache, id, args, None)?.into_list()?)
    }

    fn page(
        &self,
        cache: &mut EntityCacheContext,
        id: &str,
        args: &Args,
        page: &PageRequest,
    ) -> RepoResult<PageResult<Arc<Member>>> {
        Ok(self.engine.execute(cache, id, args, Some(page))?.into_page()?)
    }
}
