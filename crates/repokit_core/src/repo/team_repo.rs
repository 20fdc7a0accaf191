//! Team repository.

use super::crud::CrudRepository;
use super::RepoResult;
use crate::model::team::{Team, TEAM_META};
use crate::query::{
    Args, Cardinality, DescriptorRegistry, EntityCacheContext, PageRequest, PageResult,
    PersistenceSession, QueryDescriptor, QueryEngine, QueryResult, ValueType,
};
use std::sync::Arc;

const FIND_BY_NATIONALITY: &str = "Team.findByNationality";

pub fn register(registry: &mut DescriptorRegistry) -> QueryResult<()> {
    registry.register(
        QueryDescriptor::derived(&TEAM_META, "findByNationality")
            .param(ValueType::Text)
            .returns(Cardinality::CountedPage),
    )?;
    Ok(())
}

pub struct TeamRepository<'a, S: PersistenceSession> {
    engine: &'a QueryEngine<'a, S>,
    crud: CrudRepository<'a, Team, S>,
}

impl<'a, S: PersistenceSession> TeamRepository<'a, S> {
    pub fn new(engine: &'a QueryEngine<'a, S>) -> Self {
        Self {
            engine,
            crud: CrudRepository::new(engine.session()),
        }
    }

    pub fn crud(&self) -> &CrudRepository<'a, Team, S> {
        &self.crud
    }

    pub fn save(&self, cache: &mut EntityCacheContext, team: Team) -> RepoResult<Arc<Team>> {
        self.crud.save(cache, team)
    }

    pub fn find_by_id(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<Option<Arc<Team>>> {
        self.crud.find_by_id(cache, id)
    }

    pub fn find_all(&self, cache: &mut EntityCacheContext) -> RepoResult<Vec<Arc<Team>>> {
        self.crud.find_all(cache)
    }

    pub fn count(&self) -> RepoResult<i64> {
        self.crud.count()
    }

    pub fn delete(&self, cache: &mut EntityCacheContext, id: i64) -> RepoResult<()> {
        self.crud.delete(cache, id)
    }

    pub fn find_by_nationality(
        &self,
        cache: &mut EntityCacheContext,
        nationality: &str,
        page: &PageRequest,
    ) -> RepoResult<PageResult<Arc<Team>>> {
        Ok(self
            .engine
            .execute(cache, FIND_BY_NATIONALITY, &Args::positional([nationality]), Some(page))?
            .into_page()?)
    }
}
