mod common;

use common::{registry, seed_members, seed_teams_and_members};
use repokit_core::db::open_db_in_memory;
use repokit_core::query::{EntityCacheContext, QueryEngine};
use repokit_core::{Member, MemberRepository, RepoError, SqliteSession, TeamRepository};
use std::sync::Arc;

#[test]
fn saved_member_is_the_instance_found_by_id() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut cache = EntityCacheContext::new();

    let saved = members.save(&mut cache, Member::new("memberA", 10)).unwrap();
    let id = saved.id.unwrap();
    let found = members.find_by_id(&mut cache, id).unwrap().unwrap();

    assert!(Arc::ptr_eq(&saved, &found));
    assert_eq!(members.count().unwrap(), 1);
}

#[test]
fn queries_resolve_to_cached_instances() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut cache = EntityCacheContext::new();
    let saved = seed_members(&members, &mut cache, &[("memberA", 10), ("memberB", 20)]);

    let by_name = members.find_by_username(&mut cache, "memberB").unwrap();
    let all = members.find_all(&mut cache).unwrap();

    assert!(Arc::ptr_eq(&saved[1], &by_name[0]));
    assert!(Arc::ptr_eq(&saved[0], &all[0]));
    assert!(Arc::ptr_eq(&saved[1], &all[1]));
}

#[test]
fn fresh_unit_of_work_loads_new_instances_once() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut writer = EntityCacheContext::new();
    let saved = seed_members(&members, &mut writer, &[("memberA", 10)]);

    let mut reader = EntityCacheContext::new();
    assert_ne!(reader.unit_id(), writer.unit_id());
    let first = members.find_list_by_username(&mut reader, "memberA").unwrap();
    let second = members
        .find_optional_by_username(&mut reader, "memberA")
        .unwrap()
        .unwrap();

    assert!(!Arc::ptr_eq(&saved[0], &first[0]));
    assert!(Arc::ptr_eq(&first[0], &second));
    assert_eq!(*first[0], *saved[0]);
}

#[test]
fn save_updates_an_existing_member() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let teams = TeamRepository::new(&engine);
    let mut cache = EntityCacheContext::new();
    let (team_a, team_b) = seed_teams_and_members(&teams, &members, &mut cache);

    let member = members.find_by_username(&mut cache, "member1").unwrap();
    assert_eq!(member[0].team_id, team_a.id);
    let mut moved = (*member[0]).clone();
    moved.change_team(&team_b);
    moved.age = 11;
    let updated = members.save(&mut cache, moved).unwrap();

    let mut reader = EntityCacheContext::new();
    let reread = members.find_by_id(&mut reader, updated.id.unwrap()).unwrap().unwrap();
    assert_eq!(reread.team_id, team_b.id);
    assert_eq!(reread.age, 11);
    assert_eq!(members.count().unwrap(), 4);
}

#[test]
fn delete_evicts_and_missing_ids_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut cache = EntityCacheContext::new();
    let saved = seed_members(&members, &mut cache, &[("memberA", 10)]);
    let id = saved[0].id.unwrap();

    members.delete(&mut cache, id).unwrap();
    assert!(cache.is_empty());
    assert!(members.find_by_id(&mut cache, id).unwrap().is_none());
    assert!(matches!(
        members.delete(&mut cache, id),
        Err(RepoError::NotFound { kind: "Member", .. })
    ));
    assert!(matches!(
        members.crud().get(&mut cache, id),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn updating_an_unknown_id_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut cache = EntityCacheContext::new();

    let mut ghost = Member::new("ghost", 1);
    ghost.id = Some(99);
    assert!(matches!(
        members.save(&mut cache, ghost),
        Err(RepoError::NotFound { id: 99, .. })
    ));
    assert!(cache.is_empty());
}

#[test]
fn invalid_members_are_never_written() {
    let conn = open_db_in_memory().unwrap();
    let session = SqliteSession::new(&conn);
    let registry = registry();
    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let mut cache = EntityCacheContext::new();

    for invalid in [Member::new("  ", 10), Member::new("memberA", -1)] {
        assert!(matches!(
            members.save(&mut cache, invalid),
            Err(RepoError::Validation { kind: "Member", .. })
        ));
    }
    assert_eq!(members.count().unwrap(), 0);
}
