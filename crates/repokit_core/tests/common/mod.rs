#![allow(dead_code)]

use repokit_core::query::{DescriptorRegistry, EntityCacheContext, PersistenceSession};
use repokit_core::{register_all, Member, MemberRepository, Team, TeamRepository};
use std::sync::Arc;

/// Registry with every repository descriptor registered.
pub fn registry() -> DescriptorRegistry {
    let mut registry = DescriptorRegistry::new();
    register_all(&mut registry).unwrap();
    registry
}

/// Saves `(username, age)` members without a team, in order.
pub fn seed_members<S: PersistenceSession>(
    repo: &MemberRepository<'_, S>,
    cache: &mut EntityCacheContext,
    members: &[(&str, i64)],
) -> Vec<Arc<Member>> {
    members
        .iter()
        .map(|(name, age)| repo.save(cache, Member::new(*name, *age)).unwrap())
        .collect()
}

/// `teamA` (KR) with member1/member2, `teamB` (US) with member3/member4.
pub fn seed_teams_and_members<S: PersistenceSession>(
    teams: &TeamRepository<'_, S>,
    members: &MemberRepository<'_, S>,
    cache: &mut EntityCacheContext,
) -> (Arc<Team>, Arc<Team>) {
    let team_a = teams
        .save(cache, Team::with_nationality("teamA", "KR"))
        .unwrap();
    let team_b = teams
        .save(cache, Team::with_nationality("teamB", "US"))
        .unwrap();
    for (name, age, team) in [
        ("member1", 10, &team_a),
        ("member2", 20, &team_a),
        ("member3", 30, &team_b),
        ("member4", 40, &team_b),
    ] {
        members
            .save(cache, Member::with_team(name, age, team))
            .unwrap();
    }
    (team_a, team_b)
}

pub fn usernames(members: &[Arc<Member>]) -> Vec<String> {
    members.iter().map(|member| member.username.clone()).collect()
}
