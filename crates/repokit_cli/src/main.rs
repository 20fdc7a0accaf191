//! Tutorial runner for `repokit_core`.
//!
//! Usage: `repokit_cli [config.json]`. Without a config the store is
//! in-memory and the output is deterministic.

use repokit_core::{
    init_from_config, open_configured, register_all, CoreConfig, DescriptorRegistry,
    EntityCacheContext, Member, MemberRepository, PageRequest, QueryEngine, SortSpec,
    SqliteSession, Team, TeamRepository,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("repokit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    init_from_config(&config.logging)?;

    let conn = open_configured(&config.database)?;
    let session =
        SqliteSession::new(&conn).with_slow_query_threshold(config.query.slow_query_threshold());

    let mut registry = DescriptorRegistry::new();
    register_all(&mut registry)?;
    let verified = registry.verify(&session)?;
    println!("repokit_core version={}", repokit_core::core_version());
    println!("descriptors verified={verified}");

    let engine = QueryEngine::new(&registry, &session);
    let members = MemberRepository::new(&engine);
    let teams = TeamRepository::new(&engine);
    let mut cache = EntityCacheContext::new();

    let team_a = teams.save(&mut cache, Team::with_nationality("teamA", "KR"))?;
    let team_b = teams.save(&mut cache, Team::with_nationality("teamB", "US"))?;
    for (name, age, team) in [
        ("member1", 10, &team_a),
        ("member2", 19, &team_a),
        ("member3", 20, &team_b),
        ("member4", 21, &team_b),
        ("member5", 40, &team_b),
    ] {
        members.save(&mut cache, Member::with_team(name, age, team))?;
    }

    let found = members.find_by_username_and_age_greater_than(&mut cache, "member3", 15)?;
    println!("findByUsernameAndAgeGreaterThan rows={}", found.len());
    println!("findTop3 rows={}", members.find_top3(&mut cache)?.len());
    println!("usernames={}", members.find_username_list(&mut cache)?.join(","));
    for dto in members.find_member_dto(&mut cache)? {
        println!(
            "dto id={} username={} team={}",
            dto.id,
            dto.username,
            dto.team_name.as_deref().unwrap_or("-")
        );
    }

    let request = PageRequest::of_sorted(0, 2, SortSpec::desc("username"))?;
    let page = members.find_page_with_custom_query_by_age(&mut cache, 20, &request)?;
    println!(
        "page total={} pages={} has_next={}",
        page.total_elements(),
        page.total_pages(),
        page.has_next()
    );
    let slice = members.find_slice_by_age(&mut cache, 10, &PageRequest::of(0, 3)?)?;
    println!("slice rows={} has_next={}", slice.content().len(), slice.has_next());

    let mut outcome = members.bulk_age_plus(&mut cache, 20)?;
    println!("bulkAgePlus affected={}", outcome.affected_rows());
    let stale = members.find_member_by_username(&mut cache, "member5")?;
    println!("member5 age before invalidate={}", stale.map_or(-1, |m| m.age));
    outcome.invalidate(&mut cache);
    let fresh = members.find_member_by_username(&mut cache, "member5")?;
    println!("member5 age after invalidate={}", fresh.map_or(-1, |m| m.age));

    let korean = teams.find_by_nationality(&mut cache, "KR", &PageRequest::of(0, 10)?)?;
    println!("{}", serde_json::to_string(&korean.map(|team| team.name.clone()))?);
    Ok(())
}
