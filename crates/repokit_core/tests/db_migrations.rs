use repokit_core::config::DatabaseConfig;
use repokit_core::db::migrations::{apply_migrations, latest_version};
use repokit_core::db::{open_configured, open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn in_memory_store_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "member");
    assert_table_exists(&conn, "team");
}

#[test]
fn reopening_a_file_store_keeps_the_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repokit.db");

    let first = open_db(&path).unwrap();
    first
        .execute("INSERT INTO team (name) VALUES ('teamA')", [])
        .unwrap();
    drop(first);

    let mut second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let teams: i64 = second
        .query_row("SELECT COUNT(*) FROM team", [], |row| row.get(0))
        .unwrap();
    assert_eq!(teams, 1);

    let report = apply_migrations(&mut second).unwrap();
    assert_eq!(report.applied, 0);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn configured_open_uses_the_path_and_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: Some(dir.path().join("configured.db")),
        busy_timeout_ms: 250,
    };
    let conn = open_configured(&config).unwrap();
    assert!(dir.path().join("configured.db").exists());

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn deleting_a_team_detaches_its_members() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO team (name) VALUES ('teamA')", [])
        .unwrap();
    let team_id = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO member (username, age, team_id) VALUES ('member1', 10, ?1)",
        [team_id],
    )
    .unwrap();

    conn.execute("DELETE FROM team WHERE team_id = ?1", [team_id])
        .unwrap();
    let team: Option<i64> = conn
        .query_row("SELECT team_id FROM member", [], |row| row.get(0))
        .unwrap();
    assert_eq!(team, None);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
