use assetledger_core::db::migrations::latest_version;
use assetledger_core::db::{ensure_schema_ready, open_db, open_db_in_memory, DbError};
use assetledger_core::{LifecycleError, LifecycleService, RepoError, SqliteAssetRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "assets");
    assert_table_exists(&conn, "employees");
    assert_table_exists(&conn, "assignment_intervals");
    assert!(ensure_schema_ready(&conn).is_ok());
}

#[test]
fn bootstrap_enables_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO assignment_intervals (id, asset_id, employee_id, assigned_at)
             VALUES ('i-1', 'missing-asset', NULL, 0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assetledger.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "assignment_intervals");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn opening_version_one_database_applies_remaining_steps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let index_exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type = 'index' AND name = 'idx_assignment_intervals_open_by_employee'
            );",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(index_exists, 1);
}

#[test]
fn raw_connections_are_rejected_by_repositories_and_service() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteAssetRepository::try_new(&conn),
        Err(RepoError::Db(DbError::UninitializedConnection {
            actual_version: 0,
            ..
        }))
    ));
    assert!(matches!(
        LifecycleService::try_new(&conn),
        Err(LifecycleError::Repo(RepoError::Db(
            DbError::UninitializedConnection { .. }
        )))
    ));
}

#[test]
fn schema_rejects_holder_on_unassigned_asset() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO employees (id, employee_code, first_name, last_name, email, employment_status, created_at)
         VALUES ('e-1', 'EMP1', 'Ada', 'Lovelace', 'ada@example.com', 'active', 0);",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO assets (id, asset_tag, asset_name, status, current_employee_id, created_at, last_updated_at)
         VALUES ('a-1', 'AST-1', 'Laptop', 'in_stock', 'e-1', 0, 0);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
