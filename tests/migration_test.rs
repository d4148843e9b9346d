mod helpers;

use lorekeep::db;
use lorekeep::db::migrations::{
    get_embedding_dimension, get_embedding_model, get_schema_version, run_migrations,
    CURRENT_SCHEMA_VERSION,
};
use rusqlite::Connection;
use tempfile::TempDir;

#[test]
fn fresh_db_migrates_to_current_version() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("m.db")).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("m.db")).unwrap();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn v1_db_upgrades_and_backfills_updated_at() {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);

    conn.execute(
        "INSERT INTO topics (id, name, definition, created_at) \
         VALUES ('t1', 'greetings', 'Basic greeting responses', '2024-01-01T00:00:00.000Z')",
        [],
    )
    .unwrap();

    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

    let updated_at: String = conn
        .query_row("SELECT updated_at FROM topics WHERE id = 't1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(updated_at, "2024-01-01T00:00:00.000Z");
}

#[test]
fn engine_records_embedding_model_on_first_vector() {
    let tmp = TempDir::new().unwrap();
    let engine = helpers::test_engine(&tmp);

    let conn = db::open_database(helpers::db_path(&tmp)).unwrap();
    assert!(get_embedding_model(&conn).unwrap().is_none());

    engine.add_topic(helpers::topic("greetings", "Basic greeting responses")).unwrap();

    let expected_model = format!("hash-fnv1a-{}", helpers::TEST_DIM);
    assert_eq!(get_embedding_model(&conn).unwrap(), Some(expected_model));
    assert_eq!(get_embedding_dimension(&conn).unwrap(), Some(helpers::TEST_DIM));
}
