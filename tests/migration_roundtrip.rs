//! Migration round-trip tests.
//!
//! Exercises the export and import paths against throwaway SQLite files.
//! The SQLite migrator implements both sides of the pipeline, so conflict
//! policies, transactional rollback, and snapshot round-trips can all be
//! verified without a PostgreSQL server. Fixtures are written with rusqlite
//! the way the bot wrote them: integer 0/1 flags and text timestamps.

use rusqlite::{params, Connection};
use tempfile::TempDir;

use weatherbot_migrate::repository::{
    ConflictPolicy, DatabaseExporter, DatabaseImporter, SqliteMigrator, SqlitePool,
};
use weatherbot_migrate::snapshot::Snapshot;

fn create_schema(conn: &Connection) {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            user_id INTEGER PRIMARY KEY,
            username TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT,
            city TEXT,
            timezone TEXT NOT NULL DEFAULT 'Europe/Moscow',
            notification_time TEXT NOT NULL DEFAULT '08:00',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE notification_settings (
            user_id INTEGER PRIMARY KEY REFERENCES users (user_id) ON DELETE CASCADE,
            morning_time TEXT NOT NULL DEFAULT '08:00',
            evening_time TEXT NOT NULL DEFAULT '20:00',
            send_morning INTEGER NOT NULL DEFAULT 1,
            send_evening INTEGER NOT NULL DEFAULT 1,
            weather_type TEXT NOT NULL DEFAULT 'brief'
        );
        "#,
    )
    .expect("schema creation failed");
}

fn insert_user(
    conn: &Connection,
    user_id: i64,
    username: Option<&str>,
    first_name: &str,
    city: Option<&str>,
    is_active: i64,
) {
    conn.execute(
        "INSERT INTO users (user_id, username, first_name, city, timezone, \
         notification_time, is_active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 'Europe/Riga', '08:00', ?5, \
         '2024-01-01 08:00:00', '2024-01-02 09:30:00')",
        params![user_id, username, first_name, city, is_active],
    )
    .expect("user insert failed");
}

fn insert_settings(conn: &Connection, user_id: i64, send_morning: i64) {
    conn.execute(
        "INSERT INTO notification_settings (user_id, morning_time, evening_time, \
         send_morning, send_evening, weather_type) \
         VALUES (?1, '07:30', '21:00', ?2, 0, 'detailed')",
        params![user_id, send_morning],
    )
    .expect("settings insert failed");
}

/// A populated source database and an empty destination, as file paths.
fn source_and_target(dir: &TempDir) -> (String, String) {
    let source_path = dir.path().join("source.db");
    let target_path = dir.path().join("target.db");

    let source = Connection::open(&source_path).unwrap();
    create_schema(&source);
    insert_user(&source, 1001, Some("anna"), "Anna", Some("Riga"), 1);
    insert_user(&source, 1002, None, "Boris", Some("Tartu"), 1);
    insert_settings(&source, 1001, 1);
    drop(source);

    let target = Connection::open(&target_path).unwrap();
    create_schema(&target);
    drop(target);

    (
        source_path.display().to_string(),
        target_path.display().to_string(),
    )
}

fn migrator(path: &str) -> SqliteMigrator {
    SqliteMigrator::new(SqlitePool::new(path))
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[tokio::test]
async fn migrate_copies_all_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    let users = migrator(&source_path).export_users().await.unwrap();
    let settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();
    let report = migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(report.users, 2);
    assert_eq!(report.notification_settings, 1);

    let target = Connection::open(&target_path).unwrap();
    assert_eq!(count(&target, "users"), 2);
    assert_eq!(count(&target, "notification_settings"), 1);

    let (city, weather_type): (String, String) = target
        .query_row(
            "SELECT u.city, s.weather_type FROM users u \
             JOIN notification_settings s ON s.user_id = u.user_id \
             WHERE u.user_id = 1001",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(city, "Riga");
    assert_eq!(weather_type, "detailed");
}

#[tokio::test]
async fn skip_policy_keeps_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    // The destination already knows user 1001, with a different city.
    let target = Connection::open(&target_path).unwrap();
    insert_user(&target, 1001, Some("anna"), "Anna", Some("Oslo"), 1);
    drop(target);

    let users = migrator(&source_path).export_users().await.unwrap();
    let written = migrator(&target_path)
        .import_users(&users, ConflictPolicy::Skip)
        .await
        .unwrap();
    // Only Boris is new; Anna's existing row wins.
    assert_eq!(written, 1);

    let target = Connection::open(&target_path).unwrap();
    assert_eq!(count(&target, "users"), 2);
    let city: String = target
        .query_row("SELECT city FROM users WHERE user_id = 1001", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(city, "Oslo");
}

#[tokio::test]
async fn overwrite_policy_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    let target = Connection::open(&target_path).unwrap();
    insert_user(&target, 1001, Some("anna"), "Anna", Some("Oslo"), 0);
    drop(target);

    let users = migrator(&source_path).export_users().await.unwrap();
    migrator(&target_path)
        .import_users(&users, ConflictPolicy::Overwrite)
        .await
        .unwrap();

    let target = Connection::open(&target_path).unwrap();
    // Updated in place, not duplicated.
    assert_eq!(count(&target, "users"), 2);
    let (city, is_active): (String, i64) = target
        .query_row(
            "SELECT city, is_active FROM users WHERE user_id = 1001",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(city, "Riga");
    assert_eq!(is_active, 1);
}

#[tokio::test]
async fn rerunning_skip_migration_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    let users = migrator(&source_path).export_users().await.unwrap();
    let settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();

    let first = migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Skip)
        .await
        .unwrap();
    assert_eq!(first.users, 2);

    let second = migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Skip)
        .await
        .unwrap();
    assert_eq!(second.users, 0);
    assert_eq!(second.notification_settings, 0);

    let target = Connection::open(&target_path).unwrap();
    assert_eq!(count(&target, "users"), 2);
}

#[tokio::test]
async fn rerunning_overwrite_migration_leaves_values_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    let users = migrator(&source_path).export_users().await.unwrap();
    let settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();

    migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Overwrite)
        .await
        .unwrap();
    let after_first = migrator(&target_path).export_users().await.unwrap();
    let settings_after_first = migrator(&target_path)
        .export_notification_settings()
        .await
        .unwrap();

    // With unchanged source data the second run rewrites every row in
    // place and converges on the same values.
    let second = migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(second.users, 2);

    let after_second = migrator(&target_path).export_users().await.unwrap();
    assert_eq!(after_second, after_first);
    assert_eq!(
        migrator(&target_path)
            .export_notification_settings()
            .await
            .unwrap(),
        settings_after_first
    );

    let target = Connection::open(&target_path).unwrap();
    assert_eq!(count(&target, "users"), 2);
    assert_eq!(count(&target, "notification_settings"), 1);
}

#[tokio::test]
async fn failed_import_rolls_back_both_tables() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);

    let users = migrator(&source_path).export_users().await.unwrap();
    let mut settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();
    // Point one settings row at a user that does not exist, so the second
    // insert of the transaction violates the foreign key.
    settings[0].user_id = 9999;

    let result = migrator(&target_path)
        .import_all(&users, &settings, ConflictPolicy::Overwrite)
        .await;
    assert!(result.is_err());

    // The users insert succeeded inside the transaction but must not have
    // been committed.
    let target = Connection::open(&target_path).unwrap();
    assert_eq!(count(&target, "users"), 0);
    assert_eq!(count(&target, "notification_settings"), 0);
}

#[tokio::test]
async fn integer_flags_become_booleans() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("flags.db").display().to_string();

    let conn = Connection::open(&source_path).unwrap();
    create_schema(&conn);
    insert_user(&conn, 1, None, "Active", Some("Riga"), 1);
    insert_user(&conn, 2, None, "Dormant", Some("Riga"), 0);
    insert_settings(&conn, 2, 0);
    drop(conn);

    let users = migrator(&source_path).export_users().await.unwrap();
    assert!(users.iter().find(|u| u.user_id == 1).unwrap().is_active);
    assert!(!users.iter().find(|u| u.user_id == 2).unwrap().is_active);

    let settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();
    assert!(!settings[0].send_morning);
    assert!(!settings[0].send_evening);
}

#[tokio::test]
async fn snapshot_roundtrips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let (source_path, target_path) = source_and_target(&dir);
    let snapshot_path = dir.path().join("snapshot.json");

    let users = migrator(&source_path).export_users().await.unwrap();
    let settings = migrator(&source_path)
        .export_notification_settings()
        .await
        .unwrap();
    Snapshot::capture(&users, &settings)
        .unwrap()
        .save(&snapshot_path)
        .unwrap();

    // The artifact is a map from table name to {columns, data}.
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot_path).unwrap()).unwrap();
    assert!(raw["users"]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "is_active"));
    assert_eq!(raw["notification_settings"]["data"].as_array().unwrap().len(), 1);

    let loaded = Snapshot::load(&snapshot_path).unwrap();
    let report = migrator(&target_path)
        .import_all(
            &loaded.users().unwrap(),
            &loaded.notification_settings().unwrap(),
            ConflictPolicy::Skip,
        )
        .await
        .unwrap();
    assert_eq!(report.users, 2);

    // Data survives the snapshot unchanged.
    assert_eq!(migrator(&target_path).export_users().await.unwrap(), users);
}

#[tokio::test]
async fn active_user_summary_filters_and_joins() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("verify.db").display().to_string();

    let conn = Connection::open(&db_path).unwrap();
    create_schema(&conn);
    insert_user(&conn, 1, Some("anna"), "Anna", Some("Riga"), 1);
    insert_user(&conn, 2, None, "NoCity", None, 1);
    insert_user(&conn, 3, None, "Inactive", Some("Tartu"), 0);
    insert_user(&conn, 4, None, "Quiet", Some("Oslo"), 1);
    insert_settings(&conn, 1, 1);
    drop(conn);

    let mut active = migrator(&db_path).export_active_users().await.unwrap();
    active.sort_by_key(|a| a.user.user_id);

    // Only active users with a known city appear.
    let ids: Vec<i64> = active.iter().map(|a| a.user.user_id).collect();
    assert_eq!(ids, vec![1, 4]);

    // Settings come along when present, and their absence is not an error.
    assert_eq!(
        active[0].settings.as_ref().unwrap().morning_time,
        "07:30"
    );
    assert!(active[1].settings.is_none());
}
