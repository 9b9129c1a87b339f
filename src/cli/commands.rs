//! CLI commands implementation.

use std::path::Path;

use console::style;

use crate::repository::util::redact_url_password;
use crate::repository::{
    ConflictPolicy, DatabaseExporter, DatabaseImporter, PostgresMigrator, SqliteMigrator,
    SqlitePool,
};
use crate::snapshot::Snapshot;

fn sqlite_migrator(source: &Path) -> SqliteMigrator {
    SqliteMigrator::new(SqlitePool::new(&source.display().to_string()))
}

/// Per-table count line, written next to the source total so skipped
/// rows are visible.
fn count_line(table: &str, written: usize, total: usize) -> String {
    format!("  {table}: {written} of {total}")
}

/// Export the SQLite tables to a JSON snapshot file.
pub async fn cmd_export(source: &Path, out: &Path) -> anyhow::Result<()> {
    println!("{} Exporting {}", style("→").cyan(), source.display());

    let migrator = sqlite_migrator(source);
    let users = migrator.export_users().await?;
    let settings = migrator.export_notification_settings().await?;

    // The snapshot is only written once both tables have been read and
    // serialized; a failed export leaves no artifact behind.
    let snapshot = Snapshot::capture(&users, &settings)?;
    snapshot.save(out)?;

    println!("  users: {}", users.len());
    println!("  notification_settings: {}", settings.len());
    println!("{} Snapshot written to {}", style("✓").green(), out.display());
    Ok(())
}

/// Import a snapshot file into PostgreSQL.
pub async fn cmd_import(snapshot_path: &Path, database_url: &str) -> anyhow::Result<()> {
    println!(
        "{} Importing {} into {}",
        style("→").cyan(),
        snapshot_path.display(),
        redact_url_password(database_url)
    );

    let snapshot = Snapshot::load(snapshot_path)?;
    let users = snapshot.users()?;
    let settings = snapshot.notification_settings()?;

    let target = PostgresMigrator::new(database_url)?;
    target.init_schema().await?;

    // Users go first so the settings foreign keys resolve. Rows already
    // present in the destination are left untouched.
    let users_written = target.import_users(&users, ConflictPolicy::Skip).await?;
    println!("{}", count_line("users", users_written, users.len()));

    let settings_written = target
        .import_notification_settings(&settings, ConflictPolicy::Skip)
        .await?;
    println!(
        "{}",
        count_line("notification_settings", settings_written, settings.len())
    );

    println!("{} Import complete", style("✓").green());
    Ok(())
}

/// Migrate directly from SQLite to PostgreSQL in one transaction.
///
/// Any failure is reported on stdout and rolls the destination back; the
/// process still exits 0 so wrapper scripts can inspect the output instead
/// of the exit code.
pub async fn cmd_migrate(
    source: &Path,
    database_url: &str,
    policy: ConflictPolicy,
) -> anyhow::Result<()> {
    println!(
        "{} Migrating {} to {}",
        style("→").cyan(),
        source.display(),
        redact_url_password(database_url)
    );

    match run_migration(source, database_url, policy).await {
        Ok(outcome) => {
            println!(
                "{}",
                count_line("users", outcome.report.users, outcome.users_total)
            );
            println!(
                "{}",
                count_line(
                    "notification_settings",
                    outcome.report.notification_settings,
                    outcome.settings_total,
                )
            );
            println!("{} Migration complete", style("✓").green());
        }
        Err(e) => {
            tracing::error!("migration failed: {e}");
            println!("{} Migration failed: {e}", style("✗").red());
            println!("  No changes were committed to the destination.");
        }
    }
    Ok(())
}

struct MigrationOutcome {
    report: crate::repository::MigrationReport,
    users_total: usize,
    settings_total: usize,
}

async fn run_migration(
    source: &Path,
    database_url: &str,
    policy: ConflictPolicy,
) -> anyhow::Result<MigrationOutcome> {
    let exporter = sqlite_migrator(source);
    let users = exporter.export_users().await?;
    let settings = exporter.export_notification_settings().await?;

    let target = PostgresMigrator::new(database_url)?;
    target.init_schema().await?;
    let report = target.import_all(&users, &settings, policy).await?;
    Ok(MigrationOutcome {
        report,
        users_total: users.len(),
        settings_total: settings.len(),
    })
}

/// Print a summary of active users in the destination database.
pub async fn cmd_verify(database_url: &str) -> anyhow::Result<()> {
    println!(
        "{} Active users in {}",
        style("→").cyan(),
        redact_url_password(database_url)
    );

    let target = PostgresMigrator::new(database_url)?;
    let active = target.export_active_users().await?;

    for entry in &active {
        let user = &entry.user;
        let city = user.city.as_deref().unwrap_or("-");
        match &entry.settings {
            Some(s) => println!(
                "  {} {} ({}) at {} [morning {} evening {}]",
                user.user_id, user.first_name, city, user.notification_time,
                s.send_morning, s.send_evening
            ),
            None => println!(
                "  {} {} ({}) at {} [no notification settings]",
                user.user_id, user.first_name, city, user.notification_time
            ),
        }
    }

    println!("{} {} active users", style("✓").green(), active.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_line_shows_written_against_total() {
        assert_eq!(count_line("users", 1, 2), "  users: 1 of 2");
        assert_eq!(
            count_line("notification_settings", 0, 3),
            "  notification_settings: 0 of 3"
        );
    }
}
