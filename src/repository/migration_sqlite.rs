//! SQLite implementation of the migration traits.
//!
//! SQLite is normally only the source side, but the importer is implemented
//! too so migrations can be rehearsed (and tested) against a throwaway
//! SQLite destination.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::schema::{notification_settings, users};

use super::migration::{
    ActiveUser, ConflictPolicy, DatabaseExporter, DatabaseImporter, MigrationReport,
    PortableNotificationSetting, PortableUser,
};
use super::models::{
    NewNotificationSetting, NewUser, NotificationSettingRecord, UserRecord,
};
use super::pool::{DbError, SqliteConn, SqlitePool};

/// SQLite database migrator.
pub struct SqliteMigrator {
    pool: SqlitePool,
}

impl SqliteMigrator {
    /// Create a new SQLite migrator.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_users(
        conn: &mut SqliteConn,
        users_data: &[PortableUser],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError> {
        if users_data.is_empty() {
            return Ok(0);
        }
        let rows: Vec<NewUser> = users_data.iter().map(NewUser::from).collect();
        let written = match policy {
            ConflictPolicy::Skip => {
                diesel::insert_into(users::table)
                    .values(&rows)
                    .on_conflict(users::user_id)
                    .do_nothing()
                    .execute(conn)
                    .await?
            }
            ConflictPolicy::Overwrite => {
                diesel::insert_into(users::table)
                    .values(&rows)
                    .on_conflict(users::user_id)
                    .do_update()
                    .set((
                        users::username.eq(excluded(users::username)),
                        users::first_name.eq(excluded(users::first_name)),
                        users::last_name.eq(excluded(users::last_name)),
                        users::city.eq(excluded(users::city)),
                        users::timezone.eq(excluded(users::timezone)),
                        users::notification_time.eq(excluded(users::notification_time)),
                        users::is_active.eq(excluded(users::is_active)),
                        users::created_at.eq(excluded(users::created_at)),
                        users::updated_at.eq(excluded(users::updated_at)),
                    ))
                    .execute(conn)
                    .await?
            }
        };
        debug!(written, total = users_data.len(), "inserted users");
        Ok(written)
    }

    async fn insert_settings(
        conn: &mut SqliteConn,
        settings_data: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError> {
        if settings_data.is_empty() {
            return Ok(0);
        }
        let rows: Vec<NewNotificationSetting> = settings_data
            .iter()
            .map(NewNotificationSetting::from)
            .collect();
        let written = match policy {
            ConflictPolicy::Skip => {
                diesel::insert_into(notification_settings::table)
                    .values(&rows)
                    .on_conflict(notification_settings::user_id)
                    .do_nothing()
                    .execute(conn)
                    .await?
            }
            ConflictPolicy::Overwrite => {
                diesel::insert_into(notification_settings::table)
                    .values(&rows)
                    .on_conflict(notification_settings::user_id)
                    .do_update()
                    .set((
                        notification_settings::morning_time
                            .eq(excluded(notification_settings::morning_time)),
                        notification_settings::evening_time
                            .eq(excluded(notification_settings::evening_time)),
                        notification_settings::send_morning
                            .eq(excluded(notification_settings::send_morning)),
                        notification_settings::send_evening
                            .eq(excluded(notification_settings::send_evening)),
                        notification_settings::weather_type
                            .eq(excluded(notification_settings::weather_type)),
                    ))
                    .execute(conn)
                    .await?
            }
        };
        debug!(written, total = settings_data.len(), "inserted settings");
        Ok(written)
    }

    async fn import_all_on(
        conn: &mut SqliteConn,
        users_data: &[PortableUser],
        settings_data: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<MigrationReport, DbError> {
        // Users first so settings never reference a missing row.
        let users_written = Self::insert_users(conn, users_data, policy).await?;
        let settings_written = Self::insert_settings(conn, settings_data, policy).await?;
        Ok(MigrationReport {
            users: users_written,
            notification_settings: settings_written,
        })
    }
}

#[async_trait]
impl DatabaseExporter for SqliteMigrator {
    async fn export_users(&self) -> Result<Vec<PortableUser>, DbError> {
        let mut conn = self.pool.get().await?;
        let records: Vec<UserRecord> = users::table.load(&mut conn).await?;
        Ok(records.into_iter().map(PortableUser::from).collect())
    }

    async fn export_notification_settings(
        &self,
    ) -> Result<Vec<PortableNotificationSetting>, DbError> {
        let mut conn = self.pool.get().await?;
        let records: Vec<NotificationSettingRecord> =
            notification_settings::table.load(&mut conn).await?;
        Ok(records
            .into_iter()
            .map(PortableNotificationSetting::from)
            .collect())
    }

    async fn export_active_users(&self) -> Result<Vec<ActiveUser>, DbError> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(UserRecord, Option<NotificationSettingRecord>)> = users::table
            .left_join(notification_settings::table)
            .filter(users::is_active.eq(true))
            .filter(users::city.is_not_null())
            .select((
                UserRecord::as_select(),
                Option::<NotificationSettingRecord>::as_select(),
            ))
            .load(&mut conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user, settings)| ActiveUser {
                user: user.into(),
                settings: settings.map(Into::into),
            })
            .collect())
    }
}

#[async_trait]
impl DatabaseImporter for SqliteMigrator {
    async fn import_users(
        &self,
        users_data: &[PortableUser],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError> {
        let mut conn = self.pool.get().await?;
        Self::insert_users(&mut conn, users_data, policy).await
    }

    async fn import_notification_settings(
        &self,
        settings_data: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError> {
        let mut conn = self.pool.get().await?;
        Self::insert_settings(&mut conn, settings_data, policy).await
    }

    async fn import_all(
        &self,
        users_data: &[PortableUser],
        settings_data: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<MigrationReport, DbError> {
        let mut conn = self.pool.get().await?;
        diesel::sql_query("BEGIN").execute(&mut conn).await?;
        let result = Self::import_all_on(&mut conn, users_data, settings_data, policy).await;
        match result {
            Ok(report) => {
                diesel::sql_query("COMMIT").execute(&mut conn).await?;
                Ok(report)
            }
            Err(e) => {
                let _ = diesel::sql_query("ROLLBACK").execute(&mut conn).await;
                Err(e)
            }
        }
    }
}
