//! Database migration traits and portable record types.
//!
//! Provides a trait-based abstraction for exporting and importing the
//! weather bot's tables so either backend can sit on either side of a
//! migration. The portable record types use owned values and serialize
//! to JSON, which is also what the snapshot artifact stores.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::pool::DbError;

/// How primary-key collisions in the destination are resolved.
///
/// The original migration shipped as two near-identical scripts, one per
/// policy; here it is a single parameter to one migration path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Keep the existing destination row (first write wins).
    Skip,
    /// Overwrite every non-key column with the incoming value.
    #[default]
    Overwrite,
}

/// Rows written per table by a migration run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationReport {
    pub users: usize,
    pub notification_settings: usize,
}

/// Portable user record for migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub timezone: String,
    pub notification_time: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Portable notification settings record for migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableNotificationSetting {
    pub user_id: i64,
    pub morning_time: String,
    pub evening_time: String,
    pub send_morning: bool,
    pub send_evening: bool,
    pub weather_type: String,
}

/// An active user together with their notification settings, as shown by
/// the verification step.
#[derive(Debug, Clone)]
pub struct ActiveUser {
    pub user: PortableUser,
    pub settings: Option<PortableNotificationSetting>,
}

/// Trait for reading database contents into portable form.
///
/// Implementations read whole tables at once; the bot's user base is far
/// below the point where paging would matter.
#[async_trait]
pub trait DatabaseExporter: Send + Sync {
    /// Export all users.
    async fn export_users(&self) -> Result<Vec<PortableUser>, DbError>;

    /// Export all notification settings.
    async fn export_notification_settings(
        &self,
    ) -> Result<Vec<PortableNotificationSetting>, DbError>;

    /// Fetch active users with a known city, joined with their settings.
    /// Read-only; used by verification, not by the write path.
    async fn export_active_users(&self) -> Result<Vec<ActiveUser>, DbError>;
}

/// Trait for writing portable records into a destination database.
///
/// Each table is written by a single multi-row insert; `import_all` wraps
/// both tables in one transaction.
#[async_trait]
pub trait DatabaseImporter: Send + Sync {
    /// Import users. Returns the number of rows actually written.
    async fn import_users(
        &self,
        users: &[PortableUser],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError>;

    /// Import notification settings. Returns the number of rows written.
    async fn import_notification_settings(
        &self,
        settings: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<usize, DbError>;

    /// Import both tables in one transaction, users first.
    ///
    /// On any error the whole transaction rolls back; no partial state
    /// is committed.
    async fn import_all(
        &self,
        users: &[PortableUser],
        settings: &[PortableNotificationSetting],
        policy: ConflictPolicy,
    ) -> Result<MigrationReport, DbError>;
}

impl From<super::models::UserRecord> for PortableUser {
    fn from(r: super::models::UserRecord) -> Self {
        PortableUser {
            user_id: r.user_id,
            username: r.username,
            first_name: r.first_name,
            last_name: r.last_name,
            city: r.city,
            timezone: r.timezone,
            notification_time: r.notification_time,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl From<super::models::NotificationSettingRecord> for PortableNotificationSetting {
    fn from(r: super::models::NotificationSettingRecord) -> Self {
        PortableNotificationSetting {
            user_id: r.user_id,
            morning_time: r.morning_time,
            evening_time: r.evening_time,
            send_morning: r.send_morning,
            send_evening: r.send_evening,
            weather_type: r.weather_type,
        }
    }
}
