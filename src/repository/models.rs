//! Diesel ORM models for the two migrated tables.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema;

use super::migration::{PortableNotificationSetting, PortableUser};

/// User row as read from either backend.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::users)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite, diesel::pg::Pg))]
pub struct UserRecord {
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

/// User row for insertion, borrowing from a portable record.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: Option<&'a str>,
    pub city: Option<&'a str>,
    pub timezone: &'a str,
    pub notification_time: &'a str,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> From<&'a PortableUser> for NewUser<'a> {
    fn from(u: &'a PortableUser) -> Self {
        NewUser {
            user_id: u.user_id,
            username: u.username.as_deref(),
            first_name: &u.first_name,
            last_name: u.last_name.as_deref(),
            city: u.city.as_deref(),
            timezone: &u.timezone,
            notification_time: &u.notification_time,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Notification settings row as read from either backend.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::notification_settings)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite, diesel::pg::Pg))]
pub struct NotificationSettingRecord {
    pub user_id: i64,
    pub morning_time: String,
    pub evening_time: String,
    pub send_morning: bool,
    pub send_evening: bool,
    pub weather_type: String,
}

/// Notification settings row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::notification_settings)]
pub struct NewNotificationSetting<'a> {
    pub user_id: i64,
    pub morning_time: &'a str,
    pub evening_time: &'a str,
    pub send_morning: bool,
    pub send_evening: bool,
    pub weather_type: &'a str,
}

impl<'a> From<&'a PortableNotificationSetting> for NewNotificationSetting<'a> {
    fn from(s: &'a PortableNotificationSetting) -> Self {
        NewNotificationSetting {
            user_id: s.user_id,
            morning_time: &s.morning_time,
            evening_time: &s.evening_time,
            send_morning: s.send_morning,
            send_evening: s.send_evening,
            weather_type: &s.weather_type,
        }
    }
}
