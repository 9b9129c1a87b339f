//! The intermediate snapshot artifact for the two-step export/import path.
//!
//! A snapshot is a JSON mapping from table name to `{columns, data}`:
//! `columns` is the ordered column-name list and `data` holds row tuples in
//! that order. Carrying the column list in the artifact keeps old snapshots
//! readable if a column is ever added.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::repository::migration::{PortableNotificationSetting, PortableUser};

pub const USERS_TABLE: &str = "users";
pub const NOTIFICATION_SETTINGS_TABLE: &str = "notification_settings";

/// Column order used when writing snapshots. Matches the destination schema.
pub const USER_COLUMNS: &[&str] = &[
    "user_id",
    "username",
    "first_name",
    "last_name",
    "city",
    "timezone",
    "notification_time",
    "is_active",
    "created_at",
    "updated_at",
];

pub const NOTIFICATION_SETTING_COLUMNS: &[&str] = &[
    "user_id",
    "morning_time",
    "evening_time",
    "send_morning",
    "send_evening",
    "weather_type",
];

/// Errors reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table `{0}` missing from snapshot")]
    MissingTable(String),
    #[error("table `{table}` row {row} has {got} values for {expected} columns")]
    RowShape {
        table: String,
        row: usize,
        got: usize,
        expected: usize,
    },
    #[error("table `{table}` row {row} missing column `{column}`")]
    MissingColumn {
        table: String,
        row: usize,
        column: String,
    },
}

/// One table's worth of data: column names plus row tuples in that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDump {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

/// A full snapshot of the migrated tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub tables: BTreeMap<String, TableDump>,
}

fn encode_rows<T: Serialize>(
    table: &str,
    columns: &[&str],
    rows: &[T],
) -> Result<TableDump, SnapshotError> {
    let mut data = Vec::with_capacity(rows.len());
    for (row_idx, record) in rows.iter().enumerate() {
        let mut obj = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let mut tuple = Vec::with_capacity(columns.len());
        for column in columns {
            let value = obj
                .remove(*column)
                .ok_or_else(|| SnapshotError::MissingColumn {
                    table: table.to_string(),
                    row: row_idx,
                    column: column.to_string(),
                })?;
            tuple.push(value);
        }
        data.push(tuple);
    }
    Ok(TableDump {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        data,
    })
}

fn decode_rows<T: DeserializeOwned>(table: &str, dump: &TableDump) -> Result<Vec<T>, SnapshotError> {
    let mut records = Vec::with_capacity(dump.data.len());
    for (row_idx, tuple) in dump.data.iter().enumerate() {
        if tuple.len() != dump.columns.len() {
            return Err(SnapshotError::RowShape {
                table: table.to_string(),
                row: row_idx,
                got: tuple.len(),
                expected: dump.columns.len(),
            });
        }
        let obj: serde_json::Map<String, Value> = dump
            .columns
            .iter()
            .cloned()
            .zip(tuple.iter().cloned())
            .collect();
        records.push(serde_json::from_value(Value::Object(obj))?);
    }
    Ok(records)
}

impl Snapshot {
    /// Build a snapshot from already-exported rows.
    pub fn capture(
        users: &[PortableUser],
        settings: &[PortableNotificationSetting],
    ) -> Result<Self, SnapshotError> {
        let mut tables = BTreeMap::new();
        tables.insert(
            USERS_TABLE.to_string(),
            encode_rows(USERS_TABLE, USER_COLUMNS, users)?,
        );
        tables.insert(
            NOTIFICATION_SETTINGS_TABLE.to_string(),
            encode_rows(
                NOTIFICATION_SETTINGS_TABLE,
                NOTIFICATION_SETTING_COLUMNS,
                settings,
            )?,
        );
        Ok(Snapshot { tables })
    }

    fn table(&self, name: &str) -> Result<&TableDump, SnapshotError> {
        self.tables
            .get(name)
            .ok_or_else(|| SnapshotError::MissingTable(name.to_string()))
    }

    /// Decode the users table.
    pub fn users(&self) -> Result<Vec<PortableUser>, SnapshotError> {
        decode_rows(USERS_TABLE, self.table(USERS_TABLE)?)
    }

    /// Decode the notification settings table.
    pub fn notification_settings(
        &self,
    ) -> Result<Vec<PortableNotificationSetting>, SnapshotError> {
        decode_rows(
            NOTIFICATION_SETTINGS_TABLE,
            self.table(NOTIFICATION_SETTINGS_TABLE)?,
        )
    }

    /// Write the snapshot to disk.
    ///
    /// Serializes fully in memory first; a failure part-way through never
    /// leaves a truncated artifact behind.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Read a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_user() -> PortableUser {
        PortableUser {
            user_id: 123456789012,
            username: Some("anna".into()),
            first_name: "Anna".into(),
            last_name: None,
            city: Some("Riga".into()),
            timezone: "Europe/Riga".into(),
            notification_time: "08:00".into(),
            is_active: true,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            updated_at: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    fn sample_setting() -> PortableNotificationSetting {
        PortableNotificationSetting {
            user_id: 123456789012,
            morning_time: "08:00".into(),
            evening_time: "20:00".into(),
            send_morning: true,
            send_evening: false,
            weather_type: "brief".into(),
        }
    }

    #[test]
    fn capture_records_column_order() {
        let snapshot = Snapshot::capture(&[sample_user()], &[sample_setting()]).unwrap();
        let users = snapshot.tables.get(USERS_TABLE).unwrap();
        assert_eq!(users.columns, USER_COLUMNS);
        assert_eq!(users.data.len(), 1);
        // user_id leads the tuple and must stay an exact integer
        assert_eq!(users.data[0][0], serde_json::json!(123456789012i64));
        // is_active is a real boolean in the artifact, not 0/1
        assert_eq!(users.data[0][7], serde_json::json!(true));
    }

    #[test]
    fn decode_reverses_capture() {
        let users = vec![sample_user()];
        let settings = vec![sample_setting()];
        let snapshot = Snapshot::capture(&users, &settings).unwrap();
        assert_eq!(snapshot.users().unwrap(), users);
        assert_eq!(snapshot.notification_settings().unwrap(), settings);
    }

    #[test]
    fn decode_survives_reordered_columns() {
        // A snapshot written with a different column order still decodes,
        // because rows are matched to columns by name.
        let mut snapshot = Snapshot::capture(&[], &[sample_setting()]).unwrap();
        let dump = snapshot
            .tables
            .get_mut(NOTIFICATION_SETTINGS_TABLE)
            .unwrap();
        dump.columns.rotate_left(1);
        for row in &mut dump.data {
            row.rotate_left(1);
        }
        assert_eq!(snapshot.notification_settings().unwrap(), vec![sample_setting()]);
    }

    #[test]
    fn short_row_is_rejected() {
        let mut snapshot = Snapshot::capture(&[sample_user()], &[]).unwrap();
        snapshot
            .tables
            .get_mut(USERS_TABLE)
            .unwrap()
            .data[0]
            .pop();
        match snapshot.users() {
            Err(SnapshotError::RowShape { row, got, expected, .. }) => {
                assert_eq!(row, 0);
                assert_eq!(got, expected - 1);
            }
            other => panic!("expected RowShape error, got {other:?}"),
        }
    }

    #[test]
    fn missing_table_is_reported() {
        let snapshot = Snapshot {
            tables: BTreeMap::new(),
        };
        assert!(matches!(
            snapshot.users(),
            Err(SnapshotError::MissingTable(_))
        ));
    }
}
