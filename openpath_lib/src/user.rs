use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

/// A registered participant with the profile fields the phone reports.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserEntry {
    pub user_id: String,
    /// The login token, an e-mail address on older deployments.
    pub user_token: String,
    /// Set when the participant registers.
    pub update_ts: DateTime<Utc>,
    #[serde(default)]
    pub total_trips: i64,
    #[serde(default)]
    pub labeled_trips: i64,
    #[serde(default)]
    pub first_trip: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_trip: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_call: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub phone_lang: Option<String>,
}

impl UserEntry {
    pub fn new(user_id: String, user_token: String, update_ts: DateTime<Utc>) -> Self {
        Self {
            user_id,
            user_token,
            update_ts,
            total_trips: 0,
            labeled_trips: 0,
            first_trip: None,
            last_trip: None,
            last_call: None,
            platform: None,
            manufacturer: None,
            app_version: None,
            os_version: None,
            phone_lang: None,
        }
    }

    pub fn to_document(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for UserEntry {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let optional_millis = |column: &str| -> sqlx::Result<Option<DateTime<Utc>>> {
            let ts: Option<i64> = row.try_get(column)?;
            Ok(ts.and_then(crate::time_range::datetime_from_millis))
        };
        let update_ts = optional_millis("update_ts")?
            .ok_or_else(|| sqlx::Error::Decode("update_ts out of range".into()))?;

        Ok(Self {
            user_id: row.try_get("user_id")?,
            user_token: row.try_get("user_token")?,
            update_ts,
            total_trips: row.try_get("total_trips")?,
            labeled_trips: row.try_get("labeled_trips")?,
            first_trip: optional_millis("first_trip")?,
            last_trip: optional_millis("last_trip")?,
            last_call: optional_millis("last_call")?,
            platform: row.try_get("platform")?,
            manufacturer: row.try_get("manufacturer")?,
            app_version: row.try_get("app_version")?,
            os_version: row.try_get("os_version")?,
            phone_lang: row.try_get("phone_lang")?,
        })
    }
}
