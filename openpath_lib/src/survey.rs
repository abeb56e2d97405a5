use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

/// A demographic survey answered by a participant. The response keeps the
/// shape the survey tool produced.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SurveyResponse {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub response: serde_json::Value,
}

impl SurveyResponse {
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "ts": self.timestamp.timestamp_millis() as f64 / 1000.0,
            "data": self.response,
        })
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for SurveyResponse {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let ts: i64 = row.try_get("ts")?;
        let response: String = row.try_get("response")?;

        Ok(Self {
            user_id: row.try_get("user_id")?,
            timestamp: crate::time_range::datetime_from_millis(ts)
                .ok_or_else(|| sqlx::Error::Decode(format!("ts {ts} out of range").into()))?,
            response: serde_json::from_str(&response).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
        })
    }
}
