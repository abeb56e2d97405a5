use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::motion_mode::MotionMode;

/// A recreated location: one denoised point on a user's path.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationPing {
    pub section_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub fmt_time: String,
    pub longitude: f64,
    pub latitude: f64,
    /// Ordinal position within the section.
    pub idx: i64,
    pub mode: MotionMode,
}

impl LocationPing {
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }

    /// The ping in the nested shape of the upstream collection, used for table output.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "data": {
                "section": self.section_id,
                "ts": self.timestamp.timestamp_millis() as f64 / 1000.0,
                "fmt_time": self.fmt_time,
                "idx": self.idx,
                "mode": self.mode,
                "latitude": self.latitude,
                "longitude": self.longitude,
            }
        })
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for LocationPing {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let ts: i64 = row.try_get("ts")?;
        let timestamp = crate::time_range::datetime_from_millis(ts)
            .ok_or_else(|| sqlx::Error::Decode(format!("timestamp {ts} out of range").into()))?;

        Ok(Self {
            section_id: row.try_get("section_id")?,
            user_id: row.try_get("user_id")?,
            timestamp,
            fmt_time: row.try_get("fmt_time")?,
            longitude: row.try_get("longitude")?,
            latitude: row.try_get("latitude")?,
            idx: row.try_get("idx")?,
            mode: MotionMode::from_code(row.try_get("mode")?),
        })
    }
}
