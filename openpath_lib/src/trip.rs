use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

/// A trip confirmed by the participant, as produced by the analysis pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfirmedTrip {
    pub user_id: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub start_fmt_time: String,
    pub end_fmt_time: String,
    pub timezone: String,
    /// `[lon, lat]`
    pub start_coordinates: [f64; 2],
    pub end_coordinates: [f64; 2],
    /// Metres
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    #[serde(default)]
    pub mode_confirm: Option<String>,
    #[serde(default)]
    pub purpose_confirm: Option<String>,
    #[serde(default)]
    pub replaced_mode: Option<String>,
}

impl ConfirmedTrip {
    /// The trip in the nested shape of the upstream collection. Column paths
    /// such as `data.start_fmt_time` address into this document.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "data": {
                "start_ts": self.start_ts.timestamp_millis() as f64 / 1000.0,
                "end_ts": self.end_ts.timestamp_millis() as f64 / 1000.0,
                "start_fmt_time": self.start_fmt_time,
                "end_fmt_time": self.end_fmt_time,
                "start_local_dt": { "timezone": self.timezone },
                "start_loc": { "type": "Point", "coordinates": self.start_coordinates },
                "end_loc": { "type": "Point", "coordinates": self.end_coordinates },
                "distance": self.distance,
                "duration": self.duration,
                "user_input": {
                    "mode_confirm": self.mode_confirm,
                    "purpose_confirm": self.purpose_confirm,
                    "replaced_mode": self.replaced_mode,
                }
            }
        })
    }
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for ConfirmedTrip {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let millis = |column: &str| -> sqlx::Result<DateTime<Utc>> {
            let ts: i64 = row.try_get(column)?;
            crate::time_range::datetime_from_millis(ts)
                .ok_or_else(|| sqlx::Error::Decode(format!("{column} {ts} out of range").into()))
        };

        Ok(Self {
            user_id: row.try_get("user_id")?,
            start_ts: millis("start_ts")?,
            end_ts: millis("end_ts")?,
            start_fmt_time: row.try_get("start_fmt_time")?,
            end_fmt_time: row.try_get("end_fmt_time")?,
            timezone: row.try_get("timezone")?,
            start_coordinates: [row.try_get("start_lon")?, row.try_get("start_lat")?],
            end_coordinates: [row.try_get("end_lon")?, row.try_get("end_lat")?],
            distance: row.try_get("distance")?,
            duration: row.try_get("duration")?,
            mode_confirm: row.try_get("mode_confirm")?,
            purpose_confirm: row.try_get("purpose_confirm")?,
            replaced_mode: row.try_get("replaced_mode")?,
        })
    }
}
