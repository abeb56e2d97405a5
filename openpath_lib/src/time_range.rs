use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// How calendar dates from a request are turned into absolute timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimezoneMode {
    #[default]
    Utc,
    /// The timezone of the machine running the server.
    Local,
}

/// Inclusive timestamp range. A missing start is unbounded, a missing end is
/// the maximum representable timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl TimeRange {
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Start of `start_date` to the last millisecond of `end_date`.
    pub fn from_dates(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>, mode: TimezoneMode) -> Result<Self, ModelError> {
        match mode {
            TimezoneMode::Utc => Self::from_dates_in(start_date, end_date, &Utc),
            TimezoneMode::Local => Self::from_dates_in(start_date, end_date, &Local),
        }
    }

    /// Like [`TimeRange::from_dates`] with the dates read in `tz`.
    pub fn from_dates_in<Tz: TimeZone>(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>, tz: &Tz) -> Result<Self, ModelError> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(ModelError::InvalidDateRange(format!("start date {start} is after end date {end}")));
            }
        }

        let start = match start_date {
            Some(date) => Some(resolve(date.and_time(NaiveTime::MIN), tz)?),
            None => None,
        };

        let end = match end_date {
            Some(date) => {
                let last_milli = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                    .ok_or_else(|| ModelError::InvalidDateRange("end of day".into()))?;
                resolve(date.and_time(last_milli), tz)?
            }
            None => DateTime::<Utc>::MAX_UTC,
        };

        Ok(Self { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| timestamp >= start) && timestamp <= self.end
    }

    /// Bounds as epoch milliseconds, the unit timestamps are stored in.
    pub fn millis(&self) -> (i64, i64) {
        (
            self.start.map(|start| start.timestamp_millis()).unwrap_or(i64::MIN),
            self.end.timestamp_millis(),
        )
    }
}

/// Earliest instant `naive` names in `tz`. Wall-clock times skipped by a DST
/// change have none.
fn resolve<Tz: TimeZone>(naive: NaiveDateTime, tz: &Tz) -> Result<DateTime<Utc>, ModelError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ModelError::InvalidDateRange(format!("{naive} does not exist in the selected timezone")))
}

pub fn datetime_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
