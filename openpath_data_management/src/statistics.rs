use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use openpath_lib::time_range::TimeRange;
use serde::Serialize;

use crate::{DataManager, DataManagerError};

/// Numbers behind the overview cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_users: usize,
    pub new_users_today: usize,
    /// Users with at least one trip in the range.
    pub active_users: usize,
    pub trips: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

impl DataManager {
    pub async fn summary_stats(&self, range: &TimeRange, today: NaiveDate) -> Result<SummaryStats, DataManagerError> {
        let users = self.database.get_users().await?;
        let trips = self.database.get_trips_in(range).await?;

        let active_users = trips.iter().map(|trip| trip.user_id.as_str()).collect::<HashSet<_>>().len();

        Ok(SummaryStats {
            total_users: users.len(),
            new_users_today: users.iter().filter(|user| user.update_ts.date_naive() == today).count(),
            active_users,
            trips: trips.len(),
        })
    }

    /// Registrations per UTC day.
    pub async fn signup_trend(&self, range: &TimeRange) -> Result<Vec<DailyCount>, DataManagerError> {
        let users = self.database.get_users_updated_in(range).await?;
        Ok(daily_counts(users.iter().map(|user| user.update_ts.date_naive())))
    }

    /// Confirmed trips per UTC day of their start.
    pub async fn trip_trend(&self, range: &TimeRange) -> Result<Vec<DailyCount>, DataManagerError> {
        let trips = self.database.get_trips_in(range).await?;
        Ok(daily_counts(trips.iter().map(|trip| trip.start_ts.date_naive())))
    }
}

fn daily_counts(dates: impl Iterator<Item = NaiveDate>) -> Vec<DailyCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in dates {
        *counts.entry(date).or_default() += 1;
    }

    counts.into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}
