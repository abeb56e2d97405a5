use std::collections::BTreeMap;

use chrono::{Datelike, Timelike};
use openpath_lib::{motion_mode::MotionMode, segment_crossing::SegmentCrossing};
use serde::Serialize;

/// Median segment duration of one group of crossings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<MotionMode>,
    /// Hour of day in UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    pub median_seconds: f64,
    pub median_minutes: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationReport {
    pub median_seconds: f64,
    pub trip_count: usize,
    pub per_hour: Vec<DurationRow>,
    pub per_mode: Vec<DurationRow>,
    pub per_mode_per_hour: Vec<DurationRow>,
    pub per_mode_per_month: Vec<DurationRow>,
}

type GroupKey = (Option<MotionMode>, Option<u32>, Option<u32>);

/// Grouped medians over a crossing set. `None` for an empty set.
pub fn aggregate_durations(crossings: &[SegmentCrossing]) -> Option<DurationReport> {
    let all: Vec<f64> = crossings.iter().map(|crossing| crossing.duration).collect();
    let median_seconds = median(&all)?;

    Some(DurationReport {
        median_seconds,
        trip_count: crossings.len(),
        per_hour: grouped(crossings, |c| (None, Some(c.start_ts.hour()), None)),
        per_mode: grouped(crossings, |c| (Some(c.mode), None, None)),
        per_mode_per_hour: grouped(crossings, |c| (Some(c.mode), Some(c.start_ts.hour()), None)),
        per_mode_per_month: grouped(crossings, |c| (Some(c.mode), None, Some(c.start_ts.month()))),
    })
}

fn grouped(crossings: &[SegmentCrossing], key: impl Fn(&SegmentCrossing) -> GroupKey) -> Vec<DurationRow> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for crossing in crossings {
        groups.entry(key(crossing)).or_default().push(crossing.duration);
    }

    groups.into_iter()
        .filter_map(|((mode, hour, month), durations)| {
            let median_seconds = median(&durations)?;
            Some(DurationRow {
                mode,
                hour,
                month,
                median_seconds,
                median_minutes: median_seconds / 60.0,
                count: durations.len(),
            })
        })
        .collect()
}

/// Middle value, or the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
