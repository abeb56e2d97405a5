use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{location_ping::LocationPing, motion_mode::MotionMode};

/// A section that passed the start zone and later the end zone.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SegmentCrossing {
    pub section_id: String,
    pub user_id: String,
    pub mode: MotionMode,
    /// Seconds between the start and end match.
    pub duration: f64,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub start_fmt_time: String,
    pub end_fmt_time: String,
    pub start_idx: i64,
    pub end_idx: i64,
}

impl SegmentCrossing {
    /// Pairs two matches of one section. `None` unless the start comes before the end.
    pub fn from_matches(start: &LocationPing, end: &LocationPing) -> Option<Self> {
        if start.section_id != end.section_id || start.idx >= end.idx {
            return None;
        }

        let duration = (end.timestamp - start.timestamp).num_milliseconds() as f64 / 1000.0;

        Some(Self {
            section_id: start.section_id.clone(),
            user_id: start.user_id.clone(),
            mode: start.mode,
            duration,
            start_ts: start.timestamp,
            end_ts: end.timestamp,
            start_fmt_time: start.fmt_time.clone(),
            end_fmt_time: end.fmt_time.clone(),
            start_idx: start.idx,
            end_idx: end.idx,
        })
    }
}
