use std::collections::{BTreeMap, HashSet};

use openpath_lib::{location_ping::LocationPing, segment_crossing::SegmentCrossing, time_range::TimeRange, zone::Zone};
use serde::{Deserialize, Serialize};

use crate::{DataManager, DataManagerError};

/// Which ping represents a section when several fall inside a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrder {
    /// The ping closest to the zone's reference point. Ties keep storage order.
    #[default]
    Closest,
    /// The first ping in time.
    Earliest,
}

#[derive(Debug, Clone)]
pub struct SegmentQuery {
    pub start_zone: Zone,
    pub end_zone: Zone,
    pub range: TimeRange,
    pub excluded_user_ids: HashSet<String>,
    /// Privacy floor: fewer distinct users than this and nothing is reported.
    pub min_distinct_users: usize,
    pub match_order: MatchOrder,
}

impl DataManager {
    /// Sections that crossed the start zone and later the end zone.
    ///
    /// Empty when either zone saw no pings, and also when fewer than
    /// `min_distinct_users` users contributed. Callers cannot tell the two apart.
    pub async fn query_segments_crossing_endpoints(&self, query: &SegmentQuery) -> Result<Vec<SegmentCrossing>, DataManagerError> {
        let start_matches = self.zone_matches(&query.start_zone, query).await?;
        if start_matches.is_empty() {
            tracing::debug!("No pings in start zone");
            return Ok(Vec::new());
        }

        let end_matches = self.zone_matches(&query.end_zone, query).await?;
        if end_matches.is_empty() {
            tracing::debug!("No pings in end zone");
            return Ok(Vec::new());
        }

        tracing::debug!("{} sections matched the start zone, {} the end zone", start_matches.len(), end_matches.len());

        Ok(find_segment_crossings(&start_matches, &end_matches, query.min_distinct_users))
    }

    /// One ping per section inside `zone`, ranked by the query's match order.
    async fn zone_matches(&self, zone: &Zone, query: &SegmentQuery) -> Result<Vec<LocationPing>, DataManagerError> {
        let bounds = zone.bounds();
        let candidates = self.database
            .get_locations_in_box(&query.range, zone.longitude_ranges(), bounds.min().y, bounds.max().y)
            .await?;

        let ranked = rank_zone_matches(zone, candidates, &query.excluded_user_ids, query.match_order);
        Ok(first_per_section(ranked))
    }
}

/// Keeps the candidates inside `zone` from users not excluded, ordered by `order`.
pub fn rank_zone_matches(
    zone: &Zone,
    candidates: Vec<LocationPing>,
    excluded_user_ids: &HashSet<String>,
    order: MatchOrder,
) -> Vec<LocationPing> {
    let mut matches: Vec<(f64, LocationPing)> = candidates
        .into_iter()
        .filter(|ping| !excluded_user_ids.contains(&ping.user_id))
        .filter(|ping| zone.contains(&ping.point()))
        .map(|ping| (zone.distance_to_reference(&ping.point()), ping))
        .collect();

    // Both sorts are stable.
    match order {
        MatchOrder::Closest => matches.sort_by(|a, b| a.0.total_cmp(&b.0)),
        MatchOrder::Earliest => matches.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then(a.1.idx.cmp(&b.1.idx))),
    }

    matches.into_iter().map(|(_, ping)| ping).collect()
}

/// The first ping of every section, in the order given.
pub fn first_per_section(ranked: Vec<LocationPing>) -> Vec<LocationPing> {
    let mut seen = HashSet::new();
    ranked.into_iter()
        .filter(|ping| seen.insert(ping.section_id.clone()))
        .collect()
}

/// Joins start and end matches on section, keeping directional traversals.
/// Output is ordered by section id.
pub fn join_crossings(start_matches: &[LocationPing], end_matches: &[LocationPing]) -> Vec<SegmentCrossing> {
    let ends: BTreeMap<&str, &LocationPing> = end_matches.iter()
        .rev()
        .map(|ping| (ping.section_id.as_str(), ping))
        .collect();

    let mut starts: BTreeMap<&str, &LocationPing> = BTreeMap::new();
    for ping in start_matches {
        starts.entry(ping.section_id.as_str()).or_insert(ping);
    }

    starts.into_iter()
        .filter_map(|(section, start)| ends.get(section).and_then(|end| SegmentCrossing::from_matches(start, end)))
        .collect()
}

pub fn distinct_users(crossings: &[SegmentCrossing]) -> usize {
    crossings.iter().map(|crossing| crossing.user_id.as_str()).collect::<HashSet<_>>().len()
}

/// Join, then apply the privacy floor.
pub fn find_segment_crossings(
    start_matches: &[LocationPing],
    end_matches: &[LocationPing],
    min_distinct_users: usize,
) -> Vec<SegmentCrossing> {
    if start_matches.is_empty() || end_matches.is_empty() {
        return Vec::new();
    }

    let crossings = join_crossings(start_matches, end_matches);
    let users = distinct_users(&crossings);

    if users < min_distinct_users {
        tracing::debug!("Suppressing {} crossings below the distinct user floor", crossings.len());
        return Vec::new();
    }

    crossings
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use geo::Point;
    use openpath_lib::{motion_mode::MotionMode, time_range::TimezoneMode};

    use super::*;

    const START: (f64, f64) = (10.0, 55.0);
    const END: (f64, f64) = (10.2, 55.0);

    fn ping(section: &str, user: &str, idx: i64, (lon, lat): (f64, f64)) -> LocationPing {
        let timestamp = Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap() + Duration::seconds(30 * idx);
        LocationPing {
            section_id: section.into(),
            user_id: user.into(),
            timestamp,
            fmt_time: timestamp.to_rfc3339(),
            longitude: lon,
            latitude: lat,
            idx,
            mode: MotionMode::Car,
        }
    }

    fn zone((lon, lat): (f64, f64)) -> Zone {
        Zone::circle(Point::new(lon, lat), 300.).unwrap()
    }

    fn query(min_distinct_users: usize) -> SegmentQuery {
        SegmentQuery {
            start_zone: zone(START),
            end_zone: zone(END),
            range: TimeRange::unbounded(),
            excluded_user_ids: HashSet::new(),
            min_distinct_users,
            match_order: MatchOrder::Closest,
        }
    }

    /// Three sections driven by two users, each entering the start zone before the end zone.
    fn three_shared_sections() -> Vec<LocationPing> {
        vec![
            ping("s1", "alice", 1, START),
            ping("s1", "alice", 9, END),
            ping("s2", "alice", 2, START),
            ping("s2", "alice", 12, END),
            ping("s3", "bob", 0, START),
            ping("s3", "bob", 6, END),
        ]
    }

    #[test]
    fn crossings_require_start_before_end() {
        let start = vec![ping("s1", "alice", 5, START), ping("s2", "bob", 1, START)];
        let end = vec![ping("s1", "alice", 3, END), ping("s2", "bob", 4, END)];

        let crossings = find_segment_crossings(&start, &end, 0);

        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].section_id, "s2");
        assert!(crossings.iter().all(|crossing| crossing.start_idx < crossing.end_idx));
        assert_eq!(crossings[0].duration, 90.0);
        assert_eq!(crossings[0].mode, MotionMode::Car);
    }

    #[test]
    fn partial_crossings_are_dropped() {
        let start = vec![ping("s1", "alice", 1, START), ping("s2", "bob", 1, START)];
        let end = vec![ping("s2", "bob", 4, END), ping("s3", "carol", 4, END)];

        let crossings = find_segment_crossings(&start, &end, 0);

        assert_eq!(crossings.iter().map(|c| c.section_id.as_str()).collect::<Vec<_>>(), vec!["s2"]);
    }

    #[test]
    fn empty_side_gives_empty_result() {
        let start = vec![ping("s1", "alice", 1, START)];
        assert!(find_segment_crossings(&start, &[], 0).is_empty());
        assert!(find_segment_crossings(&[], &start, 0).is_empty());
    }

    #[test]
    fn distinct_user_floor_suppresses_everything() {
        let pings = three_shared_sections();
        let (start, end): (Vec<_>, Vec<_>) = pings.into_iter().partition(|ping| (ping.longitude, ping.latitude) == START);

        assert_eq!(find_segment_crossings(&start, &end, 2).len(), 3);
        assert!(find_segment_crossings(&start, &end, 3).is_empty());
        assert!(find_segment_crossings(&start, &end, 5).is_empty());
    }

    #[test]
    fn closest_ping_represents_the_section() {
        let far = ping("s1", "alice", 1, (START.0 + 0.002, START.1));
        let near = ping("s1", "alice", 2, (START.0 + 0.0005, START.1));
        let outside = ping("s1", "alice", 0, (START.0 + 0.05, START.1));

        let ranked = rank_zone_matches(&zone(START), vec![outside, far.clone(), near.clone()], &HashSet::new(), MatchOrder::Closest);
        assert_eq!(ranked, vec![near.clone(), far.clone()]);
        assert_eq!(first_per_section(ranked), vec![near]);

        let by_time = rank_zone_matches(&zone(START), vec![far.clone(), ping("s1", "alice", 2, START)], &HashSet::new(), MatchOrder::Earliest);
        assert_eq!(first_per_section(by_time), vec![far]);
    }

    #[test]
    fn excluded_users_are_ignored() {
        let excluded = HashSet::from(["bob".to_string()]);
        let ranked = rank_zone_matches(&zone(START), vec![ping("s1", "alice", 0, START), ping("s2", "bob", 0, START)], &excluded, MatchOrder::Closest);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, "alice");
    }

    #[tokio::test]
    async fn end_to_end_through_the_database() {
        let data_manager = DataManager::in_memory().await.unwrap();
        data_manager.insert_locations(&three_shared_sections()).await.unwrap();
        // Reversed traversal and a section that never reaches the end zone.
        data_manager.insert_locations(&[
            ping("s4", "carol", 5, START),
            ping("s4", "carol", 3, END),
            ping("s5", "dave", 1, START),
        ]).await.unwrap();

        let crossings = data_manager.query_segments_crossing_endpoints(&query(2)).await.unwrap();
        let sections: Vec<_> = crossings.iter().map(|crossing| crossing.section_id.as_str()).collect();
        assert_eq!(sections, vec!["s1", "s2", "s3"]);

        let again = data_manager.query_segments_crossing_endpoints(&query(2)).await.unwrap();
        assert_eq!(crossings, again);

        assert!(data_manager.query_segments_crossing_endpoints(&query(5)).await.unwrap().is_empty());

        let mut without_bob = query(2);
        without_bob.excluded_user_ids.insert("bob".into());
        assert!(data_manager.query_segments_crossing_endpoints(&without_bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn date_range_bounds_the_pings() {
        let data_manager = DataManager::in_memory().await.unwrap();

        let mut early = ping("s1", "alice", 0, START);
        early.timestamp = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        let mut late = ping("s1", "alice", 1, END);
        late.timestamp = Utc.with_ymd_and_hms(2023, 5, 1, 23, 59, 59).unwrap();
        let mut too_late = ping("s2", "alice", 1, END);
        too_late.timestamp = Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).unwrap();
        let s2_start = ping("s2", "alice", 0, START);

        data_manager.insert_locations(&[early, late, too_late, s2_start]).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2023, 5, 1);
        let mut query = query(1);
        query.range = TimeRange::from_dates(day, day, TimezoneMode::Utc).unwrap();

        let crossings = data_manager.query_segments_crossing_endpoints(&query).await.unwrap();
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].section_id, "s1");
        assert_eq!(crossings[0].duration, 86_399.0);
    }

    #[tokio::test]
    async fn zones_across_the_antimeridian_match_both_sides() {
        let data_manager = DataManager::in_memory().await.unwrap();
        data_manager.insert_locations(&[
            ping("s1", "alice", 0, (179.999, 0.)),
            ping("s2", "bob", 0, (-179.999, 0.)),
            ping("s3", "carol", 0, (179.5, 0.)),
        ]).await.unwrap();

        let zone = Zone::circle(Point::new(179.999, 0.), 1000.).unwrap();
        let matches = data_manager.zone_matches(&zone, &query(0)).await.unwrap();

        let sections: Vec<_> = matches.iter().map(|ping| ping.section_id.as_str()).collect();
        assert_eq!(sections, vec!["s1", "s2"]);
    }
}
