use std::collections::BTreeMap;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use openpath_lib::{time_range::TimeRange, trip::ConfirmedTrip};
use serde::{Deserialize, Serialize};

use crate::{DataManager, DataManagerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    /// One start to end line per trip, coloured by user.
    #[default]
    Lines,
    /// Every trip start and end as a point.
    Heatmap,
    /// Trip ends merged by location, weighted by count.
    Bubble,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserColor {
    pub user_id: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapData {
    pub users: Vec<UserColor>,
    pub features: FeatureCollection,
}

impl DataManager {
    pub async fn map_data(&self, range: &TimeRange, mode: MapMode) -> Result<MapData, DataManagerError> {
        let trips = self.database.get_trips_in(range).await?;
        Ok(build_map_data(trips, mode))
    }
}

/// Evenly spread hues, one per user in sorted user order.
pub fn user_colors<'a>(user_ids: impl ExactSizeIterator<Item = &'a str>) -> Vec<UserColor> {
    let n = user_ids.len() % 360;
    let step = if n > 1 { 359 / (n - 1) } else { 0 };

    user_ids.enumerate()
        .map(|(index, user_id)| UserColor {
            user_id: user_id.to_string(),
            color: format!("hsl({}, 100%, 50%)", index * step),
        })
        .collect()
}

pub fn build_map_data(trips: Vec<ConfirmedTrip>, mode: MapMode) -> MapData {
    let mut by_user: BTreeMap<String, Vec<ConfirmedTrip>> = BTreeMap::new();
    for trip in trips {
        by_user.entry(trip.user_id.clone()).or_default().push(trip);
    }
    for trips in by_user.values_mut() {
        trips.sort_by(|a, b| a.start_fmt_time.cmp(&b.start_fmt_time));
    }

    let users = user_colors(by_user.keys().map(String::as_str));

    let features = match mode {
        MapMode::Lines => users.iter()
            .zip(by_user.values())
            .flat_map(|(user, trips)| trips.iter().map(move |trip| {
                let line = Value::LineString(vec![trip.start_coordinates.to_vec(), trip.end_coordinates.to_vec()]);
                feature(line, properties(&[("user_id", user.user_id.clone().into()), ("color", user.color.clone().into())]))
            }))
            .collect(),
        MapMode::Heatmap => by_user.values()
            .flatten()
            .flat_map(|trip| [trip.start_coordinates, trip.end_coordinates].map(|coordinates| {
                feature(Value::Point(coordinates.to_vec()), properties(&[("user_id", trip.user_id.clone().into())]))
            }))
            .collect(),
        MapMode::Bubble => {
            let mut counts: BTreeMap<(i64, i64), usize> = BTreeMap::new();
            for trip in by_user.values().flatten() {
                *counts.entry(bubble_key(trip.end_coordinates)).or_default() += 1;
            }
            counts.into_iter()
                .map(|((lon, lat), count)| {
                    let point = Value::Point(vec![lon as f64 / 1000.0, lat as f64 / 1000.0]);
                    feature(point, properties(&[("count", count.into())]))
                })
                .collect()
        }
    };

    MapData {
        users,
        features: FeatureCollection { bbox: None, features, foreign_members: None },
    }
}

/// Coordinates rounded to three decimals, roughly 100 m.
fn bubble_key([lon, lat]: [f64; 2]) -> (i64, i64) {
    ((lon * 1000.0).round() as i64, (lat * 1000.0).round() as i64)
}

fn properties(entries: &[(&str, serde_json::Value)]) -> JsonObject {
    entries.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn trip(user: &str, hour: u32, end: [f64; 2]) -> ConfirmedTrip {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, hour, 0, 0).unwrap();
        ConfirmedTrip {
            user_id: user.into(),
            start_ts: start,
            end_ts: start,
            start_fmt_time: start.to_rfc3339(),
            end_fmt_time: start.to_rfc3339(),
            timezone: "UTC".into(),
            start_coordinates: [12.5, 55.6],
            end_coordinates: end,
            distance: 0.0,
            duration: 0.0,
            mode_confirm: None,
            purpose_confirm: None,
            replaced_mode: None,
        }
    }

    #[test]
    fn colors_spread_over_the_hue_circle() {
        let colors = user_colors(["a", "b", "c"].into_iter());
        let hues: Vec<_> = colors.iter().map(|c| c.color.as_str()).collect();
        assert_eq!(hues, vec!["hsl(0, 100%, 50%)", "hsl(179, 100%, 50%)", "hsl(358, 100%, 50%)"]);

        assert_eq!(user_colors(["a"].into_iter())[0].color, "hsl(0, 100%, 50%)");
    }

    #[test]
    fn lines_are_grouped_by_user_and_sorted_by_time() {
        let trips = vec![trip("b", 9, [12.6, 55.7]), trip("a", 10, [12.7, 55.7]), trip("a", 8, [12.8, 55.7])];

        let data = build_map_data(trips, MapMode::Lines);

        let users: Vec<_> = data.users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(users, vec!["a", "b"]);
        assert_eq!(data.features.features.len(), 3);

        let first = &data.features.features[0];
        assert_eq!(first.property("user_id"), Some(&serde_json::json!("a")));
        assert_eq!(first.geometry.as_ref().unwrap().value, Value::LineString(vec![vec![12.5, 55.6], vec![12.8, 55.7]]));
    }

    #[test]
    fn bubbles_merge_nearby_ends() {
        let trips = vec![trip("a", 8, [12.60001, 55.7]), trip("b", 9, [12.6, 55.70002]), trip("b", 10, [13.0, 56.0])];

        let data = build_map_data(trips, MapMode::Bubble);

        assert_eq!(data.features.features.len(), 2);
        assert_eq!(data.features.features[0].property("count"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn heatmap_has_both_ends() {
        let data = build_map_data(vec![trip("a", 8, [12.6, 55.7])], MapMode::Heatmap);
        assert_eq!(data.features.features.len(), 2);
    }
}
