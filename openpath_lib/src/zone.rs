use geo::{coord, BoundingRect, Centroid, Contains, Distance, Geometry, Haversine, MultiPolygon, Point, Rect};
use serde::Deserialize;

use crate::ModelError;

const METRES_PER_DEGREE: f64 = 111_195.0;

/// Zone as sent by a client: either a GeoJSON polygon drawn on the map, or a
/// clicked point with a detection radius in metres.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ZoneShape {
    Circle { center: [f64; 2], radius: f64 },
    Geometry(geojson::Geometry),
}

/// A start or end region of a segment analysis. Only lives for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Zone {
    Area {
        polygons: MultiPolygon,
        centroid: Point,
        bounds: Rect,
    },
    Circle {
        center: Point,
        radius_m: f64,
    },
}

impl Zone {
    pub fn area(polygons: MultiPolygon) -> Result<Self, ModelError> {
        if polygons.0.iter().all(|polygon| polygon.exterior().0.len() < 4) {
            return Err(ModelError::InvalidZone("polygon has no area".into()));
        }
        let centroid = polygons.centroid().ok_or_else(|| ModelError::InvalidZone("polygon has no centroid".into()))?;
        let bounds = polygons.bounding_rect().ok_or_else(|| ModelError::InvalidZone("polygon has no bounds".into()))?;

        Ok(Zone::Area { polygons, centroid, bounds })
    }

    pub fn circle(center: Point, radius_m: f64) -> Result<Self, ModelError> {
        if !radius_m.is_finite() || radius_m <= 0. {
            return Err(ModelError::InvalidZone(format!("radius must be positive, got {radius_m}")));
        }
        if !(-90.0..=90.0).contains(&center.y()) || !(-180.0..=180.0).contains(&center.x()) {
            return Err(ModelError::InvalidZone(format!("center {:?} is not a lon/lat pair", center.x_y())));
        }
        Ok(Zone::Circle { center, radius_m })
    }

    pub fn from_geojson_str(text: &str) -> Result<Self, ModelError> {
        let geometry: geojson::Geometry = serde_json::from_str(text)
            .map_err(|err| ModelError::InvalidZone(format!("not a GeoJSON geometry: {err}")))?;
        Self::try_from(geometry)
    }

    pub fn contains(&self, point: &Point) -> bool {
        match self {
            Zone::Area { polygons, .. } => polygons.contains(point),
            Zone::Circle { center, radius_m } => Haversine.distance(*center, *point) <= *radius_m,
        }
    }

    /// Point that matches are ranked against, closest first.
    pub fn reference_point(&self) -> Point {
        match self {
            Zone::Area { centroid, .. } => *centroid,
            Zone::Circle { center, .. } => *center,
        }
    }

    /// Great-circle distance in metres from the reference point.
    pub fn distance_to_reference(&self, point: &Point) -> f64 {
        Haversine.distance(self.reference_point(), *point)
    }

    /// Lon/lat box enclosing the zone, used to pre-filter stored pings.
    pub fn bounds(&self) -> Rect {
        match self {
            Zone::Area { bounds, .. } => *bounds,
            Zone::Circle { center, radius_m } => {
                // Padded since the degree approximation drifts away from the equator.
                let lat_delta = radius_m / METRES_PER_DEGREE * 1.1;
                let lon_delta = radius_m / (METRES_PER_DEGREE * center.y().to_radians().cos().max(1e-6)) * 1.1;
                Rect::new(
                    coord! { x: center.x() - lon_delta, y: center.y() - lat_delta },
                    coord! { x: center.x() + lon_delta, y: center.y() + lat_delta },
                )
            }
        }
    }

    /// Longitude intervals covering `bounds`, split where the box runs past
    /// ±180°. The second interval repeats the first when there is no split.
    pub fn longitude_ranges(&self) -> [(f64, f64); 2] {
        let bounds = self.bounds();
        let (min, max) = (bounds.min().x, bounds.max().x);

        if max - min >= 360.0 {
            [(-180.0, 180.0); 2]
        } else if min < -180.0 {
            [(min + 360.0, 180.0), (-180.0, max)]
        } else if max > 180.0 {
            [(min, 180.0), (-180.0, max - 360.0)]
        } else {
            [(min, max); 2]
        }
    }
}

impl TryFrom<geojson::Geometry> for Zone {
    type Error = ModelError;

    fn try_from(geometry: geojson::Geometry) -> Result<Self, Self::Error> {
        let geometry = Geometry::<f64>::try_from(geometry)
            .map_err(|err| ModelError::InvalidZone(format!("unsupported geometry: {err}")))?;

        match geometry {
            Geometry::Polygon(polygon) => Zone::area(MultiPolygon::new(vec![polygon])),
            Geometry::MultiPolygon(polygons) => Zone::area(polygons),
            _ => Err(ModelError::InvalidZone("zone must be a Polygon or MultiPolygon".into())),
        }
    }
}

impl TryFrom<ZoneShape> for Zone {
    type Error = ModelError;

    fn try_from(shape: ZoneShape) -> Result<Self, Self::Error> {
        match shape {
            ZoneShape::Circle { center: [lon, lat], radius } => Zone::circle(Point::new(lon, lat), radius),
            ZoneShape::Geometry(geometry) => Zone::try_from(geometry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{"type":"Polygon","coordinates":[[[10.0,55.0],[10.1,55.0],[10.1,55.1],[10.0,55.1],[10.0,55.0]]]}"#;

    #[test]
    fn polygon_zone_from_geojson() {
        let zone = Zone::from_geojson_str(SQUARE).unwrap();

        assert!(zone.contains(&Point::new(10.05, 55.05)));
        assert!(!zone.contains(&Point::new(10.2, 55.05)));

        let centroid = zone.reference_point();
        assert!((centroid.x() - 10.05).abs() < 1e-9);
        assert!((centroid.y() - 55.05).abs() < 1e-9);
        assert!(zone.distance_to_reference(&Point::new(10.05, 55.05)) < 1.0);
    }

    #[test]
    fn non_polygons_are_rejected() {
        let line = r#"{"type":"LineString","coordinates":[[10.0,55.0],[10.1,55.0]]}"#;
        assert!(Zone::from_geojson_str(line).is_err());
        assert!(Zone::from_geojson_str("{}").is_err());
    }

    #[test]
    fn circle_zone_uses_radius_in_metres() {
        let zone = Zone::circle(Point::new(12.5683, 55.6761), 200.).unwrap();

        // ~111 m north
        assert!(zone.contains(&Point::new(12.5683, 55.6771)));
        // ~1.1 km north
        assert!(!zone.contains(&Point::new(12.5683, 55.6861)));

        let bounds = zone.bounds();
        assert!(bounds.min().y < 55.6761 && bounds.max().y > 55.6771);
        assert!(Zone::circle(Point::new(0., 0.), 0.).is_err());
        assert!(Zone::circle(Point::new(0., 95.), 10.).is_err());
    }

    #[test]
    fn zone_shape_accepts_circles_and_polygons() {
        let circle: ZoneShape = serde_json::from_str(r#"{"center":[12.5,55.6],"radius":150}"#).unwrap();
        assert!(matches!(Zone::try_from(circle).unwrap(), Zone::Circle { .. }));

        let polygon: ZoneShape = serde_json::from_str(SQUARE).unwrap();
        assert!(matches!(Zone::try_from(polygon).unwrap(), Zone::Area { .. }));
    }

    #[test]
    fn longitude_ranges_wrap_at_the_antimeridian() {
        let east = Zone::circle(Point::new(179.999, 0.), 1000.).unwrap();
        let [(a_min, a_max), (b_min, b_max)] = east.longitude_ranges();
        assert!(a_min < 179.999 && a_max == 180.0);
        assert!(b_min == -180.0 && b_max > -179.999);
        assert!(east.contains(&Point::new(-179.999, 0.)));

        let west = Zone::circle(Point::new(-179.999, 0.), 1000.).unwrap();
        let [(a_min, a_max), (b_min, _)] = west.longitude_ranges();
        assert!(a_min < 179.999 && a_max == 180.0 && b_min == -180.0);

        let inland = Zone::circle(Point::new(12.5, 55.6), 1000.).unwrap();
        let [first, second] = inland.longitude_ranges();
        assert_eq!(first, second);
        assert!(first.0 < 12.5 && first.1 > 12.5);

        let polar = Zone::circle(Point::new(0., 89.9999), 5000.).unwrap();
        assert_eq!(polar.longitude_ranges(), [(-180.0, 180.0); 2]);
    }
}
