//! Zone attribution: turn a route's point sequence into a zone -> km map.

use std::collections::HashMap;

use tracing::warn;

use super::index::{ZoneIndex, DEFAULT_ZONE};
use super::route::{haversine_km, Coordinate, SHORT_ROUTE_KM};

/// Accumulated kilometers per zone code. Values sum to the total route
/// distance, modulo the equal split applied to segments shared between
/// zones.
pub type ZoneDistanceMap = HashMap<String, f64>;

/// Segments shorter than this (~1 meter) are treated as noise.
const MIN_SEGMENT_KM: f64 = 0.001;

/// Distance attributed to degenerate single-point routes.
const MIN_ATTRIBUTED_KM: f64 = 0.1;

/// Determine which zones the route passes through and the distance in each.
///
/// Consecutive point pairs are tested against the index; a segment crossing
/// several zones has its distance split equally among them rather than
/// clipped precisely. Route granularity bounds the resulting error.
/// Degenerate inputs always resolve to something priceable.
pub fn zones_crossed(route_points: &[Coordinate], index: &ZoneIndex) -> ZoneDistanceMap {
    let mut distances = ZoneDistanceMap::new();

    match route_points {
        [] => {
            warn!("zone attribution called with an empty route, using DEFAULT");
            distances.insert(DEFAULT_ZONE.to_string(), MIN_ATTRIBUTED_KM);
            return distances;
        }
        [only] => {
            let zone = index.containing_zone(*only);
            distances.insert(zone.to_string(), MIN_ATTRIBUTED_KM);
            return distances;
        }
        [first, last] if haversine_km(*first, *last) < SHORT_ROUTE_KM => {
            let zone = index.containing_zone(*first);
            distances.insert(zone.to_string(), haversine_km(*first, *last));
            return distances;
        }
        _ => {}
    }

    for pair in route_points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let segment_km = haversine_km(start, end);
        if segment_km < MIN_SEGMENT_KM {
            continue;
        }

        let zones = index.zones_crossing_segment(start, end);
        let share = segment_km / zones.len() as f64;
        for zone in zones {
            *distances.entry(zone.to_string()).or_insert(0.0) += share;
        }
    }

    if distances.is_empty() {
        // Every segment was sub-meter noise; fall back to the direct distance.
        let first = route_points[0];
        let last = route_points[route_points.len() - 1];
        distances.insert(DEFAULT_ZONE.to_string(), haversine_km(first, last));
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::route::interpolate_points;

    fn two_zone_index() -> ZoneIndex {
        // Two adjacent boxes sharing the meridian at lng 12.5
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "W", "prov_name": "West" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[12.0, 41.0], [12.5, 41.0], [12.5, 43.0], [12.0, 43.0], [12.0, 41.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "E", "prov_name": "East" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[12.5, 41.0], [13.0, 41.0], [13.0, 43.0], [12.5, 43.0], [12.5, 41.0]]]
                    }
                }
            ]
        });
        ZoneIndex::from_geojson_str(&raw.to_string()).unwrap()
    }

    #[test]
    fn distances_sum_to_route_total() {
        let index = two_zone_index();
        let start = Coordinate::new(42.0, 12.1);
        let end = Coordinate::new(42.0, 12.9);
        let points = interpolate_points(start, end, 20);

        let total: f64 = points
            .windows(2)
            .map(|p| haversine_km(p[0], p[1]))
            .sum();
        let attributed: f64 = zones_crossed(&points, &index).values().sum();

        assert!(
            (total - attributed).abs() < 1e-9,
            "attributed {attributed} vs total {total}"
        );
    }

    #[test]
    fn route_crossing_two_zones_touches_both() {
        let index = two_zone_index();
        let points = interpolate_points(
            Coordinate::new(42.0, 12.1),
            Coordinate::new(42.0, 12.9),
            20,
        );
        let map = zones_crossed(&points, &index);
        assert!(map.contains_key("W"));
        assert!(map.contains_key("E"));
        assert!(map["W"] > 0.0 && map["E"] > 0.0);
    }

    #[test]
    fn route_outside_all_zones_goes_to_default() {
        let index = two_zone_index();
        let points = interpolate_points(
            Coordinate::new(48.8, 2.3),
            Coordinate::new(48.9, 2.4),
            10,
        );
        let map = zones_crossed(&points, &index);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(DEFAULT_ZONE));
    }

    #[test]
    fn single_point_gets_minimal_distance() {
        let index = two_zone_index();
        let map = zones_crossed(&[Coordinate::new(42.0, 12.1)], &index);
        assert_eq!(map.len(), 1);
        assert_eq!(map["W"], MIN_ATTRIBUTED_KM);
    }

    #[test]
    fn short_two_point_route_uses_first_points_zone() {
        let index = two_zone_index();
        let a = Coordinate::new(42.0, 12.1);
        let b = Coordinate::new(42.0005, 12.1); // ~55 m
        let map = zones_crossed(&[a, b], &index);
        assert_eq!(map.len(), 1);
        let km = map["W"];
        assert!(km > 0.0 && km < 0.1);
    }

    #[test]
    fn empty_route_degrades_to_default() {
        let index = two_zone_index();
        let map = zones_crossed(&[], &index);
        assert_eq!(map.len(), 1);
        assert_eq!(map[DEFAULT_ZONE], MIN_ATTRIBUTED_KM);
    }
}
