//! Route geometry value types and great-circle math.

use geo::Point;
use serde::Serialize;
use tracing::warn;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance reported when the haversine arithmetic produces a non-finite
/// value. Pricing must always see a positive distance, never an error.
pub const FALLBACK_DISTANCE_KM: f64 = 0.1;

/// Routes shorter than this are priced without consulting any provider.
pub const SHORT_ROUTE_KM: f64 = 0.1;

/// A latitude/longitude pair. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Convert to a `geo` point (x = longitude, y = latitude).
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

/// Where a resolved route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    /// Primary external routing provider.
    Primary,
    /// Secondary external routing provider.
    Secondary,
    /// Straight-line interpolation between pickup and dropoff.
    Interpolated,
    /// Pickup and dropoff are the same point.
    SinglePoint,
}

/// A resolved route: total distance, duration, and the point sequence used
/// for zone attribution. Produced fresh per request, never persisted.
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub distance_km: f64,
    pub duration_min: f64,
    pub points: Vec<Coordinate>,
    pub source: RouteSource,
}

impl RouteResult {
    /// Zero-distance route for identical pickup and dropoff.
    pub fn single_point(point: Coordinate) -> Self {
        Self {
            distance_km: 0.0,
            duration_min: 0.0,
            points: vec![point],
            source: RouteSource::SinglePoint,
        }
    }

    /// Two-point route for trips too short to be worth routing.
    pub fn direct(pickup: Coordinate, dropoff: Coordinate, distance_km: f64) -> Self {
        Self {
            distance_km,
            duration_min: 0.0,
            points: vec![pickup, dropoff],
            source: RouteSource::Interpolated,
        }
    }
}

/// Great-circle distance between two coordinates in kilometers.
///
/// Any non-finite intermediate (e.g. NaN coordinates sneaking past
/// validation) yields [`FALLBACK_DISTANCE_KM`] rather than an error.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    let distance = EARTH_RADIUS_KM * c;

    if distance.is_finite() {
        distance
    } else {
        warn!(
            "haversine produced a non-finite distance for ({}, {}) -> ({}, {}), using fallback",
            a.lat, a.lng, b.lat, b.lng
        );
        FALLBACK_DISTANCE_KM
    }
}

/// Evenly spaced points along the straight line from `start` to `end`,
/// inclusive of both endpoints. `segments` line segments yield
/// `segments + 1` points.
pub fn interpolate_points(start: Coordinate, end: Coordinate, segments: usize) -> Vec<Coordinate> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            Coordinate::new(
                start.lat + t * (end.lat - start.lat),
                start.lng + t * (end.lng - start.lng),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_rome_to_milan() {
        let rome = Coordinate::new(41.9028, 12.4964);
        let milan = Coordinate::new(45.4642, 9.19);
        let distance = haversine_km(rome, milan);
        // Rome-Milan is roughly 477 km as the crow flies
        assert!(distance > 450.0 && distance < 500.0, "got {distance}");
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Coordinate::new(41.8, 12.25);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = Coordinate::new(41.8, 12.25);
        let b = Coordinate::new(41.9, 12.45);
        let d1 = haversine_km(a, b);
        let d2 = haversine_km(b, a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn haversine_falls_back_on_non_finite_input() {
        let a = Coordinate::new(f64::NAN, 12.25);
        let b = Coordinate::new(41.9, 12.45);
        assert_eq!(haversine_km(a, b), FALLBACK_DISTANCE_KM);
    }

    #[test]
    fn interpolate_returns_segments_plus_one_points() {
        let start = Coordinate::new(41.8, 12.25);
        let end = Coordinate::new(41.9, 12.45);
        let points = interpolate_points(start, end, 20);
        assert_eq!(points.len(), 21);
        assert_eq!(points[0], start);
        assert_eq!(points[20], end);
    }

    #[test]
    fn interpolate_midpoint_is_linear() {
        let start = Coordinate::new(41.0, 12.0);
        let end = Coordinate::new(42.0, 13.0);
        let points = interpolate_points(start, end, 2);
        assert!((points[1].lat - 41.5).abs() < 1e-12);
        assert!((points[1].lng - 12.5).abs() < 1e-12);
    }

    #[test]
    fn interpolate_clamps_zero_segments() {
        let start = Coordinate::new(41.0, 12.0);
        let end = Coordinate::new(42.0, 13.0);
        let points = interpolate_points(start, end, 0);
        assert_eq!(points.len(), 2);
    }
}
