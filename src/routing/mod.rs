//! Route resolution with a prioritized provider chain.
//!
//! `resolve` never fails: provider errors degrade down the chain and the
//! final fallback is straight-line interpolation over the haversine
//! distance.

pub mod osrm;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::geo::{
    haversine_km, interpolate_points, Coordinate, RouteResult, RouteSource,
    route::SHORT_ROUTE_KM,
};

pub use osrm::{OsrmProvider, ProviderError};

/// Segment count for the interpolated fallback route.
const FALLBACK_SEGMENTS: usize = 20;

/// Resolves routes through external providers, degrading to interpolation.
pub struct RouteResolver {
    providers: Vec<OsrmProvider>,
    fallback_segments: usize,
}

impl RouteResolver {
    pub fn new(providers: Vec<OsrmProvider>) -> Self {
        Self {
            providers,
            fallback_segments: FALLBACK_SEGMENTS,
        }
    }

    /// Build the provider chain from optional primary/secondary endpoints.
    pub fn from_endpoints(primary: Option<String>, secondary: Option<String>) -> Self {
        let mut providers = Vec::new();
        if let Some(endpoint) = primary {
            providers.push(OsrmProvider::new(&endpoint, RouteSource::Primary));
        }
        if let Some(endpoint) = secondary {
            providers.push(OsrmProvider::new(&endpoint, RouteSource::Secondary));
        }
        Self::new(providers)
    }

    /// Obtain a route between two coordinates. Always returns a result with
    /// non-negative distance and at least one point.
    pub async fn resolve(
        &self,
        pickup: Coordinate,
        dropoff: Coordinate,
        depart_at: Option<NaiveDateTime>,
    ) -> RouteResult {
        if pickup == dropoff {
            debug!("pickup and dropoff are identical, returning single-point route");
            return RouteResult::single_point(pickup);
        }

        let direct_km = haversine_km(pickup, dropoff);
        if direct_km < SHORT_ROUTE_KM {
            debug!("trip is under {SHORT_ROUTE_KM} km, skipping providers");
            return RouteResult::direct(pickup, dropoff, direct_km);
        }

        for provider in &self.providers {
            match provider.route(pickup, dropoff, depart_at).await {
                Ok(route) if route.distance_km >= 0.0 => return route,
                Ok(route) => warn!(
                    "provider {} returned a negative distance ({}), skipping",
                    provider.endpoint(),
                    route.distance_km
                ),
                Err(e) => warn!(
                    "provider {} failed, trying next in chain: {e}",
                    provider.endpoint()
                ),
            }
        }

        RouteResult {
            distance_km: direct_km,
            duration_min: 0.0,
            points: interpolate_points(pickup, dropoff, self.fallback_segments),
            source: RouteSource::Interpolated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_providers() -> RouteResolver {
        RouteResolver::new(Vec::new())
    }

    #[tokio::test]
    async fn identical_coordinates_yield_single_point() {
        let p = Coordinate::new(41.8, 12.25);
        let route = no_providers().resolve(p, p, None).await;
        assert_eq!(route.distance_km, 0.0);
        assert_eq!(route.points.len(), 1);
        assert_eq!(route.source, RouteSource::SinglePoint);
    }

    #[tokio::test]
    async fn short_trip_skips_providers() {
        let a = Coordinate::new(41.80000, 12.25000);
        let b = Coordinate::new(41.80040, 12.25000); // ~45 m
        let route = no_providers().resolve(a, b, None).await;
        assert_eq!(route.points.len(), 2);
        assert!(route.distance_km > 0.0 && route.distance_km < SHORT_ROUTE_KM);
    }

    #[tokio::test]
    async fn falls_back_to_interpolation_without_providers() {
        let a = Coordinate::new(41.80, 12.25);
        let b = Coordinate::new(41.90, 12.45);
        let route = no_providers().resolve(a, b, None).await;
        assert_eq!(route.source, RouteSource::Interpolated);
        assert_eq!(route.points.len(), FALLBACK_SEGMENTS + 1);
        assert!((route.distance_km - haversine_km(a, b)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unreachable_provider_degrades_to_interpolation() {
        // Nothing listens on this endpoint; the chain must degrade silently.
        let resolver = RouteResolver::new(vec![OsrmProvider::new(
            "http://127.0.0.1:9",
            RouteSource::Primary,
        )]);
        let a = Coordinate::new(41.80, 12.25);
        let b = Coordinate::new(41.90, 12.45);
        let route = resolver.resolve(a, b, None).await;
        assert_eq!(route.source, RouteSource::Interpolated);
        assert!(route.distance_km > 0.0);
    }

    #[tokio::test]
    async fn resolve_never_returns_empty_points() {
        let cases = [
            (Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0)),
            (Coordinate::new(41.8, 12.25), Coordinate::new(41.9, 12.45)),
            (Coordinate::new(-90.0, -180.0), Coordinate::new(90.0, 180.0)),
        ];
        for (a, b) in cases {
            let route = no_providers().resolve(a, b, None).await;
            assert!(!route.points.is_empty());
            assert!(route.distance_km >= 0.0);
        }
    }
}
