//! HTTP client for OSRM-compatible routing providers.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::{Client, Url};
use tracing::debug;

use crate::geo::{Coordinate, RouteResult, RouteSource};

/// A hung provider must not stall the request; fail over instead.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors encountered while fetching a route from a provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered with code {0}")]
    Api(String),
    #[error("provider returned no usable route geometry")]
    NoRoute,
}

/// Thin HTTP client for one OSRM-compatible routing endpoint.
#[derive(Debug, Clone)]
pub struct OsrmProvider {
    client: Client,
    endpoint: String,
    source: RouteSource,
}

impl OsrmProvider {
    /// Create a provider for the given endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str, source: RouteSource) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build routing client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            source,
        }
    }

    pub fn source(&self) -> RouteSource {
        self.source
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch a driving route between two coordinates.
    ///
    /// OSRM does not price departure time into its responses; the parameter
    /// is part of the provider contract for implementations that do.
    pub async fn route(
        &self,
        pickup: Coordinate,
        dropoff: Coordinate,
        _depart_at: Option<NaiveDateTime>,
    ) -> Result<RouteResult, ProviderError> {
        let coords = format!(
            "{:.6},{:.6};{:.6},{:.6}",
            pickup.lng, pickup.lat, dropoff.lng, dropoff.lat
        );
        let base = format!("{}/route/v1/driving/{}", self.endpoint, coords);
        let mut url = Url::parse(&base)
            .map_err(|e| ProviderError::Api(format!("failed to build route URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");

        debug!("requesting route from {}", self.endpoint);
        let response = self.client.get(url).send().await?;
        let parsed: OsrmRouteResponse = response.json().await?;
        parse_route_response(parsed, self.source)
    }
}

#[derive(serde::Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(serde::Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: Option<OsrmGeometry>,
}

#[derive(serde::Deserialize)]
struct OsrmGeometry {
    /// GeoJSON LineString coordinates: `[lng, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

fn parse_route_response(
    resp: OsrmRouteResponse,
    source: RouteSource,
) -> Result<RouteResult, ProviderError> {
    if resp.code != "Ok" {
        return Err(ProviderError::Api(resp.code));
    }

    let route = resp
        .routes
        .and_then(|mut routes| {
            if routes.is_empty() {
                None
            } else {
                Some(routes.remove(0))
            }
        })
        .ok_or(ProviderError::NoRoute)?;

    let points: Vec<Coordinate> = route
        .geometry
        .map(|g| {
            g.coordinates
                .into_iter()
                .map(|[lng, lat]| Coordinate::new(lat, lng))
                .collect()
        })
        .unwrap_or_default();

    if points.len() < 2 {
        return Err(ProviderError::NoRoute);
    }

    Ok(RouteResult {
        distance_km: route.distance / 1000.0,
        duration_min: route.duration / 60.0,
        points,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response(coords: Vec<[f64; 2]>) -> OsrmRouteResponse {
        OsrmRouteResponse {
            code: "Ok".to_string(),
            routes: Some(vec![OsrmRoute {
                distance: 22_000.0,
                duration: 1800.0,
                geometry: Some(OsrmGeometry { coordinates: coords }),
            }]),
        }
    }

    #[test]
    fn parses_distance_duration_and_points() {
        let resp = ok_response(vec![[12.25, 41.80], [12.35, 41.85], [12.45, 41.90]]);
        let route = parse_route_response(resp, RouteSource::Primary).unwrap();
        assert_eq!(route.distance_km, 22.0);
        assert_eq!(route.duration_min, 30.0);
        assert_eq!(route.points.len(), 3);
        // Coordinates come back as lng,lat and must flip to lat,lng
        assert_eq!(route.points[0], Coordinate::new(41.80, 12.25));
        assert_eq!(route.source, RouteSource::Primary);
    }

    #[test]
    fn non_ok_code_is_an_api_error() {
        let resp = OsrmRouteResponse {
            code: "NoSegment".to_string(),
            routes: None,
        };
        assert!(matches!(
            parse_route_response(resp, RouteSource::Primary),
            Err(ProviderError::Api(code)) if code == "NoSegment"
        ));
    }

    #[test]
    fn missing_routes_is_no_route() {
        let resp = OsrmRouteResponse {
            code: "Ok".to_string(),
            routes: Some(vec![]),
        };
        assert!(matches!(
            parse_route_response(resp, RouteSource::Primary),
            Err(ProviderError::NoRoute)
        ));
    }

    #[test]
    fn single_point_geometry_is_no_route() {
        let resp = ok_response(vec![[12.25, 41.80]]);
        assert!(matches!(
            parse_route_response(resp, RouteSource::Secondary),
            Err(ProviderError::NoRoute)
        ));
    }
}
