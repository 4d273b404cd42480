//! Zone polygons and the spatial index over them.
//!
//! Zones load once from a GeoJSON FeatureCollection (province polygons with
//! `prov_acr` / `prov_name` properties) and are read-only afterwards.
//! Candidate zones are prefiltered by bounding box before the exact
//! polygon tests run; a reserved `DEFAULT` zone always answers when nothing
//! matches. Loading never hard-fails: a broken or missing dataset degrades
//! to a single synthetic `DEFAULT` zone covering the whole globe.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context};
use geo::polygon;
use geo::{BoundingRect, Contains, Coord, Intersects, Line, MultiPolygon, Polygon, Rect};
use geojson::GeoJson;
use tracing::{error, info, warn};

use super::route::Coordinate;

/// Catch-all zone code for points and segments outside every polygon.
pub const DEFAULT_ZONE: &str = "DEFAULT";

/// A named geographic zone with its polygon geometry and precomputed
/// bounding box.
#[derive(Debug, Clone)]
pub struct Zone {
    pub code: String,
    pub name: String,
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl Zone {
    fn new(code: String, name: String, geometry: MultiPolygon<f64>) -> Option<Self> {
        let bbox = geometry.bounding_rect()?;
        Some(Self {
            code,
            name,
            geometry,
            bbox,
        })
    }

    /// True polygon containment test (bounding box is checked first).
    pub fn contains(&self, point: Coordinate) -> bool {
        let p = point.to_point();
        self.bbox.contains(&p) && self.geometry.contains(&p)
    }

    /// True segment/polygon intersection test (bounding boxes checked first).
    pub fn intersects_segment(&self, a: Coordinate, b: Coordinate) -> bool {
        let segment_bbox = Rect::new(
            Coord { x: a.lng, y: a.lat },
            Coord { x: b.lng, y: b.lat },
        );
        if !self.bbox.intersects(&segment_bbox) {
            return false;
        }
        let line = Line::new(Coord { x: a.lng, y: a.lat }, Coord { x: b.lng, y: b.lat });
        self.geometry.intersects(&line)
    }
}

/// Spatial index over the configured zones.
pub struct ZoneIndex {
    zones: Vec<Zone>,
}

impl ZoneIndex {
    /// Load zones from a GeoJSON file.
    ///
    /// A missing file is replaced by a small sample dataset; any parse or
    /// read failure degrades to the emergency single-DEFAULT-zone index.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!("GeoJSON file not found at {}, creating sample data", path.display());
            if let Err(e) = create_sample_geojson(path) {
                error!("failed to create sample GeoJSON: {e}");
                return Self::emergency();
            }
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                error!("failed to read GeoJSON from {}: {e}", path.display());
                return Self::emergency();
            }
        };

        match Self::from_geojson_str(&raw) {
            Ok(index) => {
                info!("loaded {} zones from {}", index.zones.len(), path.display());
                index
            }
            Err(e) => {
                error!("failed to parse GeoJSON data: {e}");
                Self::emergency()
            }
        }
    }

    /// Parse a GeoJSON FeatureCollection into a zone index.
    pub fn from_geojson_str(raw: &str) -> anyhow::Result<Self> {
        let geojson: GeoJson = raw.parse().context("invalid GeoJSON")?;
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => return Err(anyhow!("expected a FeatureCollection")),
        };

        let mut zones = Vec::new();
        for (i, feature) in collection.features.into_iter().enumerate() {
            let code = feature
                .property("prov_acr")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_ZONE)
                .to_string();
            let name = feature
                .property("prov_name")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_string();

            let Some(geometry) = feature.geometry.as_ref() else {
                error!("feature {i} has no geometry, skipping");
                continue;
            };
            let geometry = match geo::Geometry::<f64>::try_from(&geometry.value) {
                Ok(geo::Geometry::Polygon(p)) => MultiPolygon(vec![p]),
                Ok(geo::Geometry::MultiPolygon(mp)) => mp,
                Ok(_) => {
                    error!("feature {i} ({code}) is not a polygon, skipping");
                    continue;
                }
                Err(e) => {
                    error!("error processing feature {i} ({code}): {e}");
                    continue;
                }
            };

            match Zone::new(code, name, geometry) {
                Some(zone) => zones.push(zone),
                None => error!("feature {i} has a degenerate geometry, skipping"),
            }
        }

        if zones.is_empty() {
            return Err(anyhow!("no usable zone features"));
        }
        Ok(Self { zones })
    }

    /// Minimal index with a single DEFAULT zone covering the whole globe.
    pub fn emergency() -> Self {
        warn!("creating emergency geo data: single DEFAULT zone");
        let world: Polygon<f64> = polygon![
            (x: -180.0, y: -90.0),
            (x: 180.0, y: -90.0),
            (x: 180.0, y: 90.0),
            (x: -180.0, y: 90.0),
            (x: -180.0, y: -90.0),
        ];
        let zone = Zone::new(
            DEFAULT_ZONE.to_string(),
            "Default".to_string(),
            MultiPolygon(vec![world]),
        )
        .expect("world polygon has a bounding rect");
        Self { zones: vec![zone] }
    }

    /// Zone containing the point, or `DEFAULT` if none does.
    pub fn containing_zone(&self, point: Coordinate) -> &str {
        self.zones
            .iter()
            .find(|z| z.contains(point))
            .map(|z| z.code.as_str())
            .unwrap_or(DEFAULT_ZONE)
    }

    /// Codes of all zones the segment crosses, or `[DEFAULT]` if none.
    pub fn zones_crossing_segment(&self, a: Coordinate, b: Coordinate) -> Vec<&str> {
        let mut codes: Vec<&str> = self
            .zones
            .iter()
            .filter(|z| z.intersects_segment(a, b))
            .map(|z| z.code.as_str())
            .collect();
        codes.dedup();
        if codes.is_empty() {
            codes.push(DEFAULT_ZONE);
        }
        codes
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zone_codes(&self) -> Vec<&str> {
        self.zones.iter().map(|z| z.code.as_str()).collect()
    }
}

/// Write a small sample dataset (Rome, Milan, Florence boxes) so a fresh
/// deployment has something to price against.
fn create_sample_geojson(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let sample = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {
                    "prov_istat": "RM",
                    "prov_name": "Rome",
                    "prov_acr": "RM",
                    "region": "Lazio"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[12.2, 41.7], [12.8, 41.7], [12.8, 42.2], [12.2, 42.2], [12.2, 41.7]]]
                }
            },
            {
                "type": "Feature",
                "properties": {
                    "prov_istat": "MI",
                    "prov_name": "Milan",
                    "prov_acr": "MI",
                    "region": "Lombardy"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[9.0, 45.3], [9.5, 45.3], [9.5, 45.7], [9.0, 45.7], [9.0, 45.3]]]
                }
            },
            {
                "type": "Feature",
                "properties": {
                    "prov_istat": "FI",
                    "prov_name": "Florence",
                    "prov_acr": "FI",
                    "region": "Tuscany"
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[11.0, 43.7], [11.5, 43.7], [11.5, 44.0], [11.0, 44.0], [11.0, 43.7]]]
                }
            }
        ]
    });

    fs::write(path, serde_json::to_string(&sample)?)?;
    info!("created sample GeoJSON at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> ZoneIndex {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "RM", "prov_name": "Rome" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[12.2, 41.7], [12.8, 41.7], [12.8, 42.2], [12.2, 42.2], [12.2, 41.7]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "MI", "prov_name": "Milan" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[9.0, 45.3], [9.5, 45.3], [9.5, 45.7], [9.0, 45.7], [9.0, 45.3]]]
                    }
                }
            ]
        });
        ZoneIndex::from_geojson_str(&raw.to_string()).unwrap()
    }

    #[test]
    fn containing_zone_finds_rome() {
        let index = sample_index();
        assert_eq!(index.containing_zone(Coordinate::new(41.9, 12.5)), "RM");
    }

    #[test]
    fn containing_zone_defaults_outside_all_polygons() {
        let index = sample_index();
        assert_eq!(index.containing_zone(Coordinate::new(48.8, 2.35)), DEFAULT_ZONE);
    }

    #[test]
    fn segment_inside_one_zone() {
        let index = sample_index();
        let zones = index.zones_crossing_segment(
            Coordinate::new(41.8, 12.3),
            Coordinate::new(41.9, 12.5),
        );
        assert_eq!(zones, vec!["RM"]);
    }

    #[test]
    fn segment_outside_all_zones_defaults() {
        let index = sample_index();
        let zones = index.zones_crossing_segment(
            Coordinate::new(48.8, 2.3),
            Coordinate::new(48.9, 2.4),
        );
        assert_eq!(zones, vec![DEFAULT_ZONE]);
    }

    #[test]
    fn emergency_index_covers_everything() {
        let index = ZoneIndex::emergency();
        assert_eq!(index.zone_count(), 1);
        assert_eq!(index.containing_zone(Coordinate::new(41.9, 12.5)), DEFAULT_ZONE);
        assert_eq!(index.containing_zone(Coordinate::new(-33.9, 151.2)), DEFAULT_ZONE);
    }

    #[test]
    fn broken_geojson_is_an_error() {
        assert!(ZoneIndex::from_geojson_str("not geojson").is_err());
        assert!(ZoneIndex::from_geojson_str("{\"type\": \"FeatureCollection\", \"features\": []}").is_err());
    }

    #[test]
    fn non_polygon_features_are_skipped() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "PT", "prov_name": "Point" },
                    "geometry": { "type": "Point", "coordinates": [12.0, 42.0] }
                },
                {
                    "type": "Feature",
                    "properties": { "prov_acr": "RM", "prov_name": "Rome" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[12.2, 41.7], [12.8, 41.7], [12.8, 42.2], [12.2, 42.2], [12.2, 41.7]]]
                    }
                }
            ]
        });
        let index = ZoneIndex::from_geojson_str(&raw.to_string()).unwrap();
        assert_eq!(index.zone_count(), 1);
        assert_eq!(index.zone_codes(), vec!["RM"]);
    }
}
