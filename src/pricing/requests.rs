//! Request DTOs for pricing API endpoints.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use crate::geo::Coordinate;

use super::models::TripType;

/// Request to quote a transfer price.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRequest {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    #[serde(default)]
    pub vehicle_category: Option<String>,
    #[serde(deserialize_with = "deserialize_pickup_time")]
    pub pickup_time: NaiveDateTime,
    pub trip_type: TripType,
}

impl PriceRequest {
    /// Validate coordinate ranges; the error names the offending field.
    pub fn validate(&self) -> Result<(), String> {
        check_range("pickup_lat", self.pickup_lat, 90.0)?;
        check_range("pickup_lng", self.pickup_lng, 180.0)?;
        check_range("dropoff_lat", self.dropoff_lat, 90.0)?;
        check_range("dropoff_lng", self.dropoff_lng, 180.0)?;
        Ok(())
    }

    pub fn pickup(&self) -> Coordinate {
        Coordinate::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn dropoff(&self) -> Coordinate {
        Coordinate::new(self.dropoff_lat, self.dropoff_lng)
    }

    /// Requested vehicle category, case-folded to lowercase.
    pub fn normalized_category(&self) -> Option<String> {
        self.vehicle_category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_lowercase())
    }
}

fn check_range(field: &str, value: f64, limit: f64) -> Result<(), String> {
    if !value.is_finite() || value < -limit || value > limit {
        return Err(format!(
            "{field} must be between {} and {limit}, got {value}",
            -limit
        ));
    }
    Ok(())
}

fn deserialize_pickup_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_pickup_time(&raw).map_err(serde::de::Error::custom)
}

/// Parse an ISO-8601 timestamp, with or without an offset. Offset-carrying
/// timestamps keep their wall-clock time (pickup hours are local).
pub fn parse_pickup_time(raw: &str) -> Result<NaiveDateTime, String> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| format!("pickup_time must be an ISO-8601 timestamp, got \"{raw}\""))
}
