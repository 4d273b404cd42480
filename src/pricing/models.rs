//! Core pricing domain models.

use geo::Polygon;
use serde::{de, Serialize, Serializer};

/// One-way or round trip. Wire values are "1" / "2", accepted as either
/// strings or integers; anything else is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn is_round_trip(self) -> bool {
        matches!(self, TripType::RoundTrip)
    }

    /// Factor applied to distance-derived monetary amounts.
    pub fn multiplier(self) -> f64 {
        match self {
            TripType::OneWay => 1.0,
            TripType::RoundTrip => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripType::OneWay => "1",
            TripType::RoundTrip => "2",
        }
    }
}

impl Serialize for TripType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> de::Deserialize<'de> for TripType {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TripTypeVisitor)
    }
}

struct TripTypeVisitor;

impl TripTypeVisitor {
    fn from_number<E: de::Error>(value: i64) -> Result<TripType, E> {
        match value {
            1 => Ok(TripType::OneWay),
            2 => Ok(TripType::RoundTrip),
            other => Err(E::custom(format!(
                "trip_type must be 1 (one-way) or 2 (round trip), got {other}"
            ))),
        }
    }
}

impl<'de> de::Visitor<'de> for TripTypeVisitor {
    type Value = TripType;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("\"1\", \"2\", 1 or 2")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<TripType, E> {
        match value {
            "1" => Ok(TripType::OneWay),
            "2" => Ok(TripType::RoundTrip),
            other => Err(E::custom(format!(
                "trip_type must be \"1\" (one-way) or \"2\" (round trip), got \"{other}\""
            ))),
        }
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<TripType, E> {
        Self::from_number(value as i64)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<TripType, E> {
        Self::from_number(value)
    }
}

/// A fixed-price override for trips between two configured areas.
/// Loaded from config with its polygons already parsed; immutable during a
/// request.
#[derive(Debug, Clone)]
pub struct FixedPriceRule {
    pub name: String,
    pub vehicle_category: String,
    pub pickup_area: Polygon<f64>,
    pub dropoff_area: Polygon<f64>,
    pub price: f64,
    pub bidirectional: bool,
}
