//! Response DTOs for pricing API endpoints.

use serde::Serialize;
use uuid::Uuid;

use super::models::TripType;

/// Price for one vehicle category.
///
/// `raw_price` is the composed price rounded to 2 decimals; `price` is the
/// display price (rounded to the nearest 10, hierarchy-corrected).
#[derive(Debug, Clone, Serialize)]
pub struct VehiclePriceInfo {
    pub category: String,
    pub raw_price: f64,
    pub currency: String,
    pub price: f64,
}

/// Request echo returned alongside the prices.
#[derive(Debug, Clone, Serialize)]
pub struct PriceDetails {
    pub pickup_time: String,
    pub pickup_location: LocationInfo,
    pub dropoff_location: LocationInfo,
    pub trip_type: TripType,
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub lat: f64,
    pub lng: f64,
}

/// Full quote response.
#[derive(Debug, Clone, Serialize)]
pub struct PriceResponse {
    pub prices: Vec<VehiclePriceInfo>,
    pub details: PriceDetails,
}

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Public configuration summary (no secrets).
#[derive(Debug, Serialize)]
pub struct ConfigSummaryResponse {
    pub vehicle_categories: Vec<String>,
    pub currency: String,
    pub zones: Vec<String>,
}

/// Outcome of a configuration refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub message: &'static str,
}
