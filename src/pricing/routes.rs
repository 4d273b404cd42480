//! Pricing route handlers

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use crate::cache::{CacheStats, QuoteCache};
use crate::error::{AppError, Result};
use crate::AppState;

use super::requests::PriceRequest;
use super::responses::{ConfigSummaryResponse, HealthResponse, PriceResponse, RefreshResponse};
use super::services;

/// Build the pricing API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check-price", post(check_price))
        .route("/health", get(health))
        .route("/config", get(config_summary))
        .route("/refresh-config", post(refresh_config))
        .route("/cache-stats", get(cache_stats))
}

/// Calculate prices for the requested categories (all configured categories
/// when none is given). Identical concurrent requests are deduplicated.
async fn check_price(
    State(state): State<AppState>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<PriceResponse>> {
    request.validate().map_err(AppError::Validation)?;

    info!(
        "received price check request from ({}, {}) to ({}, {})",
        request.pickup_lat, request.pickup_lng, request.dropoff_lat, request.dropoff_lng
    );

    let config = state.config.current();
    let hash = QuoteCache::request_hash(&request);
    let response = state
        .cache
        .get_or_compute(&hash, || {
            services::quote_prices(&request, &state.geo, &state.resolver, &config)
        })
        .await;

    Ok(Json((*response).clone()))
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Basic configuration information
async fn config_summary(State(state): State<AppState>) -> Json<ConfigSummaryResponse> {
    let config = state.config.current();
    Json(ConfigSummaryResponse {
        vehicle_categories: config.vehicle_rates.keys().cloned().collect(),
        currency: config.currency.clone(),
        zones: config.zone_multipliers.keys().cloned().collect(),
    })
}

/// Rebuild the configuration snapshot from the store/files and swap it in.
/// In-flight requests keep pricing against the snapshot they captured.
async fn refresh_config(State(state): State<AppState>) -> Json<RefreshResponse> {
    let fresh = state.loader.load().await;
    state.config.replace(fresh);
    info!("configuration refreshed successfully");
    Json(RefreshResponse {
        status: "success",
        message: "Configuration refreshed",
    })
}

/// Cache statistics for monitoring
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}
