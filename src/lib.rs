//! Transfer pricing service.
//!
//! Prices point-to-point vehicle transfers: route distance acquisition with
//! a provider fallback chain, zone attribution along the route, layered
//! price composition, and a request-deduplicating quote cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod pricing;
pub mod routing;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cache::QuoteCache;
use config::{ConfigHandle, ConfigLoader};
use geo::ZoneIndex;
use routing::RouteResolver;

/// Shared application state. Everything here is either immutable after
/// startup or internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigHandle,
    pub loader: Arc<ConfigLoader>,
    pub geo: Arc<ZoneIndex>,
    pub resolver: Arc<RouteResolver>,
    pub cache: Arc<QuoteCache>,
}

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    pricing::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
