use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use transferpricing_api::cache::{start_cache_sweeper, QuoteCache};
use transferpricing_api::config::{ConfigHandle, ConfigLoader, RemoteConfigStore};
use transferpricing_api::geo::ZoneIndex;
use transferpricing_api::routing::RouteResolver;
use transferpricing_api::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("transferpricing_api=info,tower_http=info")),
        )
        .init();

    info!("starting transfer pricing API");

    // Geo reference data loads once; reload is a restart-time concern.
    let geojson_path =
        env::var("GEOJSON_PATH").unwrap_or_else(|_| "data/editedITprov.geojson".to_string());
    let geo = Arc::new(ZoneIndex::load(Path::new(&geojson_path)));

    let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let loader = Arc::new(ConfigLoader::new(config_dir, RemoteConfigStore::from_env()));
    let config = ConfigHandle::new(loader.load().await);

    let resolver = Arc::new(RouteResolver::from_endpoints(
        env::var("OSRM_PRIMARY_URL").ok(),
        env::var("OSRM_SECONDARY_URL").ok(),
    ));

    let cache = Arc::new(QuoteCache::new());
    tokio::spawn(start_cache_sweeper(cache.clone()));

    let state = AppState {
        config,
        loader,
        geo,
        resolver,
        cache,
    };

    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
