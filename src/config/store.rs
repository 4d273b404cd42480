//! Remote pricing-table store client.
//!
//! Fetches vehicle rates, zone multipliers and fixed routes from a hosted
//! REST store. The client is a constructed, injected value (never a
//! process-wide singleton); every failure is surfaced as an error so the
//! caller can fall back to the JSON file configuration.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::FixedPriceRuleConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store answered with status {0}")]
    Status(reqwest::StatusCode),
}

/// Client for the remote pricing-table store.
#[derive(Debug, Clone)]
pub struct RemoteConfigStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RemoteConfigStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build config store client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Build a store from `PRICING_STORE_URL` / `PRICING_STORE_KEY`.
    /// Returns `None` (with a warning) when credentials are absent so the
    /// service can run on file configuration alone.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("PRICING_STORE_URL").ok();
        let key = std::env::var("PRICING_STORE_KEY").ok();
        match (url, key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                info!("remote pricing store configured at {url}");
                Some(Self::new(&url, &key))
            }
            _ => {
                warn!(
                    "pricing store credentials not found in environment, \
                     using file configuration instead"
                );
                None
            }
        }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, table: &str, select: &str) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/rest/v1/{}?select={}", self.base_url, table, select);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Fetch base rates per km, keyed by vehicle category.
    pub async fn vehicle_rates(&self) -> Result<BTreeMap<String, f64>, StoreError> {
        let rows: Vec<VehicleRateRow> = self
            .fetch("vehicle_base_prices", "vehicle_type,base_price_per_km")
            .await?;
        info!("loaded {} vehicle base prices from remote store", rows.len());
        Ok(rows
            .into_iter()
            .map(|r| (r.vehicle_type, r.base_price_per_km))
            .collect())
    }

    /// Fetch zone multipliers, keyed by zone code.
    pub async fn zone_multipliers(&self) -> Result<HashMap<String, f64>, StoreError> {
        let rows: Vec<ZoneMultiplierRow> = self
            .fetch("zone_multipliers", "zone_id,multiplier")
            .await?;
        info!("loaded {} zone multipliers from remote store", rows.len());
        Ok(rows
            .into_iter()
            .map(|r| (r.zone_id, r.multiplier))
            .collect())
    }

    /// Fetch fixed-route price overrides.
    pub async fn fixed_routes(&self) -> Result<Vec<FixedPriceRuleConfig>, StoreError> {
        let rows: Vec<FixedPriceRuleConfig> = self.fetch("fixed_routes", "*").await?;
        info!("loaded {} fixed routes from remote store", rows.len());
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct VehicleRateRow {
    vehicle_type: String,
    base_price_per_km: f64,
}

#[derive(Debug, Deserialize)]
struct ZoneMultiplierRow {
    zone_id: String,
    multiplier: f64,
}
