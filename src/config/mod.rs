//! Pricing configuration snapshots.
//!
//! A `PricingConfig` is built once at startup (and on explicit refresh) from
//! the remote pricing store with fallback to JSON files, validated, and then
//! treated as immutable. Refreshing builds a brand-new snapshot and swaps it
//! atomically; in-flight requests keep pricing against the snapshot they
//! captured.

pub mod store;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use geo::Polygon;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info};

use crate::pricing::models::FixedPriceRule;

pub use store::RemoteConfigStore;

/// Multipliers applied by pickup time of day / day of week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMultipliers {
    #[serde(default = "default_multiplier")]
    pub night: f64,
    #[serde(default = "default_multiplier")]
    pub weekend: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for TimeMultipliers {
    fn default() -> Self {
        Self {
            night: 1.0,
            weekend: 1.0,
        }
    }
}

/// A named time window with a surge multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeWindow {
    pub name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub multiplier: f64,
}

/// Raw fixed-price rule as stored in config files / the remote store.
/// Areas are GeoJSON geometry objects, parsed into polygons at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedPriceRuleConfig {
    pub name: String,
    pub vehicle_category: String,
    pub pickup_area: serde_json::Value,
    pub dropoff_area: serde_json::Value,
    pub price: f64,
    #[serde(default)]
    pub bidirectional: bool,
}

/// Display-price hierarchy: ordered category tiers per vehicle family, and
/// the minimum margin each tier must keep over the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayHierarchy {
    #[serde(default = "default_hierarchy_margin")]
    pub margin: f64,
    pub families: Vec<Vec<String>>,
}

fn default_hierarchy_margin() -> f64 {
    10.0
}

impl Default for DisplayHierarchy {
    fn default() -> Self {
        Self {
            margin: default_hierarchy_margin(),
            families: default_families(),
        }
    }
}

/// Immutable pricing configuration snapshot.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub currency: String,
    /// Base rate per km, keyed by vehicle category. BTreeMap keeps the
    /// unknown-category fallback ("first configured category")
    /// deterministic.
    pub vehicle_rates: BTreeMap<String, f64>,
    pub zone_multipliers: HashMap<String, f64>,
    pub time_multipliers: TimeMultipliers,
    pub surge_windows: Vec<SurgeWindow>,
    pub fixed_prices: Vec<FixedPriceRule>,
    pub min_fares: HashMap<String, f64>,
    /// Tier key ("0-5", "5-20", "20-50") -> category -> minimum fare.
    pub distance_min_fares: HashMap<String, HashMap<String, f64>>,
    pub display_hierarchy: DisplayHierarchy,
}

impl PricingConfig {
    /// Validate and repair the snapshot: non-positive rates, multipliers
    /// and fares are replaced by defaults; malformed surge windows are
    /// dropped. Always leaves a usable configuration behind.
    pub fn validate(&mut self) {
        for (category, rate) in self.vehicle_rates.iter_mut() {
            if *rate <= 0.0 {
                error!("rate for {category} must be positive, got {rate}; using default");
                *rate = default_vehicle_rates().get(category).copied().unwrap_or(1.0);
            }
        }

        for (zone, multiplier) in self.zone_multipliers.iter_mut() {
            if *multiplier <= 0.0 {
                error!("multiplier for zone {zone} must be positive, got {multiplier}; using default");
                *multiplier = 1.0;
            }
        }

        for (category, fare) in self.min_fares.iter_mut() {
            if *fare <= 0.0 {
                error!("minimum fare for {category} must be positive, got {fare}; using default");
                *fare = default_min_fares().get(category).copied().unwrap_or(10.0);
            }
        }

        for (tier, fares) in self.distance_min_fares.iter_mut() {
            fares.retain(|category, fare| {
                if *fare <= 0.0 {
                    error!("distance min fare {tier}/{category} must be positive, got {fare}; dropping");
                    false
                } else {
                    true
                }
            });
        }

        self.surge_windows.retain(|w| {
            if w.start_time >= w.end_time {
                error!("surge window '{}' has start >= end; dropping", w.name);
                false
            } else if w.multiplier <= 0.0 {
                error!("surge window '{}' has a non-positive multiplier; dropping", w.name);
                false
            } else {
                true
            }
        });

        self.fixed_prices.retain(|rule| {
            if rule.price <= 0.0 {
                error!("fixed price '{}' must be positive; dropping", rule.name);
                false
            } else {
                true
            }
        });

        if self.display_hierarchy.margin <= 0.0 {
            error!(
                "display hierarchy margin must be positive, got {}; using default",
                self.display_hierarchy.margin
            );
            self.display_hierarchy.margin = default_hierarchy_margin();
        }

        if self.vehicle_rates.is_empty() {
            error!("no vehicle rates configuration available, using emergency defaults");
            self.vehicle_rates = default_vehicle_rates();
        }

        if self.zone_multipliers.is_empty() {
            error!("no zone multipliers configuration available, using emergency defaults");
            self.zone_multipliers = default_zone_multipliers();
        }

        info!("configuration validation completed");
    }
}

/// Builds configuration snapshots from the remote store and/or JSON files.
pub struct ConfigLoader {
    config_dir: PathBuf,
    store: Option<RemoteConfigStore>,
    currency: String,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>, store: Option<RemoteConfigStore>) -> Self {
        let currency = std::env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EUR".to_string());
        Self {
            config_dir: config_dir.into(),
            store,
            currency,
        }
    }

    /// Build a validated snapshot. Never fails: remote-store errors fall
    /// back to JSON files, missing files are created with defaults.
    pub async fn load(&self) -> PricingConfig {
        let mut remote_rates = None;
        let mut remote_zones = None;
        let mut remote_fixed = None;

        if let Some(store) = &self.store {
            match store.vehicle_rates().await {
                Ok(rates) if !rates.is_empty() => remote_rates = Some(rates),
                Ok(_) => {}
                Err(e) => error!("error loading vehicle rates from store: {e}; falling back to JSON configs"),
            }
            match store.zone_multipliers().await {
                Ok(zones) if !zones.is_empty() => remote_zones = Some(zones),
                Ok(_) => {}
                Err(e) => error!("error loading zone multipliers from store: {e}; falling back to JSON configs"),
            }
            match store.fixed_routes().await {
                Ok(fixed) if !fixed.is_empty() => remote_fixed = Some(fixed),
                Ok(_) => {}
                Err(e) => error!("error loading fixed routes from store: {e}; falling back to JSON configs"),
            }
        }

        let vehicle_rates = remote_rates
            .unwrap_or_else(|| self.load_or_create("vehicle_rates.json", default_vehicle_rates()));
        let zone_multipliers = remote_zones
            .unwrap_or_else(|| self.load_or_create("zone_multipliers.json", default_zone_multipliers()));
        let fixed_configs = remote_fixed
            .unwrap_or_else(|| self.load_or_create("fixed_prices.json", default_fixed_prices()));

        let mut config = PricingConfig {
            currency: self.currency.clone(),
            vehicle_rates,
            zone_multipliers,
            time_multipliers: self
                .load_or_create("time_multipliers.json", TimeMultipliers::default()),
            surge_windows: self.load_or_create("surge_multipliers.json", Vec::new()),
            fixed_prices: parse_fixed_rules(fixed_configs),
            min_fares: self.load_or_create("min_fares.json", default_min_fares()),
            distance_min_fares: self
                .load_or_create("distance_based_min_fares.json", default_distance_min_fares()),
            display_hierarchy: self
                .load_or_create("display_hierarchy.json", DisplayHierarchy::default()),
        };
        config.validate();
        config
    }

    /// Load a config file, creating it with default values if absent.
    fn load_or_create<T: Serialize + DeserializeOwned>(&self, filename: &str, default: T) -> T {
        let path = self.config_dir.join(filename);

        if !path.exists() {
            if let Err(e) = write_default(&path, &default) {
                error!("error creating config file {filename}: {e}; using default configuration");
                return default;
            }
            info!("created default configuration file: {filename}");
        }

        match fs::read_to_string(&path).map_err(anyhow::Error::from).and_then(|raw| {
            serde_json::from_str::<T>(&raw).map_err(anyhow::Error::from)
        }) {
            Ok(value) => value,
            Err(e) => {
                error!("error loading config file {filename}: {e}; using default configuration");
                default
            }
        }
    }
}

fn write_default<T: Serialize>(path: &Path, default: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(default)?)?;
    Ok(())
}

/// Parse raw rule configs into matchable rules; rules with broken area
/// geometry are logged and skipped rather than failing the whole load.
pub fn parse_fixed_rules(configs: Vec<FixedPriceRuleConfig>) -> Vec<FixedPriceRule> {
    configs
        .into_iter()
        .filter_map(|cfg| {
            let pickup_area = match parse_area(&cfg.pickup_area) {
                Ok(area) => area,
                Err(e) => {
                    error!("error parsing pickup area for fixed price '{}': {e}; skipping rule", cfg.name);
                    return None;
                }
            };
            let dropoff_area = match parse_area(&cfg.dropoff_area) {
                Ok(area) => area,
                Err(e) => {
                    error!("error parsing dropoff area for fixed price '{}': {e}; skipping rule", cfg.name);
                    return None;
                }
            };
            Some(FixedPriceRule {
                name: cfg.name,
                vehicle_category: cfg.vehicle_category,
                pickup_area,
                dropoff_area,
                price: cfg.price,
                bidirectional: cfg.bidirectional,
            })
        })
        .collect()
}

fn parse_area(value: &serde_json::Value) -> anyhow::Result<Polygon<f64>> {
    let geometry: geojson::Geometry = serde_json::from_value(value.clone())?;
    match geo::Geometry::<f64>::try_from(&geometry.value) {
        Ok(geo::Geometry::Polygon(polygon)) => Ok(polygon),
        Ok(_) => Err(anyhow!("area geometry must be a Polygon")),
        Err(e) => Err(anyhow!("invalid area geometry: {e}")),
    }
}

/// Shared handle to the current configuration snapshot. Readers capture an
/// `Arc` to the snapshot; refresh swaps the pointer without disturbing
/// in-flight captures.
#[derive(Clone)]
pub struct ConfigHandle(Arc<RwLock<Arc<PricingConfig>>>);

impl ConfigHandle {
    pub fn new(config: PricingConfig) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(config))))
    }

    pub fn current(&self) -> Arc<PricingConfig> {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, config: PricingConfig) {
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(config);
    }
}

// ==================== defaults ====================

pub fn default_vehicle_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([
        // Sedans
        ("standard_sedan".to_string(), 2.6),
        ("premium_sedan".to_string(), 3.0),
        ("vip_sedan".to_string(), 4.0),
        // Minivans
        ("standard_minivan".to_string(), 3.0),
        ("xl_minivan".to_string(), 3.4),
        ("vip_minivan".to_string(), 3.6),
        // Sprinters
        ("sprinter_8_pax".to_string(), 4.6),
        ("sprinter_16_pax".to_string(), 7.4),
        ("sprinter_21_pax".to_string(), 11.2),
        // Coach
        ("coach_51_pax".to_string(), 20.0),
    ])
}

pub fn default_zone_multipliers() -> HashMap<String, f64> {
    HashMap::from([
        ("RM".to_string(), 1.0),
        ("MI".to_string(), 1.0),
        ("FI".to_string(), 1.0),
        ("DEFAULT".to_string(), 1.0),
    ])
}

pub fn default_min_fares() -> HashMap<String, f64> {
    HashMap::from([
        ("standard_sedan".to_string(), 70.0),
        ("premium_sedan".to_string(), 80.0),
        ("vip_sedan".to_string(), 120.0),
        ("standard_minivan".to_string(), 75.0),
        ("xl_minivan".to_string(), 80.0),
        ("vip_minivan".to_string(), 85.0),
        ("sprinter_8_pax".to_string(), 120.0),
        ("sprinter_16_pax".to_string(), 180.0),
        ("sprinter_21_pax".to_string(), 300.0),
        ("coach_51_pax".to_string(), 500.0),
    ])
}

pub fn default_distance_min_fares() -> HashMap<String, HashMap<String, f64>> {
    HashMap::from([
        (
            "0-5".to_string(),
            HashMap::from([
                ("standard_sedan".to_string(), 70.0),
                ("premium_sedan".to_string(), 80.0),
                ("vip_sedan".to_string(), 120.0),
                ("standard_minivan".to_string(), 80.0),
                ("xl_minivan".to_string(), 90.0),
                ("vip_minivan".to_string(), 100.0),
                ("sprinter_8_pax".to_string(), 120.0),
                ("sprinter_16_pax".to_string(), 180.0),
                ("sprinter_21_pax".to_string(), 300.0),
                ("coach_51_pax".to_string(), 500.0),
            ]),
        ),
        (
            "5-20".to_string(),
            HashMap::from([
                ("standard_sedan".to_string(), 90.0),
                ("premium_sedan".to_string(), 100.0),
                ("vip_sedan".to_string(), 150.0),
                ("standard_minivan".to_string(), 100.0),
                ("xl_minivan".to_string(), 110.0),
                ("vip_minivan".to_string(), 120.0),
                ("sprinter_8_pax".to_string(), 190.0),
                ("sprinter_16_pax".to_string(), 240.0),
                ("sprinter_21_pax".to_string(), 360.0),
                ("coach_51_pax".to_string(), 600.0),
            ]),
        ),
        (
            "20-50".to_string(),
            HashMap::from([
                ("standard_sedan".to_string(), 120.0),
                ("premium_sedan".to_string(), 130.0),
                ("vip_sedan".to_string(), 200.0),
                ("standard_minivan".to_string(), 125.0),
                ("xl_minivan".to_string(), 135.0),
                ("vip_minivan".to_string(), 145.0),
                ("sprinter_8_pax".to_string(), 220.0),
                ("sprinter_16_pax".to_string(), 300.0),
                ("sprinter_21_pax".to_string(), 400.0),
                ("coach_51_pax".to_string(), 800.0),
            ]),
        ),
    ])
}

fn default_families() -> Vec<Vec<String>> {
    vec![
        vec![
            "standard_sedan".to_string(),
            "premium_sedan".to_string(),
            "vip_sedan".to_string(),
        ],
        vec![
            "standard_minivan".to_string(),
            "xl_minivan".to_string(),
            "vip_minivan".to_string(),
        ],
        vec![
            "sprinter_8_pax".to_string(),
            "sprinter_16_pax".to_string(),
            "sprinter_21_pax".to_string(),
        ],
        vec!["coach_51_pax".to_string()],
    ]
}

pub fn default_fixed_prices() -> Vec<FixedPriceRuleConfig> {
    vec![
        FixedPriceRuleConfig {
            name: "Rome Airport to City Center".to_string(),
            vehicle_category: "standard_sedan".to_string(),
            pickup_area: serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[12.2, 41.7], [12.3, 41.7], [12.3, 41.8], [12.2, 41.8], [12.2, 41.7]]]
            }),
            dropoff_area: serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[12.4, 41.9], [12.5, 41.9], [12.5, 42.0], [12.4, 42.0], [12.4, 41.9]]]
            }),
            price: 50.0,
            bidirectional: true,
        },
        FixedPriceRuleConfig {
            name: "Milan Airport to City Center".to_string(),
            vehicle_category: "standard_sedan".to_string(),
            pickup_area: serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[9.0, 45.3], [9.1, 45.3], [9.1, 45.4], [9.0, 45.4], [9.0, 45.3]]]
            }),
            dropoff_area: serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[9.2, 45.5], [9.3, 45.5], [9.3, 45.6], [9.2, 45.6], [9.2, 45.5]]]
            }),
            price: 45.0,
            bidirectional: true,
        },
    ]
}

/// Fully-default validated snapshot, used when no files or store exist yet.
pub fn default_config() -> PricingConfig {
    let mut config = PricingConfig {
        currency: "EUR".to_string(),
        vehicle_rates: default_vehicle_rates(),
        zone_multipliers: default_zone_multipliers(),
        time_multipliers: TimeMultipliers::default(),
        surge_windows: Vec::new(),
        fixed_prices: parse_fixed_rules(default_fixed_prices()),
        min_fares: default_min_fares(),
        distance_min_fares: default_distance_min_fares(),
        display_hierarchy: DisplayHierarchy::default(),
    };
    config.validate();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn default_config_is_usable() {
        let config = default_config();
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.vehicle_rates.len(), 10);
        assert_eq!(config.fixed_prices.len(), 2);
        assert!(config.zone_multipliers.contains_key("DEFAULT"));
        assert_eq!(config.distance_min_fares.len(), 3);
    }

    #[test]
    fn validate_replaces_non_positive_values() {
        let mut config = default_config();
        config.vehicle_rates.insert("standard_sedan".to_string(), -1.0);
        config.zone_multipliers.insert("RM".to_string(), 0.0);
        config.min_fares.insert("standard_sedan".to_string(), -5.0);
        config.validate();

        assert_eq!(config.vehicle_rates["standard_sedan"], 2.6);
        assert_eq!(config.zone_multipliers["RM"], 1.0);
        assert_eq!(config.min_fares["standard_sedan"], 70.0);
    }

    #[test]
    fn validate_replaces_empty_tables_wholesale() {
        let mut config = default_config();
        config.vehicle_rates.clear();
        config.zone_multipliers.clear();
        config.validate();

        assert!(!config.vehicle_rates.is_empty());
        assert!(!config.zone_multipliers.is_empty());
    }

    #[test]
    fn validate_drops_malformed_surge_windows() {
        let mut config = default_config();
        let day = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
        config.surge_windows = vec![
            SurgeWindow {
                name: "good".to_string(),
                start_time: day.and_hms_opt(18, 0, 0).unwrap(),
                end_time: day.and_hms_opt(22, 0, 0).unwrap(),
                multiplier: 1.5,
            },
            SurgeWindow {
                name: "inverted".to_string(),
                start_time: day.and_hms_opt(22, 0, 0).unwrap(),
                end_time: day.and_hms_opt(18, 0, 0).unwrap(),
                multiplier: 1.5,
            },
            SurgeWindow {
                name: "zero".to_string(),
                start_time: day.and_hms_opt(8, 0, 0).unwrap(),
                end_time: day.and_hms_opt(10, 0, 0).unwrap(),
                multiplier: 0.0,
            },
        ];
        config.validate();

        assert_eq!(config.surge_windows.len(), 1);
        assert_eq!(config.surge_windows[0].name, "good");
    }

    #[test]
    fn parse_fixed_rules_skips_broken_geometry() {
        let mut configs = default_fixed_prices();
        configs.push(FixedPriceRuleConfig {
            name: "broken".to_string(),
            vehicle_category: "standard_sedan".to_string(),
            pickup_area: serde_json::json!({ "type": "Banana" }),
            dropoff_area: serde_json::json!({ "type": "Polygon", "coordinates": [] }),
            price: 10.0,
            bidirectional: false,
        });
        let rules = parse_fixed_rules(configs);
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn loader_creates_default_files_and_reads_them_back() {
        let dir = std::env::temp_dir().join(format!("transferpricing-config-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let loader = ConfigLoader::new(&dir, None);
        let config = loader.load().await;
        assert_eq!(config.vehicle_rates, default_vehicle_rates());
        assert!(dir.join("vehicle_rates.json").exists());
        assert!(dir.join("min_fares.json").exists());

        // Edited files win over defaults on the next load
        fs::write(
            dir.join("vehicle_rates.json"),
            r#"{ "standard_sedan": 3.1 }"#,
        )
        .unwrap();
        let reloaded = loader.load().await;
        assert_eq!(reloaded.vehicle_rates["standard_sedan"], 3.1);
        assert_eq!(reloaded.vehicle_rates.len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn loader_falls_back_on_corrupt_files() {
        let dir = std::env::temp_dir().join(format!("transferpricing-corrupt-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vehicle_rates.json"), "not json at all").unwrap();

        let loader = ConfigLoader::new(&dir, None);
        let config = loader.load().await;
        assert_eq!(config.vehicle_rates, default_vehicle_rates());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn config_handle_swaps_atomically() {
        let handle = ConfigHandle::new(default_config());
        let before = handle.current();

        let mut next = default_config();
        next.currency = "USD".to_string();
        handle.replace(next);

        // The old capture is untouched; new readers see the new snapshot.
        assert_eq!(before.currency, "EUR");
        assert_eq!(handle.current().currency, "USD");
    }
}
