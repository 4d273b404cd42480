//! Price composition services.
//!
//! `compose_price` applies the pricing policy for a single vehicle category;
//! `quote_prices` runs it across all requested categories, resolving the
//! route and zone attribution once per request. Composition never fails a
//! request: any unexpected condition degrades to the category's flat
//! minimum fare.

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::geo::{zones_crossed, Coordinate, RouteResult, ZoneDistanceMap, ZoneIndex, DEFAULT_ZONE};
use crate::routing::RouteResolver;

use super::calculators::{
    enforce_hierarchy, flat_min_fare, minimum_fare, round_price, round_to_ten, surge_multiplier,
    time_multiplier,
};
use super::fixed::find_fixed_price;
use super::models::TripType;
use super::requests::PriceRequest;
use super::responses::{LocationInfo, PriceDetails, PriceResponse, VehiclePriceInfo};

/// Flat fare assumed for zero-distance quotes on categories without a
/// configured minimum.
const ZERO_DISTANCE_MIN_FARE: f64 = 10.0;

/// Flat fare used when composition fails outright for a category.
const DEGRADED_MIN_FARE: f64 = 15.0;

/// Composed price for one category.
#[derive(Debug, Clone)]
pub struct ComposedPrice {
    pub price: f64,
    pub currency: String,
    pub fixed_price_applied: bool,
    pub min_fare_applied: bool,
}

/// Unexpected conditions during composition. These degrade, never abort.
#[derive(Debug, Clone)]
pub enum ComposeError {
    NoVehicleRates,
}

impl std::fmt::Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeError::NoVehicleRates => {
                write!(f, "no vehicle rates configured, cannot resolve a base rate")
            }
        }
    }
}

impl std::error::Error for ComposeError {}

/// Compose the price for one vehicle category.
///
/// `route` and `zone_distances` are the one-way resolution; round trips
/// double monetary contributions, never the attribution itself. On failure
/// the category degrades to its flat minimum fare (doubled for round trips).
#[allow(clippy::too_many_arguments)]
pub fn compose_price(
    pickup: Coordinate,
    dropoff: Coordinate,
    category: &str,
    pickup_time: NaiveDateTime,
    trip_type: TripType,
    route: &RouteResult,
    zone_distances: &ZoneDistanceMap,
    config: &PricingConfig,
) -> ComposedPrice {
    match try_compose(
        pickup,
        dropoff,
        category,
        pickup_time,
        trip_type,
        route,
        zone_distances,
        config,
    ) {
        Ok(composed) => composed,
        Err(e) => {
            error!("error calculating price for {category}: {e}");
            let fallback =
                flat_min_fare(config, category, DEGRADED_MIN_FARE) * trip_type.multiplier();
            ComposedPrice {
                price: round_price(fallback),
                currency: config.currency.clone(),
                fixed_price_applied: false,
                min_fare_applied: true,
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn try_compose(
    pickup: Coordinate,
    dropoff: Coordinate,
    category: &str,
    pickup_time: NaiveDateTime,
    trip_type: TripType,
    route: &RouteResult,
    zone_distances: &ZoneDistanceMap,
    config: &PricingConfig,
) -> Result<ComposedPrice, ComposeError> {
    // Zero-distance: identical coordinates always quote the flat minimum.
    if pickup == dropoff {
        warn!("pickup and dropoff locations are identical");
        let fare = flat_min_fare(config, category, ZERO_DISTANCE_MIN_FARE);
        return Ok(ComposedPrice {
            price: round_price(fare),
            currency: config.currency.clone(),
            fixed_price_applied: true,
            min_fare_applied: true,
        });
    }

    let trip_factor = trip_type.multiplier();
    let one_way_km = route.distance_km;

    // Fixed price override, clamped up to the distance-tier floor.
    if let Some(fixed) = find_fixed_price(pickup, dropoff, category, &config.fixed_prices) {
        info!("fixed price found: {fixed} {}", config.currency);
        let mut price = fixed * trip_factor;
        let mut min_fare_applied = false;
        let floor = minimum_fare(config, category, one_way_km) * trip_factor;
        if price < floor {
            info!("fixed price below minimum fare, raising to {floor}");
            price = floor;
            min_fare_applied = true;
        }
        return Ok(ComposedPrice {
            price: round_price(price),
            currency: config.currency.clone(),
            fixed_price_applied: true,
            min_fare_applied,
        });
    }

    // Resolve the base rate, degrading unknown categories to the first
    // configured one.
    let (resolved_category, base_rate) = match config.vehicle_rates.get(category) {
        Some(rate) => (category, *rate),
        None => {
            warn!("unknown vehicle category: {category}, using default");
            let (first, rate) = config
                .vehicle_rates
                .iter()
                .next()
                .ok_or(ComposeError::NoVehicleRates)?;
            (first.as_str(), *rate)
        }
    };

    // Base price: per-zone contributions with zone multipliers, doubled for
    // round trips at accumulation time.
    let default_multiplier = config
        .zone_multipliers
        .get(DEFAULT_ZONE)
        .copied()
        .unwrap_or(1.0);
    let mut price = 0.0;
    for (zone, distance_km) in zone_distances {
        let multiplier = config
            .zone_multipliers
            .get(zone)
            .copied()
            .unwrap_or(default_multiplier);
        price += base_rate * distance_km * multiplier * trip_factor;
    }

    // Time-of-day / weekend multipliers.
    price *= time_multiplier(pickup_time, &config.time_multipliers);

    // Surge windows: the strongest matching window, never cumulative.
    let (surge, applied_surge) = surge_multiplier(pickup_time, &config.surge_windows);
    if let Some(name) = applied_surge {
        info!("applying surge window '{name}' (x{surge})");
    }
    price *= surge;

    // Distance-tiered minimum fare floor.
    let mut min_fare_applied = false;
    let floor = minimum_fare(config, resolved_category, one_way_km) * trip_factor;
    if price < floor {
        info!("applying minimum fare: {floor} {}", config.currency);
        price = floor;
        min_fare_applied = true;
    }

    Ok(ComposedPrice {
        price: round_price(price),
        currency: config.currency.clone(),
        fixed_price_applied: false,
        min_fare_applied,
    })
}

/// Quote prices for every requested category.
///
/// The route and its zone attribution are resolved once (one-way) and
/// shared across categories; each category composes independently so a
/// failure in one cannot abort its siblings.
pub async fn quote_prices(
    request: &PriceRequest,
    geo_index: &ZoneIndex,
    resolver: &RouteResolver,
    config: &PricingConfig,
) -> PriceResponse {
    let pickup = request.pickup();
    let dropoff = request.dropoff();

    let route = resolver
        .resolve(pickup, dropoff, Some(request.pickup_time))
        .await;
    let zone_distances = zones_crossed(&route.points, geo_index);
    debug!(
        "resolved {:.2} km route ({:?}) across {} zone(s)",
        route.distance_km,
        route.source,
        zone_distances.len()
    );

    let categories: Vec<String> = match request.normalized_category() {
        Some(category) => vec![category],
        None => config.vehicle_rates.keys().cloned().collect(),
    };

    let mut prices: Vec<VehiclePriceInfo> = categories
        .iter()
        .map(|category| {
            let composed = compose_price(
                pickup,
                dropoff,
                category,
                request.pickup_time,
                request.trip_type,
                &route,
                &zone_distances,
                config,
            );
            VehiclePriceInfo {
                category: category.clone(),
                raw_price: composed.price,
                currency: composed.currency,
                price: round_to_ten(composed.price),
            }
        })
        .collect();

    enforce_hierarchy(
        &mut prices,
        &config.display_hierarchy.families,
        config.display_hierarchy.margin,
    );

    PriceResponse {
        prices,
        details: PriceDetails {
            pickup_time: request.pickup_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            pickup_location: LocationInfo {
                lat: request.pickup_lat,
                lng: request.pickup_lng,
            },
            dropoff_location: LocationInfo {
                lat: request.dropoff_lat,
                lng: request.dropoff_lng,
            },
            trip_type: request.trip_type,
            request_id: Uuid::new_v4(),
        },
    }
}
