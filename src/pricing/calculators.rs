//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no I/O. The composer in `services`
//! chains these according to the pricing precedence rules.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::config::{PricingConfig, SurgeWindow, TimeMultipliers};

use super::responses::VehiclePriceInfo;

/// Night hours: pickup before 06:00 or at/after 22:00.
const NIGHT_START_HOUR: u32 = 22;
const NIGHT_END_HOUR: u32 = 6;

/// Round to specified decimal places using banker's rounding
/// (ROUND_HALF_EVEN). Rounding to the nearest even digit on exact halves
/// avoids cumulative bias across many quotes.
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Round a composed price to 2 decimal places.
pub fn round_price(amount: f64) -> f64 {
    Decimal::from_f64(amount)
        .map(|d| round_money(d, 2).to_f64().unwrap_or(amount))
        .unwrap_or(amount)
}

/// Round a price to the nearest 10 currency units for display.
pub fn round_to_ten(amount: f64) -> f64 {
    (amount / 10.0).round() * 10.0
}

/// Combined weekend/night multiplier for the pickup time. Both can apply;
/// they compose multiplicatively.
pub fn time_multiplier(pickup: NaiveDateTime, multipliers: &TimeMultipliers) -> f64 {
    let mut factor = 1.0;
    if matches!(pickup.weekday(), Weekday::Sat | Weekday::Sun) {
        factor *= multipliers.weekend;
    }
    let hour = pickup.hour();
    if hour < NIGHT_END_HOUR || hour >= NIGHT_START_HOUR {
        factor *= multipliers.night;
    }
    factor
}

/// Surge multiplier for the pickup time: the maximum among all windows
/// containing it (matching windows do not stack), or 1.0 if none match.
/// Returns the applied window's name for logging.
pub fn surge_multiplier<'a>(
    pickup: NaiveDateTime,
    windows: &'a [SurgeWindow],
) -> (f64, Option<&'a str>) {
    let mut current = 1.0;
    let mut applied = None;
    for window in windows {
        if window.start_time <= pickup
            && pickup <= window.end_time
            && window.multiplier > current
        {
            current = window.multiplier;
            applied = Some(window.name.as_str());
        }
    }
    (current, applied)
}

/// Distance tier key for a one-way distance, or `None` beyond the last
/// tier (which falls back to the flat per-category minimum).
pub fn distance_tier(one_way_km: f64) -> Option<&'static str> {
    if one_way_km < 5.0 {
        Some("0-5")
    } else if one_way_km < 20.0 {
        Some("5-20")
    } else if one_way_km <= 50.0 {
        Some("20-50")
    } else {
        None
    }
}

/// One-way minimum fare for a category: the distance-tier table where it
/// applies, otherwise the flat per-category minimum.
pub fn minimum_fare(config: &PricingConfig, category: &str, one_way_km: f64) -> f64 {
    if let Some(tier) = distance_tier(one_way_km) {
        if let Some(fare) = config
            .distance_min_fares
            .get(tier)
            .and_then(|fares| fares.get(category))
        {
            return *fare;
        }
    }
    config.min_fares.get(category).copied().unwrap_or(0.0)
}

/// Flat minimum fare for a category with an explicit default for unknown
/// categories (callers pick the default their degrade path requires).
pub fn flat_min_fare(config: &PricingConfig, category: &str, default: f64) -> f64 {
    config.min_fares.get(category).copied().unwrap_or(default)
}

/// Enforce the display-price hierarchy: within each configured family, every
/// later tier must display at least `margin` above the previous one.
/// Mutates only the display `price`; `raw_price` is untouched.
pub fn enforce_hierarchy(prices: &mut [VehiclePriceInfo], families: &[Vec<String>], margin: f64) {
    for family in families {
        let mut floor: Option<f64> = None;
        for category in family {
            let Some(entry) = prices.iter_mut().find(|p| &p.category == category) else {
                continue;
            };
            if let Some(previous) = floor {
                if entry.price < previous + margin {
                    entry.price = previous + margin;
                }
            }
            floor = Some(entry.price);
        }
    }
}
