//! Fixed-price rule matching.

use geo::Contains;
use tracing::{info, warn};

use crate::geo::Coordinate;

use super::models::FixedPriceRule;

/// Check whether a fixed price override applies to this trip.
///
/// Rules are scanned in config order and the first match wins. A rule
/// matches when pickup falls in its pickup area and dropoff in its dropoff
/// area; bidirectional rules also match the reverse direction with the
/// areas swapped. Identical pickup/dropoff coordinates never match
/// (containment would be ambiguous).
pub fn find_fixed_price(
    pickup: Coordinate,
    dropoff: Coordinate,
    vehicle_category: &str,
    rules: &[FixedPriceRule],
) -> Option<f64> {
    if pickup == dropoff {
        warn!("identical pickup and dropoff coordinates provided for fixed price check");
        return None;
    }

    let pickup_point = pickup.to_point();
    let dropoff_point = dropoff.to_point();

    for rule in rules {
        if !rule.vehicle_category.eq_ignore_ascii_case(vehicle_category) {
            continue;
        }

        if rule.pickup_area.contains(&pickup_point) && rule.dropoff_area.contains(&dropoff_point) {
            info!("fixed price rule '{}' matched", rule.name);
            return Some(rule.price);
        }

        if rule.bidirectional
            && rule.dropoff_area.contains(&pickup_point)
            && rule.pickup_area.contains(&dropoff_point)
        {
            info!("fixed price rule '{}' matched in reverse", rule.name);
            return Some(rule.price);
        }
    }

    None
}
