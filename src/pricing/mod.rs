//! Pricing engine module.
//!
//! Composes transfer prices from zone rates, time-of-day and surge
//! multipliers, fixed-route overrides and distance-tiered minimum fares.

pub mod calculators;
pub mod fixed;
pub mod models;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::round_money;
pub use models::TripType;
pub use routes::router;
pub use services::{compose_price, quote_prices, ComposedPrice};
