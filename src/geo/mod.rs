//! Geographic primitives: zone polygons, spatial lookup, route geometry.
//!
//! Everything in this module is read-only after startup. Lookups never fail:
//! points and segments that match no configured zone fall back to the
//! catch-all `DEFAULT` zone.

pub mod index;
pub mod route;
pub mod zones;

pub use index::{Zone, ZoneIndex, DEFAULT_ZONE};
pub use route::{haversine_km, interpolate_points, Coordinate, RouteResult, RouteSource};
pub use zones::{zones_crossed, ZoneDistanceMap};
