//! Territories domain module.
//!
//! Territory records and the geometry used to place a coordinate inside one:
//! point-in-polygon containment and approximate polygon area.

pub mod geofence;
pub mod territory;

pub use geofence::{best_territory_for_point, point_in_polygon, polygon_area_km2, territories_containing, EARTH_RADIUS_KM};
pub use territory::{GeoPoint, Territory};
