//! Pickup-to-dropoff distance, heuristic or routed

use serde::{Deserialize, Serialize};

use crate::value_objects::{DistanceTier, GeoPoint};

/// Factor applied to the great-circle distance to approximate urban roads
pub const URBAN_DETOUR_FACTOR: f64 = 1.35;

/// Route path as `[lat, lon]` pairs
pub type RouteShape = Vec<[f64; 2]>;

/// Distance used for pricing
///
/// Starts life as a heuristic (`is_approximate = true`, no route shape) and is
/// replaced by a routed estimate once the routing service answers for the
/// same pickup/dropoff pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    /// Distance in kilometers
    pub kilometers: f64,
    /// True while the value is the straight-line heuristic
    pub is_approximate: bool,
    /// Driving path, only present for routed estimates
    pub route_shape: Option<RouteShape>,
}

impl DistanceEstimate {
    /// Instant estimate: great-circle distance times the urban detour factor
    #[must_use]
    pub fn heuristic(pickup: &GeoPoint, dropoff: &GeoPoint) -> Self {
        Self {
            kilometers: pickup.great_circle_km(dropoff) * URBAN_DETOUR_FACTOR,
            is_approximate: true,
            route_shape: None,
        }
    }

    /// Precise estimate from a routing service response
    #[must_use]
    pub fn routed(distance_meters: f64, route_shape: RouteShape) -> Self {
        Self {
            kilometers: distance_meters / 1000.0,
            is_approximate: false,
            route_shape: Some(route_shape),
        }
    }

    /// Pricing band for this distance
    #[must_use]
    pub fn tier(&self) -> DistanceTier {
        DistanceTier::for_km(self.kilometers)
    }

    /// Whole-kilometer label, prefixed with `~` while approximate
    #[must_use]
    pub fn display_kilometers(&self) -> String {
        let prefix = if self.is_approximate { "~" } else { "" };
        format!("{prefix}{:.0} km", self.kilometers)
    }
}
