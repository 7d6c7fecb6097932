//! Driving route port

use async_trait::async_trait;
use domain::{GeoPoint, RouteShape};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Driving distance and path between two points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    /// Road distance in meters
    pub distance_meters: f64,
    /// Path as `[lat, lon]` pairs
    pub path: RouteShape,
}

/// Port for driving route lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoutingPort: Send + Sync {
    /// Fetch the preferred driving route from `origin` to `destination`
    async fn route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteSummary, ApplicationError>;
}
