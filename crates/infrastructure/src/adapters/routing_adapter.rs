//! Routing adapter - Implements RoutingPort using integration_osm

use std::sync::Arc;

use application::error::ApplicationError;
use application::ports::{RouteSummary, RoutingPort};
use async_trait::async_trait;
use domain::GeoPoint;
use integration_osm::{OsrmConfig, OsrmRoutingClient, RoutingClient, RoutingError};
use tracing::{debug, instrument};

/// Driving routes backed by OSRM
pub struct OsrmRoutingAdapter {
    client: Arc<dyn RoutingClient>,
}

impl std::fmt::Debug for OsrmRoutingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsrmRoutingAdapter").finish_non_exhaustive()
    }
}

impl OsrmRoutingAdapter {
    /// Create an adapter talking to the configured OSRM instance
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// fails to initialize.
    pub fn new(config: &OsrmConfig) -> Result<Self, ApplicationError> {
        let client = OsrmRoutingClient::new(config).map_err(Self::map_error)?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: Arc<dyn RoutingClient>) -> Self {
        Self { client }
    }

    fn map_error(err: RoutingError) -> ApplicationError {
        match err {
            RoutingError::ConnectionFailed(e) | RoutingError::RequestFailed(e) => {
                ApplicationError::ExternalService(e)
            },
            RoutingError::ParseError(e) => ApplicationError::Internal(e),
            RoutingError::RateLimitExceeded { .. } => ApplicationError::RateLimited,
            RoutingError::NoRoute { code } => {
                ApplicationError::ExternalService(format!("no route: {code}"))
            },
            RoutingError::ConfigurationError(e) => ApplicationError::Configuration(e),
            RoutingError::Timeout { timeout_secs } => {
                ApplicationError::Timeout(format!("routing after {timeout_secs}s"))
            },
        }
    }
}

#[async_trait]
impl RoutingPort for OsrmRoutingAdapter {
    #[instrument(skip(self, origin, destination), fields(origin = %origin, destination = %destination))]
    async fn route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteSummary, ApplicationError> {
        let from = (origin.latitude(), origin.longitude());
        let to = (destination.latitude(), destination.longitude());

        let route = self.client.route(from, to).await.map_err(Self::map_error)?;
        debug!(
            distance_km = route.distance_km(),
            points = route.path.len(),
            "Route answered"
        );

        Ok(RouteSummary {
            distance_meters: route.distance_meters,
            path: route.path,
        })
    }
}
