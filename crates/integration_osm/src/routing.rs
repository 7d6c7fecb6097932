//! OSRM driving route client
//!
//! Looks up the driving distance and full route geometry between two points
//! using the OSRM `route/v1` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::OsrmConfig;
use crate::error::RoutingError;
use crate::models::{Coordinate, Route};

/// Trait for routing service clients
#[async_trait]
pub trait RoutingClient: Send + Sync {
    /// Fetch the preferred driving route between two `(lat, lon)` points
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, RoutingError>;
}

/// OSRM-based routing client
#[derive(Debug)]
pub struct OsrmRoutingClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmRoutingClient {
    /// Create a new OSRM routing client
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be initialized.
    pub fn new(config: &OsrmConfig) -> Result<Self, RoutingError> {
        config.validate().map_err(RoutingError::ConfigurationError)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| RoutingError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build the request URL; OSRM expects `lon,lat` ordering
    fn route_url(&self, from: Coordinate, to: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            from.1,
            from.0,
            to.1,
            to.0
        )
    }

    /// Parse a raw OSRM response body into the first route
    fn parse_route_response(body: &str) -> Result<Route, RoutingError> {
        let raw: RawRouteResponse =
            serde_json::from_str(body).map_err(|e| RoutingError::ParseError(e.to_string()))?;

        if raw.code != "Ok" {
            return Err(RoutingError::NoRoute { code: raw.code });
        }

        let first = raw
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::NoRoute {
                code: "NoRoute".to_string(),
            })?;

        // GeoJSON positions are [lon, lat]
        let path = first
            .geometry
            .map(|g| {
                g.coordinates
                    .into_iter()
                    .map(|[lon, lat]| [lat, lon])
                    .collect()
            })
            .unwrap_or_default();

        Ok(Route {
            distance_meters: first.distance,
            duration_seconds: first.duration,
            path,
        })
    }
}

#[async_trait]
impl RoutingClient for OsrmRoutingClient {
    #[instrument(skip(self), fields(from = %format!("{},{}", from.0, from.1), to = %format!("{},{}", to.0, to.1)))]
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, RoutingError> {
        let url = self.route_url(from, to);
        let params = [("overview", "full"), ("geometries", "geojson")];

        debug!(?url, "Requesting driving route");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RoutingError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    RoutingError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RoutingError::RateLimitExceeded {
                retry_after_secs: response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::ParseError(e.to_string()))?;

        if !status.is_success() {
            // OSRM reports unroutable input as 400 with a JSON code
            if let Ok(RawRouteResponse { code, .. }) = serde_json::from_str(&body) {
                if code != "Ok" {
                    warn!(%code, "Routing service rejected request");
                    return Err(RoutingError::NoRoute { code });
                }
            }
            return Err(RoutingError::RequestFailed(format!("HTTP {status}")));
        }

        let route = Self::parse_route_response(&body)?;
        debug!(
            distance_meters = route.distance_meters,
            points = route.path.len(),
            "Route found"
        );
        Ok(route)
    }
}

#[derive(Debug, Deserialize)]
struct RawRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    coordinates: Vec<[f64; 2]>,
}
