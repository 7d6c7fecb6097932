//! Two-stage distance resolution
//!
//! A heuristic estimate is available the instant both points are known; a
//! routed estimate may replace it later if the routing service answers in
//! time and no newer pair has been requested in the meantime.

use std::sync::Arc;
use std::time::Duration;

use domain::{DistanceEstimate, GeoPoint};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::ports::RoutingPort;
use crate::services::scheduling::{Sequencer, Ticket};

/// Configuration for distance resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceConfig {
    /// Upper bound for the routing lookup, in seconds
    #[serde(default = "default_routing_timeout_secs")]
    pub routing_timeout_secs: u64,
}

const fn default_routing_timeout_secs() -> u64 {
    10
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            routing_timeout_secs: default_routing_timeout_secs(),
        }
    }
}

impl DistanceConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.routing_timeout_secs == 0 {
            return Err("routing_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Routing lookup timeout
    #[must_use]
    pub const fn routing_timeout(&self) -> Duration {
        Duration::from_secs(self.routing_timeout_secs)
    }
}

/// Result of [`DistanceResolver::resolve`]
pub struct Resolution {
    /// Ticket of this request
    pub ticket: Ticket,
    /// Heuristic estimate, usable right away
    pub immediate: DistanceEstimate,
    /// Routed estimate; `None` on failure, timeout or supersession
    pub refined: BoxFuture<'static, Option<DistanceEstimate>>,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("ticket", &self.ticket)
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

/// Produces distance estimates for pickup/dropoff pairs
pub struct DistanceResolver {
    port: Arc<dyn RoutingPort>,
    config: DistanceConfig,
    sequencer: Sequencer,
}

impl std::fmt::Debug for DistanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceResolver")
            .field("config", &self.config)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl DistanceResolver {
    /// Create a new resolver
    #[must_use]
    pub fn new(port: Arc<dyn RoutingPort>, config: DistanceConfig) -> Self {
        Self {
            port,
            config,
            sequencer: Sequencer::new(),
        }
    }

    /// Estimate the distance between two points
    ///
    /// Supersedes every earlier request. The returned `refined` future is
    /// independent of `self` and may be spawned.
    #[instrument(skip(self, pickup, dropoff), fields(pickup = %pickup, dropoff = %dropoff))]
    pub fn resolve(&self, pickup: &GeoPoint, dropoff: &GeoPoint) -> Resolution {
        let ticket = self.sequencer.next();
        let immediate = DistanceEstimate::heuristic(pickup, dropoff);
        debug!(kilometers = immediate.kilometers, "Heuristic distance");

        let port = Arc::clone(&self.port);
        let sequencer = self.sequencer.clone();
        let limit = self.config.routing_timeout();
        let (origin, destination) = (pickup.clone(), dropoff.clone());

        let refined = async move {
            let summary = match timeout(limit, port.route(&origin, &destination)).await {
                Ok(Ok(summary)) => summary,
                Ok(Err(e)) => {
                    warn!(error = %e, "Route lookup failed, keeping heuristic distance");
                    return None;
                },
                Err(_) => {
                    warn!(
                        timeout_secs = limit.as_secs(),
                        "Route lookup timed out, keeping heuristic distance"
                    );
                    return None;
                },
            };

            if !sequencer.is_current(ticket) {
                debug!("Discarding route for superseded pickup/dropoff pair");
                return None;
            }

            Some(DistanceEstimate::routed(summary.distance_meters, summary.path))
        }
        .boxed();

        Resolution {
            ticket,
            immediate,
            refined,
        }
    }

    /// Supersede any in-flight refinement without issuing a new request
    pub fn invalidate(&self) {
        self.sequencer.invalidate();
    }

    /// Whether `ticket` belongs to the latest request
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.sequencer.is_current(ticket)
    }
}
