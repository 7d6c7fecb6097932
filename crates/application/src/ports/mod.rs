//! Port definitions for application layer
//!
//! Ports are interfaces that define how the estimator reaches external
//! systems. Adapters in the infrastructure layer implement these ports.

mod geocoding_port;
mod lead_port;
mod routing_port;

#[cfg(test)]
pub use geocoding_port::MockGeocodingPort;
pub use geocoding_port::{GeocodingPort, RegionBias};
#[cfg(test)]
pub use lead_port::MockLeadSubmissionPort;
pub use lead_port::LeadSubmissionPort;
#[cfg(test)]
pub use routing_port::MockRoutingPort;
pub use routing_port::{RouteSummary, RoutingPort};
