//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod circuit_breaker;
mod geocoding_adapter;
mod lead_adapter;
mod routing_adapter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use geocoding_adapter::NominatimGeocodingAdapter;
pub use lead_adapter::{LogOnlyLeadAdapter, WebhookLeadAdapter, lead_adapter_from_config};
pub use routing_adapter::OsrmRoutingAdapter;
