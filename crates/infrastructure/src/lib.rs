//! Infrastructure layer - Adapters for external systems
//!
//! Implements the estimator's ports on top of Nominatim, OSRM and a lead
//! webhook, and owns configuration loading and logging setup.

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod retry;
pub mod telemetry;

pub use adapters::*;
pub use bootstrap::{build_estimator, start};
pub use config::{AppConfig, ENV_PREFIX, LeadConfig};
pub use error::InfrastructureError;
pub use retry::{RetryConfig, RetryOutcome, Retryable, retry, with_retry};
pub use telemetry::{LogFormat, TelemetryConfig, TelemetryError, init_tracing};
