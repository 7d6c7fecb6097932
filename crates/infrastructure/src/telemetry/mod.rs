//! Structured logging
//!
//! Installs the global `tracing` subscriber for the estimator. Output is
//! human-readable by default and JSON for log shippers.

mod subscriber;

pub use subscriber::{LogFormat, TelemetryConfig, TelemetryError, init_tracing};
