//! Infrastructure errors

use application::ApplicationError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

/// Errors raised while loading configuration or wiring the estimator
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// A configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but holds an invalid value
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// An adapter or the controller refused to start
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Logging could not be installed
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
