//! Application configuration
//!
//! Layered from an optional `config.toml` (or any format the `config` crate
//! recognizes) and `STSURFERS_`-prefixed environment variables. Nested keys
//! use a double underscore, e.g. `STSURFERS_NOMINATIM__BASE_URL` or
//! `STSURFERS_ESTIMATOR__ENGAGEMENT__NUDGE_AFTER_SECS`.

mod leads;

use std::path::Path;

use application::EstimatorConfig;
use integration_osm::{NominatimConfig, OsrmConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use leads::LeadConfig;

use crate::adapters::CircuitBreakerConfig;
use crate::telemetry::TelemetryConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "STSURFERS";

/// Everything needed to assemble the fare estimator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address search service
    #[serde(default)]
    pub nominatim: NominatimConfig,

    /// Driving route service
    #[serde(default)]
    pub osrm: OsrmConfig,

    /// Breaker in front of address search; disabled when absent
    #[serde(default)]
    pub search_circuit_breaker: Option<CircuitBreakerConfig>,

    /// Search, distance and engagement behavior
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Waitlist lead delivery
    #[serde(default)]
    pub leads: LeadConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.*` in the working directory (if any)
    /// and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value has the wrong
    /// type.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::assemble(config::File::with_name("config").required(false), None)
    }

    /// Load configuration from an explicit file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or a value has
    /// the wrong type.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        Self::assemble(config::File::from(path.as_ref()).required(true), None)
    }

    fn assemble<S>(
        file: S,
        env_override: Option<config::Map<String, String>>,
    ) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_override),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        debug!(
            nominatim = %loaded.nominatim.base_url,
            osrm = %loaded.osrm.base_url,
            webhook = loaded.leads.webhook_url.is_some(),
            "Configuration loaded"
        );
        Ok(loaded)
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting, prefixed with its section name.
    pub fn validate(&self) -> Result<(), String> {
        self.nominatim
            .validate()
            .map_err(|e| format!("nominatim: {e}"))?;
        self.osrm.validate().map_err(|e| format!("osrm: {e}"))?;
        if let Some(cb) = &self.search_circuit_breaker {
            cb.validate()
                .map_err(|e| format!("search_circuit_breaker: {e}"))?;
        }
        self.estimator
            .validate()
            .map_err(|e| format!("estimator: {e}"))?;
        self.leads.validate().map_err(|e| format!("leads: {e}"))?;
        self.telemetry
            .validate()
            .map_err(|e| format!("telemetry: {e}"))
    }
}
