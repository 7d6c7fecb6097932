//! Estimator assembly
//!
//! Turns an [`AppConfig`] into a ready [`EstimatorController`] backed by
//! Nominatim, OSRM and the configured lead sink.

use std::sync::Arc;

use application::EstimatorController;
use tracing::info;

use crate::adapters::{NominatimGeocodingAdapter, OsrmRoutingAdapter, lead_adapter_from_config};
use crate::config::AppConfig;
use crate::error::InfrastructureError;
use crate::telemetry::init_tracing;

/// Build an estimator from `config`
///
/// Must be called inside a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an HTTP client
/// cannot be created.
pub fn build_estimator(config: &AppConfig) -> Result<EstimatorController, InfrastructureError> {
    config.validate().map_err(InfrastructureError::Validation)?;

    let mut geocoding = NominatimGeocodingAdapter::new(&config.nominatim)?;
    if let Some(cb) = &config.search_circuit_breaker {
        geocoding = geocoding.with_circuit_breaker(cb.clone());
    }
    let routing = OsrmRoutingAdapter::new(&config.osrm)?;
    let leads = lead_adapter_from_config(&config.leads)?;

    let controller = EstimatorController::new(
        Arc::new(geocoding),
        Arc::new(routing),
        leads,
        config.estimator.clone(),
    )?;

    info!(
        nominatim = %config.nominatim.base_url,
        osrm = %config.osrm.base_url,
        breaker = config.search_circuit_breaker.is_some(),
        "Fare estimator ready"
    );
    Ok(controller)
}

/// Load configuration, install logging and build the estimator
///
/// # Errors
///
/// Returns an error if any of the three steps fails.
pub fn start() -> Result<(AppConfig, EstimatorController), InfrastructureError> {
    let config = AppConfig::load()?;
    init_tracing(&config.telemetry)?;
    let controller = build_estimator(&config)?;
    Ok((config, controller))
}
