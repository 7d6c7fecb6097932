//! Geocoding adapter - Implements GeocodingPort using integration_osm

use std::sync::Arc;

use application::error::ApplicationError;
use application::ports::{GeocodingPort, RegionBias};
use async_trait::async_trait;
use domain::LocationCandidate;
use integration_osm::{
    GeocodingClient, GeocodingError, NominatimConfig, NominatimGeocodingClient, Place, SearchQuery,
};
use tracing::{debug, instrument};

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// Address search backed by Nominatim
pub struct NominatimGeocodingAdapter {
    client: Arc<dyn GeocodingClient>,
    circuit_breaker: Option<CircuitBreaker>,
}

impl std::fmt::Debug for NominatimGeocodingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NominatimGeocodingAdapter")
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(CircuitBreaker::state),
            )
            .finish_non_exhaustive()
    }
}

impl NominatimGeocodingAdapter {
    /// Create an adapter talking to the configured Nominatim instance
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// fails to initialize.
    pub fn new(config: &NominatimConfig) -> Result<Self, ApplicationError> {
        config.validate().map_err(ApplicationError::Configuration)?;
        let client = NominatimGeocodingClient::new(config).map_err(Self::map_error)?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: Arc<dyn GeocodingClient>) -> Self {
        Self {
            client,
            circuit_breaker: None,
        }
    }

    /// Fail fast while the service keeps failing
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(CircuitBreaker::with_config("nominatim", config));
        self
    }

    fn map_error(err: GeocodingError) -> ApplicationError {
        match err {
            GeocodingError::ConnectionFailed(e) | GeocodingError::RequestFailed(e) => {
                ApplicationError::ExternalService(e)
            },
            GeocodingError::ParseError(e) => ApplicationError::Internal(e),
            GeocodingError::EmptyQuery => {
                ApplicationError::Internal("empty address query".to_string())
            },
            GeocodingError::RateLimitExceeded => ApplicationError::RateLimited,
            GeocodingError::Timeout => ApplicationError::Timeout("address search".to_string()),
        }
    }

    fn to_candidate(place: Place) -> LocationCandidate {
        LocationCandidate::new(place.display_name, place.latitude, place.longitude)
    }

    fn query(text: &str, bias: &RegionBias, limit: u8) -> SearchQuery {
        let mut query = SearchQuery::new(text, limit);
        if !bias.hint.is_empty() {
            query = query.with_region(bias.hint.as_str());
        }
        if !bias.country_codes.is_empty() {
            query = query.with_countries(bias.country_codes.as_str());
        }
        query
    }
}

#[async_trait]
impl GeocodingPort for NominatimGeocodingAdapter {
    #[instrument(skip(self, bias))]
    async fn search(
        &self,
        query: &str,
        bias: &RegionBias,
        limit: u8,
    ) -> Result<Vec<LocationCandidate>, ApplicationError> {
        let query = Self::query(query, bias, limit);

        let places = match &self.circuit_breaker {
            Some(cb) => cb
                .call(|| self.client.search(&query))
                .await
                .map_err(|e| match e {
                    CircuitBreakerError::CircuitOpen(name) => {
                        ApplicationError::ExternalService(format!("{name} circuit open"))
                    },
                    CircuitBreakerError::Service(e) => Self::map_error(e),
                })?,
            None => self.client.search(&query).await.map_err(Self::map_error)?,
        };

        debug!(count = places.len(), "Address search answered");
        Ok(places.into_iter().map(Self::to_candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct StubClient {
        fail: bool,
        calls: AtomicUsize,
        last: parking_lot::Mutex<Option<SearchQuery>>,
    }

    #[async_trait]
    impl GeocodingClient for StubClient {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, GeocodingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some(query.clone());
            if self.fail {
                return Err(GeocodingError::RequestFailed("HTTP 503".to_string()));
            }
            Ok(vec![Place {
                display_name: "Sandton, Johannesburg, Gauteng, South Africa".to_string(),
                latitude: -26.1076,
                longitude: 28.0567,
            }])
        }
    }

    #[tokio::test]
    async fn maps_places_and_applies_bias() {
        let stub = Arc::new(StubClient::default());
        let adapter = NominatimGeocodingAdapter::with_client(stub.clone());

        let candidates = adapter
            .search("Sandton", &RegionBias::default(), 5)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].primary_name(), "Sandton, Johannesburg, Gauteng");
        assert!((candidates[0].latitude + 26.1076).abs() < 1e-9);

        let sent = stub.last.lock().clone().unwrap();
        assert_eq!(sent.biased_text(), "Sandton, Gauteng");
        assert_eq!(sent.country_codes.as_deref(), Some("za"));
        assert_eq!(sent.limit, 5);
    }

    #[tokio::test]
    async fn empty_bias_is_not_sent() {
        let stub = Arc::new(StubClient::default());
        let adapter = NominatimGeocodingAdapter::with_client(stub.clone());
        let bias = RegionBias {
            hint: String::new(),
            country_codes: String::new(),
        };

        adapter.search("Sandton", &bias, 3).await.unwrap();

        let sent = stub.last.lock().clone().unwrap();
        assert!(sent.region_hint.is_none());
        assert!(sent.country_codes.is_none());
    }

    #[test]
    fn error_mapping() {
        assert!(matches!(
            NominatimGeocodingAdapter::map_error(GeocodingError::RateLimitExceeded),
            ApplicationError::RateLimited
        ));
        assert!(matches!(
            NominatimGeocodingAdapter::map_error(GeocodingError::Timeout),
            ApplicationError::Timeout(_)
        ));
        assert!(matches!(
            NominatimGeocodingAdapter::map_error(GeocodingError::ConnectionFailed("x".into())),
            ApplicationError::ExternalService(_)
        ));
    }

    #[tokio::test]
    async fn open_circuit_skips_the_service() {
        let stub = Arc::new(StubClient {
            fail: true,
            ..Default::default()
        });
        let adapter = NominatimGeocodingAdapter::with_client(stub.clone()).with_circuit_breaker(
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            },
        );
        let bias = RegionBias::default();

        for _ in 0..2 {
            assert!(adapter.search("Sandton", &bias, 5).await.is_err());
        }
        let err = adapter.search("Sandton", &bias, 5).await.unwrap_err();

        assert!(err.to_string().contains("circuit open"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }
}
