//! Nominatim address search client
//!
//! Turns partially typed address text into a short list of candidate places
//! using the [Nominatim](https://nominatim.openstreetmap.org) search API.
//!
//! Requests are spaced out according to Nominatim's usage policy and results
//! are cached per query so that retyping the same text stays local.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::models::{Place, SearchQuery};

/// Configuration for the Nominatim search service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominatimConfig {
    /// Base URL for the Nominatim API
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_geocoding_timeout_secs")]
    pub timeout_secs: u64,

    /// Cache TTL in hours (0 to disable)
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// Value of the `Accept-Language` header
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Minimum spacing between two outgoing requests in milliseconds
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

fn default_geocoding_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

const fn default_geocoding_timeout_secs() -> u64 {
    8
}

const fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_accept_language() -> String {
    "en".to_string()
}

const fn default_min_request_interval_ms() -> u64 {
    1000
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            timeout_secs: default_geocoding_timeout_secs(),
            cache_ttl_hours: default_cache_ttl_hours(),
            accept_language: default_accept_language(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

impl NominatimConfig {
    /// Create a configuration suitable for testing
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout_secs: 5,
            cache_ttl_hours: 0,
            min_request_interval_ms: 0,
            ..Default::default()
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base_url must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Errors that can occur during address search
#[derive(Debug, Error)]
pub enum GeocodingError {
    /// Connection to geocoding service failed
    #[error("Geocoding connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to geocoding service failed
    #[error("Geocoding request failed: {0}")]
    RequestFailed(String),

    /// Failed to parse geocoding response
    #[error("Geocoding parse error: {0}")]
    ParseError(String),

    /// Query text was empty after trimming
    #[error("Search text must not be empty")]
    EmptyQuery,

    /// Rate limit exceeded on the server side
    #[error("Geocoding rate limit exceeded")]
    RateLimitExceeded,

    /// Request timeout
    #[error("Geocoding request timed out")]
    Timeout,
}

/// Trait for address search clients
#[async_trait]
pub trait GeocodingClient: Send + Sync {
    /// Search for places matching free-form text
    ///
    /// An empty vector means the service answered but found nothing.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, GeocodingError>;
}

/// Nominatim-based search client with request spacing and caching
#[derive(Debug)]
pub struct NominatimGeocodingClient {
    client: Client,
    config: NominatimConfig,
    cache: Cache<String, Vec<Place>>,
    last_request: Arc<Mutex<Instant>>,
}

impl NominatimGeocodingClient {
    /// Create a new Nominatim search client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: &NominatimConfig) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| GeocodingError::ConnectionFailed(e.to_string()))?;

        let cache_ttl = if config.cache_ttl_hours > 0 {
            Duration::from_secs(config.cache_ttl_hours * 3600)
        } else {
            Duration::from_secs(1)
        };

        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(cache_ttl)
            .build();

        let interval = Duration::from_millis(config.min_request_interval_ms);
        let last_request = Instant::now()
            .checked_sub(interval)
            .unwrap_or_else(Instant::now);

        Ok(Self {
            client,
            config: config.clone(),
            cache,
            last_request: Arc::new(Mutex::new(last_request)),
        })
    }

    /// Wait until the configured spacing since the previous request has elapsed
    async fn rate_limit(&self) {
        let interval = Duration::from_millis(self.config.min_request_interval_ms);
        if interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < interval {
            let wait = interval.saturating_sub(elapsed);
            debug!(?wait, "Rate limiting geocoding request");
            tokio::time::sleep(wait).await;
        }
        *last = Instant::now();
    }

    fn caching_enabled(&self) -> bool {
        self.config.cache_ttl_hours > 0
    }
}

#[async_trait]
impl GeocodingClient for NominatimGeocodingClient {
    #[instrument(skip(self), fields(text = %query.text))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, GeocodingError> {
        if query.text.trim().is_empty() {
            return Err(GeocodingError::EmptyQuery);
        }

        let cache_key = query.cache_key();
        if self.caching_enabled() {
            if let Some(places) = self.cache.get(&cache_key).await {
                debug!(count = places.len(), "Geocoding cache hit");
                return Ok(places);
            }
        }

        self.rate_limit().await;

        let url = format!("{}/search", self.config.base_url);
        let mut params = vec![
            ("q", query.biased_text()),
            ("format", "json".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(countries) = query.country_codes.as_deref().filter(|c| !c.is_empty()) {
            params.push(("countrycodes", countries.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("Accept-Language", &self.config.accept_language)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodingError::Timeout
                } else {
                    GeocodingError::ConnectionFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodingError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(GeocodingError::RequestFailed(format!("HTTP {status}")));
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .map_err(|e| GeocodingError::ParseError(e.to_string()))?;

        let places: Vec<Place> = results
            .into_iter()
            .filter_map(NominatimResult::into_place)
            .take(usize::from(query.limit))
            .collect();

        if self.caching_enabled() {
            self.cache.insert(cache_key, places.clone()).await;
        }
        debug!(count = places.len(), "Address search completed");

        Ok(places)
    }
}

/// Raw Nominatim search result
#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimResult {
    fn into_place(self) -> Option<Place> {
        let latitude = self.lat.parse::<f64>().ok()?;
        let longitude = self.lon.parse::<f64>().ok()?;
        let Some(display_name) = self.display_name.filter(|n| !n.is_empty()) else {
            debug!(%latitude, %longitude, "Skipping unnamed search result");
            return None;
        };
        Some(Place {
            display_name,
            latitude,
            longitude,
        })
    }
}
