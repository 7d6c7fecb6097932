//! OSM data models
//!
//! Typed representations of Nominatim places and OSRM routes.

use serde::{Deserialize, Serialize};

/// A `(latitude, longitude)` pair in degrees
pub type Coordinate = (f64, f64);

/// Free-text address search parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Raw text typed by the user
    pub text: String,
    /// Region name appended to the query to bias results (e.g. "Gauteng")
    pub region_hint: Option<String>,
    /// Comma-separated ISO country codes to restrict results (e.g. "za")
    pub country_codes: Option<String>,
    /// Maximum number of results
    pub limit: u8,
}

impl SearchQuery {
    /// Create an unbiased query
    #[must_use]
    pub fn new(text: impl Into<String>, limit: u8) -> Self {
        Self {
            text: text.into(),
            region_hint: None,
            country_codes: None,
            limit,
        }
    }

    /// Bias results towards a region
    #[must_use]
    pub fn with_region(mut self, region_hint: impl Into<String>) -> Self {
        self.region_hint = Some(region_hint.into());
        self
    }

    /// Restrict results to countries
    #[must_use]
    pub fn with_countries(mut self, country_codes: impl Into<String>) -> Self {
        self.country_codes = Some(country_codes.into());
        self
    }

    /// Text sent as Nominatim's `q` parameter
    #[must_use]
    pub fn biased_text(&self) -> String {
        let text = self.text.trim();
        match self.region_hint.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => format!("{text}, {region}"),
            None => text.to_string(),
        }
    }

    /// Key used for result caching
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.biased_text().to_lowercase(),
            self.country_codes.as_deref().unwrap_or_default(),
            self.limit
        )
    }
}

/// A geocoded place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Full display name
    pub display_name: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// A driving route between two coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Driving distance in meters
    pub distance_meters: f64,
    /// Expected driving time in seconds
    pub duration_seconds: f64,
    /// Path as `[lat, lon]` pairs
    pub path: Vec<[f64; 2]>,
}

impl Route {
    /// Driving distance in kilometers
    #[must_use]
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}
