//! Geographic point value object

use serde::{Deserialize, Serialize};
use std::fmt;

use super::location_candidate::LocationCandidate;
use crate::errors::DomainError;

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Number of leading address parts that make up the short name
const SHORT_NAME_PARTS: usize = 3;

/// A selected pickup or dropoff location
///
/// Immutable once created; replacing a selection means building a new point.
/// Deserialization goes through [`GeoPoint::new`], so coordinates are always
/// range checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LocationCandidate")]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    latitude: f64,
    /// Longitude in degrees (-180 to 180)
    longitude: f64,
    /// Full display name as returned by the geocoder
    display_name: String,
}

impl GeoPoint {
    /// Create a new point with coordinate validation
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCoordinates` if latitude is not in
    /// [-90, 90] or longitude is not in [-180, 180].
    pub fn new(
        latitude: f64,
        longitude: f64,
        display_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            display_name: display_name.into(),
        })
    }

    /// Get the latitude
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Get the longitude
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Get the full display name
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The form shown in the address field after selection
    ///
    /// First three comma-separated parts of the display name.
    #[must_use]
    pub fn short_name(&self) -> String {
        leading_parts(&self.display_name, 0, SHORT_NAME_PARTS)
    }

    /// Whether the visible address text still describes this point
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        self.short_name() == text
    }

    /// Great-circle distance to another point in kilometers (haversine)
    #[must_use]
    pub fn great_circle_km(&self, other: &Self) -> f64 {
        let lat1_rad = self.latitude.to_radians();
        let lat2_rad = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (lat1_rad.cos() * lat2_rad.cos()).mul_add(
            (delta_lon / 2.0).sin().powi(2),
            (delta_lat / 2.0).sin().powi(2),
        );
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Coordinates as `[lat, lon]`, the order the map collaborator expects
    #[must_use]
    pub const fn lat_lon(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.6}, {:.6})",
            self.short_name(),
            self.latitude,
            self.longitude
        )
    }
}

/// Join `count` comma-separated parts of an address starting at `skip`
pub(crate) fn leading_parts(address: &str, skip: usize, count: usize) -> String {
    address
        .split(", ")
        .skip(skip)
        .take(count)
        .collect::<Vec<_>>()
        .join(", ")
}
