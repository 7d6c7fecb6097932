//! Geocoder search candidate

use serde::{Deserialize, Serialize};

use super::geo_point::{GeoPoint, leading_parts};
use crate::errors::DomainError;

/// One ranked result of an address search
///
/// Candidates are ephemeral: a new query replaces the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    /// Full display name
    pub display_name: String,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl LocationCandidate {
    /// Create a new candidate
    #[must_use]
    pub fn new(display_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            display_name: display_name.into(),
            latitude,
            longitude,
        }
    }

    /// Headline shown in the suggestion list (first three address parts)
    #[must_use]
    pub fn primary_name(&self) -> String {
        leading_parts(&self.display_name, 0, 3)
    }

    /// Secondary line shown under the headline (address parts four to six)
    #[must_use]
    pub fn secondary_name(&self) -> String {
        leading_parts(&self.display_name, 3, 3)
    }

    /// Resolve this candidate into a selected point
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCoordinates` if the geocoder returned
    /// coordinates outside the valid range.
    pub fn to_geo_point(&self) -> Result<GeoPoint, DomainError> {
        GeoPoint::new(self.latitude, self.longitude, self.display_name.clone())
    }
}

impl TryFrom<LocationCandidate> for GeoPoint {
    type Error = DomainError;

    fn try_from(candidate: LocationCandidate) -> Result<Self, Self::Error> {
        Self::new(
            candidate.latitude,
            candidate.longitude,
            candidate.display_name,
        )
    }
}
