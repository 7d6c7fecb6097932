//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Latitude or longitude outside the valid WGS84 range
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        /// Rejected latitude
        latitude: f64,
        /// Rejected longitude
        longitude: f64,
    },

    /// A fare was requested for a schedule without any travel days
    #[error("Select at least one travel day")]
    NoDaysSelected,

    /// Passenger count outside the bookable range
    #[error("Invalid passenger count: {0} (must be 1 to 4)")]
    InvalidPassengerCount(u8),

    /// Trips per day must be one-way (1) or return (2)
    #[error("Invalid trips per day: {0} (must be 1 or 2)")]
    InvalidTripsPerDay(u8),

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Returns true if this error should be shown inline next to the form
    /// rather than treated as a failure
    #[must_use]
    pub const fn is_input_validation(&self) -> bool {
        matches!(
            self,
            Self::NoDaysSelected | Self::InvalidPassengerCount(_) | Self::InvalidTripsPerDay(_)
        )
    }
}
