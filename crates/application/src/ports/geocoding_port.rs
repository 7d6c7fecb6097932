//! Address search port
//!
//! Defines the interface for turning free-form address text into candidate
//! locations. Adapters in the infrastructure layer implement this port using
//! a geocoding API.

use async_trait::async_trait;
use domain::LocationCandidate;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Regional bias applied to every address search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBias {
    /// Region name appended to the query text
    pub hint: String,
    /// Comma-separated ISO country codes results are restricted to
    pub country_codes: String,
}

impl Default for RegionBias {
    fn default() -> Self {
        Self {
            hint: "Gauteng".to_string(),
            country_codes: "za".to_string(),
        }
    }
}

/// Port for address search
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GeocodingPort: Send + Sync {
    /// Search for up to `limit` candidates matching `query`, best match first
    ///
    /// An empty vector means the service answered but found nothing; an error
    /// means the service could not be used.
    async fn search(
        &self,
        query: &str,
        bias: &RegionBias,
        limit: u8,
    ) -> Result<Vec<LocationCandidate>, ApplicationError>;
}
