//! OpenStreetMap integration for the fare estimator
//!
//! Provides free-text address search via
//! [Nominatim/OpenStreetMap](https://nominatim.openstreetmap.org) and driving
//! distance plus route geometry via the [OSRM](https://project-osrm.org)
//! routing API.
//!
//! # Architecture
//!
//! The crate follows a client-trait pattern consistent with other integration crates.
//! [`GeocodingClient`] defines address search, implemented by
//! [`NominatimGeocodingClient`]. [`RoutingClient`] defines route lookup,
//! implemented by [`OsrmRoutingClient`].
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_osm::{OsrmConfig, OsrmRoutingClient, RoutingClient};
//!
//! let client = OsrmRoutingClient::new(&OsrmConfig::default())?;
//!
//! let route = client.route(
//!     (-26.2485, 27.8540), // Soweto
//!     (-26.2041, 28.0473), // Johannesburg CBD
//! ).await?;
//! println!("{:.1} km", route.distance_meters / 1000.0);
//! ```

mod config;
mod error;
mod geocoding;
mod models;
mod routing;

pub use config::OsrmConfig;
pub use error::RoutingError;
pub use geocoding::{GeocodingClient, GeocodingError, NominatimConfig, NominatimGeocodingClient};
pub use models::{Coordinate, Place, Route, SearchQuery};
pub use routing::{OsrmRoutingClient, RoutingClient};

/// `User-Agent` sent on every outbound request; Nominatim's usage policy
/// requires one that identifies the application
pub const USER_AGENT: &str = concat!("StSurfers-FareEstimator/", env!("CARGO_PKG_VERSION"));
