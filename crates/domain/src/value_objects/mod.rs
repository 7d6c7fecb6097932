//! Value Objects - Immutable, identity-less domain primitives

mod budget;
mod distance_tier;
mod geo_point;
mod location_candidate;
mod schedule;

pub use budget::BudgetRange;
pub use distance_tier::{CompetitorRate, DistanceTier, MEDIUM_TIER_MAX_KM, SHORT_TIER_MAX_KM};
pub use geo_point::GeoPoint;
pub use location_candidate::LocationCandidate;
pub use schedule::{
    MAX_PASSENGERS, MIN_PASSENGERS, PassengerCount, RiderCategory, ScheduleSelection, TripsPerDay,
};
