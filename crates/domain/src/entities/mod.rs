//! Domain entities - Derived results and lifecycle-bound state

mod distance_estimate;
mod engagement;
mod fare_quote;
mod lead;

pub use distance_estimate::{DistanceEstimate, RouteShape, URBAN_DETOUR_FACTOR};
pub use engagement::{
    CallToAction, EngagementState, NUDGE_CTA_LABEL, REASSURANCE_MESSAGE, STANDARD_CTA_LABEL,
};
pub use fare_quote::{
    COMPETITOR_B_FACTOR, ComparisonBars, FareQuote, MONTHS_PER_YEAR, SavingsComparison,
    WEEKS_PER_MONTH, competitor_cost, format_rand, own_service_cost, tier_for,
};
pub use lead::{LeadSource, LeadSubmission};
