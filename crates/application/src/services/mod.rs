//! Application services - Use case implementations

mod distance_resolver;
mod engagement_timer;
mod estimator_controller;
mod geo_search;
mod scheduling;
mod section_boundary;

pub use distance_resolver::{DistanceConfig, DistanceResolver, Resolution};
pub use engagement_timer::{EngagementConfig, EngagementTick, EngagementTimer};
pub use estimator_controller::{
    AddressField, AddressRole, ESTIMATOR_SECTION_LABEL, EstimateSummary, EstimatorConfig,
    EstimatorController, EstimatorUpdate, MapView, SEARCH_DEGRADED_MESSAGE, SearchNotice,
};
pub use geo_search::{DebouncedSearch, GeoSearchConfig, GeoSearchService, SearchOutcome, SearchStatus};
pub use scheduling::{CancelableTimer, Sequencer, Ticket};
pub use section_boundary::{SectionBoundary, SectionView};
