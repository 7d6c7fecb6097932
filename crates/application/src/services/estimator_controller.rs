//! Fare estimator composition root
//!
//! [`EstimatorController`] owns every piece of estimator state for one
//! mounted estimator. Synchronous operations mirror user actions; the
//! asynchronous completions they trigger (search responses, route
//! refinements, escalation ticks) are applied one at a time by
//! [`EstimatorController::pump`].

use std::sync::Arc;

use chrono::Weekday;
use domain::{
    CallToAction, DistanceEstimate, DistanceTier, DomainError, EngagementState, FareQuote,
    GeoPoint, LeadSource, LeadSubmission, LocationCandidate, RiderCategory, RouteShape,
    SavingsComparison, ScheduleSelection, TripsPerDay, format_rand,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::ApplicationError;
use crate::ports::{GeocodingPort, LeadSubmissionPort, RoutingPort};
use crate::services::distance_resolver::{DistanceConfig, DistanceResolver};
use crate::services::engagement_timer::{EngagementConfig, EngagementTick, EngagementTimer};
use crate::services::geo_search::{
    DebouncedSearch, GeoSearchConfig, GeoSearchService, SearchOutcome, SearchStatus,
};
use crate::services::scheduling::Ticket;
use crate::services::section_boundary::{SectionBoundary, SectionView};

/// Banner shown while address search is unavailable
pub const SEARCH_DEGRADED_MESSAGE: &str =
    "Location search is down right now. Use the distance selector below instead.";

/// Label of the estimator results section
pub const ESTIMATOR_SECTION_LABEL: &str = "Fare estimator";

/// Configuration for one estimator instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Address search
    #[serde(default)]
    pub search: GeoSearchConfig,
    /// Distance resolution
    #[serde(default)]
    pub distance: DistanceConfig,
    /// Idle escalation
    #[serde(default)]
    pub engagement: EngagementConfig,
}

impl EstimatorConfig {
    /// Validate every component configuration
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, prefixed with its component.
    pub fn validate(&self) -> Result<(), String> {
        self.search.validate().map_err(|e| format!("search: {e}"))?;
        self.distance
            .validate()
            .map_err(|e| format!("distance: {e}"))?;
        self.engagement
            .validate()
            .map_err(|e| format!("engagement: {e}"))
    }
}

/// Which address field an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressRole {
    /// Where the trip starts
    Pickup,
    /// Where the trip ends
    Dropoff,
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pickup => write!(f, "pickup"),
            Self::Dropoff => write!(f, "dropoff"),
        }
    }
}

/// Dismissible notice about address search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchNotice {
    /// Search is unavailable; the manual distance selector still works
    Degraded,
}

impl SearchNotice {
    /// Text shown to the user
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Degraded => SEARCH_DEGRADED_MESSAGE,
        }
    }
}

/// Text, suggestions and selection of one address input
#[derive(Debug)]
pub struct AddressField {
    text: String,
    candidates: Vec<LocationCandidate>,
    selected: Option<GeoPoint>,
    search: DebouncedSearch,
}

impl AddressField {
    fn new(search: DebouncedSearch) -> Self {
        Self {
            text: String::new(),
            candidates: Vec::new(),
            selected: None,
            search,
        }
    }

    /// Visible input text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current suggestion list
    #[must_use]
    pub fn candidates(&self) -> &[LocationCandidate] {
        &self.candidates
    }

    /// Confirmed location, if any
    #[must_use]
    pub const fn selected(&self) -> Option<&GeoPoint> {
        self.selected.as_ref()
    }
}

/// Data handed to the map widget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// Pickup marker
    pub pickup: Option<GeoPoint>,
    /// Dropoff marker
    pub dropoff: Option<GeoPoint>,
    /// Driving path, once routed
    pub route_shape: Option<RouteShape>,
}

/// Everything the results section shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateSummary {
    /// Pricing band
    pub tier: DistanceTier,
    /// Distance the tier was derived from; `None` when the tier was chosen manually
    pub distance: Option<DistanceEstimate>,
    /// Monthly cost per provider
    pub quote: FareQuote,
    /// Per-person comparison
    pub savings: SavingsComparison,
}

impl EstimateSummary {
    /// Price a schedule for a tier
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` for an empty schedule.
    pub fn compute(
        tier: DistanceTier,
        distance: Option<DistanceEstimate>,
        schedule: &ScheduleSelection,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            tier,
            distance,
            quote: FareQuote::compute(tier, schedule)?,
            savings: SavingsComparison::compute(tier, schedule)?,
        })
    }

    /// Headline own-service monthly total, e.g. `R3 464`
    #[must_use]
    pub fn own_service_label(&self) -> String {
        format_rand(self.quote.own_service)
    }

    /// Monthly saving per person, e.g. `R6 668`
    #[must_use]
    pub fn savings_label(&self) -> String {
        format_rand(self.savings.savings_per_person)
    }

    /// Own-service cost per average week, e.g. `R800`
    #[must_use]
    pub fn own_service_weekly_label(&self) -> String {
        format_rand(self.quote.per_week().own_service)
    }

    /// Competitor A monthly total; competitor prices are estimates, e.g. `~R10 132`
    #[must_use]
    pub fn competitor_a_label(&self) -> String {
        format!("~{}", format_rand(self.quote.competitor_a))
    }

    /// Competitor A per average week, e.g. `~R2 340`
    #[must_use]
    pub fn competitor_a_weekly_label(&self) -> String {
        format!("~{}", format_rand(self.quote.per_week().competitor_a))
    }

    /// Competitor B monthly total, e.g. `~R8 815`
    #[must_use]
    pub fn competitor_b_label(&self) -> String {
        format!("~{}", format_rand(self.quote.competitor_b))
    }

    /// Competitor B per average week, e.g. `~R2 036`
    #[must_use]
    pub fn competitor_b_weekly_label(&self) -> String {
        format!("~{}", format_rand(self.quote.per_week().competitor_b))
    }
}

/// What changed after an asynchronous completion was applied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorUpdate {
    /// Suggestions were replaced
    Candidates {
        /// Field whose suggestions changed
        role: AddressRole,
        /// Number of suggestions
        count: usize,
    },
    /// The search service answered without matches
    NoMatches {
        /// Field that was searched
        role: AddressRole,
    },
    /// The search service is unavailable
    SearchDegraded {
        /// Field that was searched
        role: AddressRole,
    },
    /// The routed distance replaced the heuristic
    DistanceRefined {
        /// Road distance in kilometers
        kilometers: f64,
    },
    /// The engagement timer escalated
    Engagement {
        /// New state
        state: EngagementState,
    },
}

#[derive(Debug)]
struct RouteRefinement {
    ticket: Ticket,
    estimate: Option<DistanceEstimate>,
}

enum Completion {
    Search(AddressRole, SearchOutcome),
    Route(RouteRefinement),
    Tick(EngagementTick),
}

/// State and behaviour of one mounted fare estimator
pub struct EstimatorController {
    pickup: AddressField,
    dropoff: AddressField,
    resolver: DistanceResolver,
    refinement_tx: mpsc::UnboundedSender<RouteRefinement>,
    refinement_rx: mpsc::UnboundedReceiver<RouteRefinement>,
    refinement_task: Option<JoinHandle<()>>,
    distance: Option<DistanceEstimate>,
    manual_tier: DistanceTier,
    schedule: ScheduleSelection,
    search_notice: Option<SearchNotice>,
    validation_notice: Option<DomainError>,
    results_visible: bool,
    engagement: Option<EngagementTimer>,
    engagement_config: EngagementConfig,
    leads: Arc<dyn LeadSubmissionPort>,
    boundary: SectionBoundary,
}

impl std::fmt::Debug for EstimatorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimatorController")
            .field("pickup", &self.pickup)
            .field("dropoff", &self.dropoff)
            .field("distance", &self.distance)
            .field("manual_tier", &self.manual_tier)
            .field("schedule", &self.schedule)
            .field("results_visible", &self.results_visible)
            .field("engagement", &self.engagement)
            .finish_non_exhaustive()
    }
}

impl EstimatorController {
    /// Create an estimator with default schedule and no addresses
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Configuration` if `config` is invalid.
    pub fn new(
        geocoding: Arc<dyn GeocodingPort>,
        routing: Arc<dyn RoutingPort>,
        leads: Arc<dyn LeadSubmissionPort>,
        config: EstimatorConfig,
    ) -> Result<Self, ApplicationError> {
        config.validate().map_err(ApplicationError::Configuration)?;

        let search = GeoSearchService::new(geocoding, config.search);
        let (refinement_tx, refinement_rx) = mpsc::unbounded_channel();

        Ok(Self {
            pickup: AddressField::new(DebouncedSearch::new(search.clone())),
            dropoff: AddressField::new(DebouncedSearch::new(search)),
            resolver: DistanceResolver::new(routing, config.distance),
            refinement_tx,
            refinement_rx,
            refinement_task: None,
            distance: None,
            manual_tier: DistanceTier::default(),
            schedule: ScheduleSelection::default(),
            search_notice: None,
            validation_notice: None,
            results_visible: false,
            engagement: None,
            engagement_config: config.engagement,
            leads,
            boundary: SectionBoundary::new(ESTIMATOR_SECTION_LABEL),
        })
    }

    fn field(&self, role: AddressRole) -> &AddressField {
        match role {
            AddressRole::Pickup => &self.pickup,
            AddressRole::Dropoff => &self.dropoff,
        }
    }

    fn field_mut(&mut self, role: AddressRole) -> &mut AddressField {
        match role {
            AddressRole::Pickup => &mut self.pickup,
            AddressRole::Dropoff => &mut self.dropoff,
        }
    }

    // ------------------------------------------------------------------
    // Addresses
    // ------------------------------------------------------------------

    /// Address input for `role`
    #[must_use]
    pub fn address(&self, role: AddressRole) -> &AddressField {
        self.field(role)
    }

    /// The user typed into an address field
    ///
    /// Clears the confirmed location when the text no longer matches it and
    /// schedules a debounced search. Must be called from within a tokio
    /// runtime.
    #[instrument(skip(self))]
    pub fn edit_address(&mut self, role: AddressRole, text: &str) {
        self.search_notice = None;

        let field = self.field_mut(role);
        field.text = text.to_string();

        let still_selected = field.selected.as_ref().is_some_and(|p| p.matches_text(text));
        if still_selected {
            return;
        }

        let had_selection = field.selected.take().is_some();
        if field.search.submit(text).is_some() {
            field.candidates.clear();
        }

        if had_selection {
            debug!("Address edited away from selection");
            self.refresh_distance();
        }
    }

    /// The user picked suggestion `index` for `role`
    ///
    /// # Errors
    ///
    /// Returns a validation error if there is no such suggestion or its
    /// coordinates are invalid.
    pub fn select_candidate(
        &mut self,
        role: AddressRole,
        index: usize,
    ) -> Result<GeoPoint, ApplicationError> {
        let candidate = self
            .field(role)
            .candidates
            .get(index)
            .cloned()
            .ok_or_else(|| {
                DomainError::ValidationError(format!("no {role} suggestion at position {index}"))
            })?;
        Ok(self.select_location(role, candidate)?)
    }

    /// Confirm `candidate` as the location for `role`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCoordinates` for out-of-range coordinates.
    #[instrument(skip(self, candidate), fields(place = %candidate.display_name))]
    pub fn select_location(
        &mut self,
        role: AddressRole,
        candidate: LocationCandidate,
    ) -> Result<GeoPoint, DomainError> {
        let point = candidate.to_geo_point()?;

        let field = self.field_mut(role);
        field.search.cancel();
        field.candidates.clear();
        field.text = point.short_name();
        field.selected = Some(point.clone());

        self.refresh_distance();
        Ok(point)
    }

    /// Empty the address field for `role`
    pub fn clear_address(&mut self, role: AddressRole) {
        let field = self.field_mut(role);
        field.search.cancel();
        field.text.clear();
        field.candidates.clear();
        let had_selection = field.selected.take().is_some();

        if had_selection {
            self.refresh_distance();
        }
    }

    fn refresh_distance(&mut self) {
        let (Some(pickup), Some(dropoff)) = (&self.pickup.selected, &self.dropoff.selected) else {
            self.resolver.invalidate();
            if self.distance.take().is_some() {
                debug!("Distance cleared, manual tier active");
            }
            return;
        };

        let resolution = self.resolver.resolve(pickup, dropoff);
        self.distance = Some(resolution.immediate);

        let ticket = resolution.ticket;
        let refined = resolution.refined;
        let tx = self.refinement_tx.clone();
        self.refinement_task = Some(tokio::spawn(async move {
            let estimate = refined.await;
            if tx.send(RouteRefinement { ticket, estimate }).is_err() {
                debug!("Estimator dropped before route refinement arrived");
            }
        }));
    }

    /// Current distance estimate
    #[must_use]
    pub const fn distance(&self) -> Option<&DistanceEstimate> {
        self.distance.as_ref()
    }

    // ------------------------------------------------------------------
    // Tier
    // ------------------------------------------------------------------

    /// Choose a tier by hand; only used while there is no distance
    ///
    /// Returns whether the manual tier is the active one.
    pub fn select_manual_tier(&mut self, tier: DistanceTier) -> bool {
        self.manual_tier = tier;
        self.distance.is_none()
    }

    /// Tier used for pricing
    #[must_use]
    pub fn active_tier(&self) -> DistanceTier {
        self.distance
            .as_ref()
            .map_or(self.manual_tier, DistanceEstimate::tier)
    }

    /// Whether the manual tier selector is in effect
    #[must_use]
    pub const fn is_manual_tier_active(&self) -> bool {
        self.distance.is_none()
    }

    // ------------------------------------------------------------------
    // Schedule
    // ------------------------------------------------------------------

    /// Current schedule
    #[must_use]
    pub const fn schedule(&self) -> &ScheduleSelection {
        &self.schedule
    }

    /// Add or remove a travel day
    pub fn toggle_day(&mut self, day: Weekday) {
        self.schedule.toggle_day(day);
        if self.schedule.days_selected() > 0 {
            self.validation_notice = None;
        }
    }

    /// One-way or return
    pub fn set_trips_per_day(&mut self, trips: TripsPerDay) {
        self.schedule.set_trips_per_day(trips);
    }

    /// One more passenger, up to the maximum
    pub fn increment_passengers(&mut self) -> u8 {
        let count = self.schedule.passengers().increment();
        self.schedule.set_passengers(count);
        count.get()
    }

    /// One passenger fewer, down to the minimum
    pub fn decrement_passengers(&mut self) -> u8 {
        let count = self.schedule.passengers().decrement();
        self.schedule.set_passengers(count);
        count.get()
    }

    /// Staff or scholar
    pub fn set_rider_category(&mut self, category: RiderCategory) {
        self.schedule.set_rider_category(category);
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// Price the current inputs and show the results
    ///
    /// Starts (or restarts) the engagement timer. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` when no travel day is selected;
    /// the error is also kept as the validation notice.
    #[instrument(skip(self))]
    pub fn calculate(&mut self) -> Result<EstimateSummary, DomainError> {
        if let Err(e) = self.schedule.ensure_priceable() {
            warn!(error = %e, "Calculation blocked");
            self.validation_notice = Some(e.clone());
            return Err(e);
        }
        self.validation_notice = None;

        let summary = self.summary()?;
        self.results_visible = true;
        self.boundary.reset();
        self.engagement = Some(EngagementTimer::start(self.engagement_config.clone()));

        info!(
            tier = %summary.tier,
            own_service = summary.quote.own_service,
            competitor_a = summary.quote.competitor_a,
            approximate = summary.distance.as_ref().is_some_and(|d| d.is_approximate),
            "Estimate calculated"
        );
        Ok(summary)
    }

    /// Hide the results and tear down the engagement timer
    pub fn hide_results(&mut self) {
        self.results_visible = false;
        if let Some(mut timer) = self.engagement.take() {
            timer.stop();
        }
    }

    /// Whether the results section is showing
    #[must_use]
    pub const fn results_visible(&self) -> bool {
        self.results_visible
    }

    /// Price the current inputs without changing visibility
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` when no travel day is selected.
    pub fn summary(&self) -> Result<EstimateSummary, DomainError> {
        EstimateSummary::compute(self.active_tier(), self.distance.clone(), &self.schedule)
    }

    /// Results section rendered through its error boundary
    ///
    /// `None` while results are hidden.
    pub fn estimator_section(&mut self) -> Option<SectionView<EstimateSummary>> {
        if !self.results_visible {
            return None;
        }
        let tier = self.active_tier();
        let distance = self.distance.clone();
        let schedule = self.schedule.clone();
        Some(self.boundary.render(move || {
            Ok(EstimateSummary::compute(tier, distance, &schedule)?)
        }))
    }

    // ------------------------------------------------------------------
    // Engagement and conversion
    // ------------------------------------------------------------------

    /// Current engagement state; `None` while results are hidden
    #[must_use]
    pub fn engagement_state(&self) -> Option<EngagementState> {
        self.engagement.as_ref().map(EngagementTimer::state)
    }

    /// Call-to-action block; `None` while results are hidden
    #[must_use]
    pub fn call_to_action(&self) -> Option<CallToAction> {
        self.engagement.as_ref().map(EngagementTimer::call_to_action)
    }

    /// Any qualifying interaction with the results view
    ///
    /// Returns `true` if the engagement state changed.
    pub fn record_interaction(&mut self) -> bool {
        self.engagement
            .as_mut()
            .is_some_and(EngagementTimer::record_interaction)
    }

    /// Leave the budget picker for the standard call-to-action
    pub fn back_to_standard_pricing(&mut self) -> bool {
        self.engagement
            .as_mut()
            .is_some_and(EngagementTimer::back_to_standard_pricing)
    }

    /// Move the budget picker; returns the stored (snapped) value
    pub fn set_budget(&mut self, value: u32) -> Option<u32> {
        self.engagement.as_mut().map(|timer| timer.set_budget(value))
    }

    /// The user converted; hand the lead to the waitlist backend
    ///
    /// Submission is fire-and-forget: failures are logged, never surfaced.
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self))]
    pub fn convert(&self) -> LeadSubmission {
        let category = self.schedule.rider_category();
        let lead = match &self.engagement {
            Some(timer) if timer.state().is_negotiating() => {
                LeadSubmission::from_budget(timer.budget(), category)
            },
            _ => LeadSubmission::from_cta(category),
        };
        info!(source = %lead.source, budget = ?lead.budget, "Lead converted");

        let port = Arc::clone(&self.leads);
        let payload = lead.clone();
        tokio::spawn(async move {
            if let Err(e) = port.submit(&payload).await {
                warn!(error = %e, source = %payload.source, "Lead submission failed");
            }
        });
        lead
    }

    /// Source tag the next conversion would carry
    #[must_use]
    pub fn conversion_source(&self) -> LeadSource {
        match self.engagement_state() {
            Some(EngagementState::Negotiating) => LeadSource::BudgetSlider,
            _ => LeadSource::EstimatorCta,
        }
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    /// Search availability notice
    #[must_use]
    pub const fn search_notice(&self) -> Option<SearchNotice> {
        self.search_notice
    }

    /// Hide the search notice
    pub fn dismiss_search_notice(&mut self) {
        self.search_notice = None;
    }

    /// Inline validation message blocking calculation
    #[must_use]
    pub const fn validation_notice(&self) -> Option<&DomainError> {
        self.validation_notice.as_ref()
    }

    // ------------------------------------------------------------------
    // Map
    // ------------------------------------------------------------------

    /// Markers and route for the map widget
    #[must_use]
    pub fn map_view(&self) -> MapView {
        MapView {
            pickup: self.pickup.selected.clone(),
            dropoff: self.dropoff.selected.clone(),
            route_shape: self
                .distance
                .as_ref()
                .and_then(|d| d.route_shape.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Asynchronous completions
    // ------------------------------------------------------------------

    /// Wait for the next relevant asynchronous completion and apply it
    ///
    /// Stale completions are dropped without returning. Cancel safe: if the
    /// returned future is dropped, nothing is lost.
    pub async fn pump(&mut self) -> Option<EstimatorUpdate> {
        loop {
            let completion = {
                let pickup = &mut self.pickup.search;
                let dropoff = &mut self.dropoff.search;
                let refinements = &mut self.refinement_rx;
                let engagement = self.engagement.as_mut();

                tokio::select! {
                    Some(outcome) = pickup.next_response() => {
                        Completion::Search(AddressRole::Pickup, outcome)
                    },
                    Some(outcome) = dropoff.next_response() => {
                        Completion::Search(AddressRole::Dropoff, outcome)
                    },
                    Some(refinement) = refinements.recv() => Completion::Route(refinement),
                    Some(tick) = next_engagement_tick(engagement) => Completion::Tick(tick),
                    else => return None,
                }
            };

            if let Some(update) = self.apply(completion) {
                return Some(update);
            }
        }
    }

    fn apply(&mut self, completion: Completion) -> Option<EstimatorUpdate> {
        match completion {
            Completion::Search(role, outcome) => self.apply_search(role, outcome),
            Completion::Route(refinement) => self.apply_route(refinement),
            Completion::Tick(tick) => {
                let state = self.engagement.as_mut()?.apply(tick)?;
                Some(EstimatorUpdate::Engagement { state })
            },
        }
    }

    fn apply_search(&mut self, role: AddressRole, outcome: SearchOutcome) -> Option<EstimatorUpdate> {
        let field = self.field_mut(role);
        if field.selected.is_some() {
            debug!(%role, "Ignoring search response for confirmed address");
            return None;
        }

        field.candidates = outcome.candidates;
        match outcome.status {
            SearchStatus::Matched => Some(EstimatorUpdate::Candidates {
                role,
                count: field.candidates.len(),
            }),
            SearchStatus::NoMatches => Some(EstimatorUpdate::NoMatches { role }),
            SearchStatus::Degraded => {
                self.search_notice = Some(SearchNotice::Degraded);
                Some(EstimatorUpdate::SearchDegraded { role })
            },
            SearchStatus::Skipped => None,
        }
    }

    fn apply_route(&mut self, refinement: RouteRefinement) -> Option<EstimatorUpdate> {
        if !self.resolver.is_current(refinement.ticket) {
            debug!("Dropping route refinement for superseded pair");
            return None;
        }
        let estimate = refinement.estimate?;
        let kilometers = estimate.kilometers;
        debug!(kilometers, "Routed distance applied");
        self.distance = Some(estimate);
        Some(EstimatorUpdate::DistanceRefined { kilometers })
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel every pending timer and in-flight refinement
    pub fn shutdown(&mut self) {
        self.pickup.search.cancel();
        self.dropoff.search.cancel();
        self.resolver.invalidate();
        if let Some(task) = self.refinement_task.take() {
            task.abort();
        }
        self.hide_results();
    }
}

impl Drop for EstimatorController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn next_engagement_tick(timer: Option<&mut EngagementTimer>) -> Option<EngagementTick> {
    match timer {
        Some(timer) => timer.next_tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::ports::{MockLeadSubmissionPort, MockRoutingPort, RegionBias, RouteSummary};

    const PROTEA_GLEN: &str = "Protea Glen, Soweto, Johannesburg, Gauteng, South Africa";
    const SANDTON: &str = "Sandton, Johannesburg, City of Johannesburg, Gauteng, South Africa";

    /// Answers immediately from a fixed gazetteer
    struct Gazetteer(HashMap<&'static str, LocationCandidate>);

    impl Gazetteer {
        fn johannesburg() -> Self {
            let mut places = HashMap::new();
            places.insert(
                "Protea Glen",
                LocationCandidate::new(PROTEA_GLEN, -26.2309, 27.8953),
            );
            places.insert("Sandton", LocationCandidate::new(SANDTON, -26.1076, 28.0567));
            places.insert("Slow A", LocationCandidate::new("A", -26.0, 28.1));
            places.insert("Slow B", LocationCandidate::new("B", -26.1, 28.0));
            Self(places)
        }
    }

    #[async_trait]
    impl GeocodingPort for Gazetteer {
        async fn search(
            &self,
            query: &str,
            _bias: &RegionBias,
            _limit: u8,
        ) -> Result<Vec<LocationCandidate>, ApplicationError> {
            Ok(self.0.get(query).cloned().into_iter().collect())
        }
    }

    struct BrokenGeocoder;

    #[async_trait]
    impl GeocodingPort for BrokenGeocoder {
        async fn search(
            &self,
            _query: &str,
            _bias: &RegionBias,
            _limit: u8,
        ) -> Result<Vec<LocationCandidate>, ApplicationError> {
            Err(ApplicationError::ExternalService("HTTP 503".to_string()))
        }
    }

    /// Routes to "A" slowly and to "B" quickly
    struct DelayedRouter;

    #[async_trait]
    impl RoutingPort for DelayedRouter {
        async fn route(
            &self,
            _origin: &GeoPoint,
            destination: &GeoPoint,
        ) -> Result<RouteSummary, ApplicationError> {
            let (delay, meters) = match destination.display_name() {
                "A" => (Duration::from_secs(5), 30_000.0),
                _ => (Duration::from_secs(1), 12_000.0),
            };
            tokio::time::sleep(delay).await;
            Ok(RouteSummary {
                distance_meters: meters,
                path: vec![[-26.2, 27.9], [destination.latitude(), destination.longitude()]],
            })
        }
    }

    /// Forwards every submitted lead to the test
    struct ChannelLeads(mpsc::UnboundedSender<LeadSubmission>);

    #[async_trait]
    impl LeadSubmissionPort for ChannelLeads {
        async fn submit(&self, lead: &LeadSubmission) -> Result<(), ApplicationError> {
            self.0
                .send(lead.clone())
                .map_err(|e| ApplicationError::Internal(e.to_string()))
        }
    }

    fn routing_13km() -> MockRoutingPort {
        let mut mock = MockRoutingPort::new();
        mock.expect_route().returning(|_, _| {
            Ok(RouteSummary {
                distance_meters: 13_000.0,
                path: vec![[-26.2309, 27.8953], [-26.17, 27.98], [-26.1076, 28.0567]],
            })
        });
        mock
    }

    fn unused_leads() -> Arc<dyn LeadSubmissionPort> {
        let mut mock = MockLeadSubmissionPort::new();
        mock.expect_submit().returning(|_| Ok(()));
        Arc::new(mock)
    }

    fn controller(
        geocoding: impl GeocodingPort + 'static,
        routing: impl RoutingPort + 'static,
    ) -> EstimatorController {
        EstimatorController::new(
            Arc::new(geocoding),
            Arc::new(routing),
            unused_leads(),
            EstimatorConfig::default(),
        )
        .unwrap()
    }

    async fn pump(controller: &mut EstimatorController) -> EstimatorUpdate {
        timeout(Duration::from_secs(120), controller.pump())
            .await
            .expect("no update within two minutes")
            .expect("pump closed")
    }

    async fn choose(controller: &mut EstimatorController, role: AddressRole, query: &str) {
        controller.edit_address(role, query);
        assert_eq!(pump(controller).await, EstimatorUpdate::Candidates { role, count: 1 });
        controller.select_candidate(role, 0).unwrap();
    }

    #[test]
    fn updates_serialize_with_kind_tag() {
        let json = serde_json::to_value(EstimatorUpdate::Candidates {
            role: AddressRole::Dropoff,
            count: 3,
        })
        .unwrap();
        assert_eq!(json["kind"], "candidates");
        assert_eq!(json["role"], "dropoff");

        let json = serde_json::to_value(EstimatorUpdate::Engagement {
            state: EngagementState::Negotiating,
        })
        .unwrap();
        assert_eq!(json["kind"], "engagement");
        assert_eq!(json["state"], "negotiating");
    }

    #[test]
    fn config_validation_is_enforced() {
        let mut config = EstimatorConfig::default();
        assert!(config.validate().is_ok());

        config.search.max_results = 0;
        let result = EstimatorController::new(
            Arc::new(BrokenGeocoder),
            Arc::new(MockRoutingPort::new()),
            unused_leads(),
            config,
        );
        assert!(matches!(result, Err(ApplicationError::Configuration(msg)) if msg.starts_with("search:")));
    }

    #[tokio::test(start_paused = true)]
    async fn typing_produces_candidates_after_debounce() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());

        estimator.edit_address(AddressRole::Pickup, "Prot");
        estimator.edit_address(AddressRole::Pickup, "Protea Glen");
        assert!(estimator.address(AddressRole::Pickup).candidates().is_empty());

        let started = tokio::time::Instant::now();
        let update = pump(&mut estimator).await;
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(
            update,
            EstimatorUpdate::Candidates {
                role: AddressRole::Pickup,
                count: 1
            }
        );
        assert_eq!(
            estimator.address(AddressRole::Pickup).candidates()[0].display_name,
            PROTEA_GLEN
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_clears_candidates_without_searching() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        estimator.edit_address(AddressRole::Dropoff, "Sandton");
        pump(&mut estimator).await;
        assert_eq!(estimator.address(AddressRole::Dropoff).candidates().len(), 1);

        estimator.edit_address(AddressRole::Dropoff, "Sa");
        assert!(estimator.address(AddressRole::Dropoff).candidates().is_empty());
        assert!(timeout(Duration::from_secs(5), estimator.pump()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_address_reports_no_matches() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        estimator.edit_address(AddressRole::Pickup, "Atlantis");
        assert_eq!(
            pump(&mut estimator).await,
            EstimatorUpdate::NoMatches {
                role: AddressRole::Pickup
            }
        );
        assert!(estimator.search_notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn search_outage_degrades_to_manual_tier() {
        let mut estimator = controller(BrokenGeocoder, MockRoutingPort::new());

        estimator.edit_address(AddressRole::Pickup, "Protea Glen");
        assert_eq!(
            pump(&mut estimator).await,
            EstimatorUpdate::SearchDegraded {
                role: AddressRole::Pickup
            }
        );
        assert_eq!(estimator.search_notice(), Some(SearchNotice::Degraded));
        assert_eq!(
            SearchNotice::Degraded.message(),
            "Location search is down right now. Use the distance selector below instead."
        );

        assert!(estimator.select_manual_tier(DistanceTier::Long));
        let summary = estimator.calculate().unwrap();
        assert_eq!(summary.tier, DistanceTier::Long);
        assert!(summary.distance.is_none());

        estimator.dismiss_search_notice();
        assert!(estimator.search_notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn editing_clears_search_notice() {
        let mut estimator = controller(BrokenGeocoder, MockRoutingPort::new());
        estimator.edit_address(AddressRole::Pickup, "Protea Glen");
        pump(&mut estimator).await;
        assert!(estimator.search_notice().is_some());

        estimator.edit_address(AddressRole::Pickup, "Protea Glen Ext");
        assert!(estimator.search_notice().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_weekday_commute() {
        let mut estimator = controller(Gazetteer::johannesburg(), routing_13km());

        choose(&mut estimator, AddressRole::Pickup, "Protea Glen").await;
        assert_eq!(
            estimator.address(AddressRole::Pickup).text(),
            "Protea Glen, Soweto, Johannesburg"
        );
        assert!(estimator.distance().is_none());

        choose(&mut estimator, AddressRole::Dropoff, "Sandton").await;
        let heuristic = estimator.distance().cloned().unwrap();
        assert!(heuristic.is_approximate);
        assert!(estimator.map_view().route_shape.is_none());

        assert_eq!(
            pump(&mut estimator).await,
            EstimatorUpdate::DistanceRefined { kilometers: 13.0 }
        );
        assert_eq!(estimator.active_tier(), DistanceTier::Medium);
        assert!(!estimator.is_manual_tier_active());

        let summary = estimator.calculate().unwrap();
        assert!((summary.quote.own_service - 3464.0).abs() < 1e-6);
        assert!((summary.quote.competitor_a - 10_132.2).abs() < 1e-6);
        assert_eq!(summary.own_service_label(), "R3 464");
        assert_eq!(summary.own_service_weekly_label(), "R800");
        assert_eq!(summary.competitor_a_label(), "~R10 132");
        assert_eq!(summary.competitor_a_weekly_label(), "~R2 340");
        assert_eq!(summary.competitor_b_label(), "~R8 815");
        assert_eq!(summary.competitor_b_weekly_label(), "~R2 036");
        assert!(summary.savings.savings_per_person > 0.0);

        let map = estimator.map_view();
        assert!(map.pickup.is_some() && map.dropoff.is_some());
        assert_eq!(map.route_shape.map(|s| s.len()), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn routing_failure_keeps_approximate_distance() {
        let mut routing = MockRoutingPort::new();
        routing
            .expect_route()
            .returning(|_, _| Err(ApplicationError::ExternalService("HTTP 502".to_string())));
        let mut estimator = controller(Gazetteer::johannesburg(), routing);

        choose(&mut estimator, AddressRole::Pickup, "Protea Glen").await;
        choose(&mut estimator, AddressRole::Dropoff, "Sandton").await;
        let heuristic = estimator.distance().cloned().unwrap();

        assert!(timeout(Duration::from_secs(30), estimator.pump()).await.is_err());
        let distance = estimator.distance().unwrap();
        assert_eq!(distance, &heuristic);
        assert!(distance.is_approximate);
        assert!(distance.display_kilometers().starts_with('~'));
        assert!(estimator.calculate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn latest_pair_wins_when_routes_answer_out_of_order() {
        let mut estimator = controller(Gazetteer::johannesburg(), DelayedRouter);

        choose(&mut estimator, AddressRole::Pickup, "Protea Glen").await;
        choose(&mut estimator, AddressRole::Dropoff, "Slow A").await;
        choose(&mut estimator, AddressRole::Dropoff, "Slow B").await;

        assert_eq!(
            pump(&mut estimator).await,
            EstimatorUpdate::DistanceRefined { kilometers: 12.0 }
        );
        assert!(timeout(Duration::from_secs(30), estimator.pump()).await.is_err());
        assert!((estimator.distance().unwrap().kilometers - 12.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_a_point_restores_manual_tier() {
        let mut estimator = controller(Gazetteer::johannesburg(), routing_13km());
        choose(&mut estimator, AddressRole::Pickup, "Protea Glen").await;
        choose(&mut estimator, AddressRole::Dropoff, "Sandton").await;
        pump(&mut estimator).await;
        assert!(!estimator.select_manual_tier(DistanceTier::Long));
        assert_eq!(estimator.active_tier(), DistanceTier::Medium);

        estimator.clear_address(AddressRole::Dropoff);
        assert!(estimator.distance().is_none());
        assert!(estimator.is_manual_tier_active());
        assert_eq!(estimator.active_tier(), DistanceTier::Long);
        assert!(estimator.map_view().dropoff.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn editing_away_from_selection_clears_it() {
        let mut estimator = controller(Gazetteer::johannesburg(), routing_13km());
        choose(&mut estimator, AddressRole::Pickup, "Protea Glen").await;
        choose(&mut estimator, AddressRole::Dropoff, "Sandton").await;

        let text = estimator.address(AddressRole::Pickup).text().to_string();
        estimator.edit_address(AddressRole::Pickup, &text);
        assert!(estimator.address(AddressRole::Pickup).selected().is_some());

        estimator.edit_address(AddressRole::Pickup, "Protea Gle");
        assert!(estimator.address(AddressRole::Pickup).selected().is_none());
        assert!(estimator.distance().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_missing_candidate_fails() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        let result = estimator.select_candidate(AddressRole::Pickup, 0);
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::ValidationError(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn calculate_without_days_shows_validation_notice() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            estimator.toggle_day(day);
        }

        assert_eq!(estimator.calculate(), Err(DomainError::NoDaysSelected));
        assert_eq!(
            estimator.validation_notice(),
            Some(&DomainError::NoDaysSelected)
        );
        assert!(!estimator.results_visible());
        assert!(estimator.call_to_action().is_none());

        estimator.toggle_day(Weekday::Sat);
        assert!(estimator.validation_notice().is_none());
        assert!(estimator.calculate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn passenger_count_stays_in_range() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        assert_eq!(estimator.decrement_passengers(), 1);
        for _ in 0..6 {
            estimator.increment_passengers();
        }
        assert_eq!(estimator.schedule().passengers().get(), 4);

        let group = estimator.calculate().unwrap();
        estimator.set_trips_per_day(TripsPerDay::OneWay);
        let one_way = estimator.summary().unwrap();
        assert!((group.quote.own_service - 2.0 * one_way.quote.own_service).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn section_falls_back_until_recalculated() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        assert!(estimator.estimator_section().is_none());

        estimator.calculate().unwrap();
        let view = estimator.estimator_section().unwrap();
        assert_eq!(view.rendered().map(|s| s.tier), Some(DistanceTier::Short));

        estimator.toggle_day(Weekday::Mon);
        estimator.toggle_day(Weekday::Tue);
        estimator.toggle_day(Weekday::Wed);
        estimator.toggle_day(Weekday::Thu);
        estimator.toggle_day(Weekday::Fri);
        match estimator.estimator_section().unwrap() {
            SectionView::Fallback { label, message } => {
                assert_eq!(label, ESTIMATOR_SECTION_LABEL);
                assert_eq!(message, "Select at least one travel day");
            },
            SectionView::Rendered(_) => panic!("expected fallback"),
        }

        estimator.toggle_day(Weekday::Mon);
        assert!(estimator.estimator_section().unwrap().is_fallback());

        estimator.calculate().unwrap();
        assert!(!estimator.estimator_section().unwrap().is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_results_escalate_to_budget_picker() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        estimator.calculate().unwrap();
        assert_eq!(estimator.engagement_state(), Some(EngagementState::Calm));

        for expected in [
            EngagementState::Nudging,
            EngagementState::Reassuring,
            EngagementState::Negotiating,
        ] {
            assert_eq!(
                pump(&mut estimator).await,
                EstimatorUpdate::Engagement { state: expected }
            );
        }
        assert!(matches!(
            estimator.call_to_action(),
            Some(CallToAction::BudgetPicker { budget: 800, min: 200, max: 2500, step: 50 })
        ));
        assert_eq!(estimator.conversion_source(), LeadSource::BudgetSlider);

        assert!(estimator.back_to_standard_pricing());
        assert_eq!(estimator.engagement_state(), Some(EngagementState::Calm));
    }

    #[tokio::test(start_paused = true)]
    async fn interaction_postpones_escalation() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        estimator.calculate().unwrap();

        assert!(timeout(Duration::from_secs(15), estimator.pump()).await.is_err());
        assert!(!estimator.record_interaction());

        let started = tokio::time::Instant::now();
        pump(&mut estimator).await;
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn hiding_results_stops_engagement() {
        let mut estimator = controller(Gazetteer::johannesburg(), MockRoutingPort::new());
        estimator.calculate().unwrap();
        estimator.hide_results();

        assert!(estimator.call_to_action().is_none());
        assert!(estimator.set_budget(1000).is_none());
        assert!(!estimator.record_interaction());
        assert!(timeout(Duration::from_secs(60), estimator.pump()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn convert_submits_cta_lead() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut estimator = EstimatorController::new(
            Arc::new(Gazetteer::johannesburg()),
            Arc::new(MockRoutingPort::new()),
            Arc::new(ChannelLeads(tx)),
            EstimatorConfig::default(),
        )
        .unwrap();
        estimator.set_rider_category(RiderCategory::Scholar);
        estimator.calculate().unwrap();

        let lead = estimator.convert();
        assert_eq!(lead.source, LeadSource::EstimatorCta);
        assert_eq!(lead.budget, None);

        let submitted = rx.recv().await.unwrap();
        assert_eq!(submitted, lead);
        assert_eq!(submitted.rider_category, RiderCategory::Scholar);
    }

    #[tokio::test(start_paused = true)]
    async fn convert_while_negotiating_carries_budget() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut estimator = EstimatorController::new(
            Arc::new(Gazetteer::johannesburg()),
            Arc::new(MockRoutingPort::new()),
            Arc::new(ChannelLeads(tx)),
            EstimatorConfig::default(),
        )
        .unwrap();
        estimator.calculate().unwrap();
        for _ in 0..3 {
            pump(&mut estimator).await;
        }
        assert_eq!(estimator.set_budget(1234), Some(1250));

        let lead = estimator.convert();
        assert_eq!(lead.source, LeadSource::BudgetSlider);
        assert_eq!(lead.budget, Some(1250));
        assert_eq!(rx.recv().await.unwrap().budget, Some(1250));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_is_not_surfaced() {
        let mut leads = MockLeadSubmissionPort::new();
        leads
            .expect_submit()
            .returning(|_| Err(ApplicationError::ExternalService("HTTP 500".to_string())));
        let mut estimator = EstimatorController::new(
            Arc::new(Gazetteer::johannesburg()),
            Arc::new(MockRoutingPort::new()),
            Arc::new(leads),
            EstimatorConfig::default(),
        )
        .unwrap();
        estimator.calculate().unwrap();

        let lead = estimator.convert();
        tokio::task::yield_now().await;
        assert_eq!(lead.source, LeadSource::EstimatorCta);
        assert!(estimator.results_visible());
    }
}
