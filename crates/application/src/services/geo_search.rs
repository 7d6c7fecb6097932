//! Address search with debouncing and stale-response suppression
//!
//! [`GeoSearchService`] performs one bounded lookup and folds every failure
//! mode into a [`SearchOutcome`]. [`DebouncedSearch`] is the per-field front
//! end: it waits for a quiet period before searching and only reports the
//! response belonging to the latest keystroke.

use std::sync::Arc;
use std::time::Duration;

use domain::LocationCandidate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::ports::{GeocodingPort, RegionBias};
use crate::services::scheduling::{CancelableTimer, Sequencer, Ticket};

/// Configuration for address search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoSearchConfig {
    /// Shortest trimmed input that triggers a lookup
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// Quiet period after the last keystroke before searching, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound for one lookup, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of candidates shown
    #[serde(default = "default_max_results")]
    pub max_results: u8,

    /// Region appended to every query
    #[serde(default = "default_region_hint")]
    pub region_hint: String,

    /// Country codes results are restricted to
    #[serde(default = "default_country_codes")]
    pub country_codes: String,
}

const fn default_min_query_chars() -> usize {
    3
}

const fn default_debounce_ms() -> u64 {
    300
}

const fn default_timeout_secs() -> u64 {
    8
}

const fn default_max_results() -> u8 {
    5
}

fn default_region_hint() -> String {
    RegionBias::default().hint
}

fn default_country_codes() -> String {
    RegionBias::default().country_codes
}

impl Default for GeoSearchConfig {
    fn default() -> Self {
        Self {
            min_query_chars: default_min_query_chars(),
            debounce_ms: default_debounce_ms(),
            timeout_secs: default_timeout_secs(),
            max_results: default_max_results(),
            region_hint: default_region_hint(),
            country_codes: default_country_codes(),
        }
    }
}

impl GeoSearchConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_query_chars == 0 {
            return Err("min_query_chars must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if self.max_results == 0 {
            return Err("max_results must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Bias passed to the geocoding port
    #[must_use]
    pub fn region_bias(&self) -> RegionBias {
        RegionBias {
            hint: self.region_hint.clone(),
            country_codes: self.country_codes.clone(),
        }
    }

    /// Debounce quiet period
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Lookup timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// At least one candidate was found
    Matched,
    /// The service answered without candidates
    NoMatches,
    /// Input too short, no request was made
    Skipped,
    /// The service failed, answered with an error status, or timed out
    Degraded,
}

/// Candidates plus the way the search ended
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Trimmed query text
    pub query: String,
    /// Candidates, best match first
    pub candidates: Vec<LocationCandidate>,
    /// How the search ended
    pub status: SearchStatus,
}

impl SearchOutcome {
    fn with_status(query: &str, status: SearchStatus) -> Self {
        Self {
            query: query.to_string(),
            candidates: Vec::new(),
            status,
        }
    }

    /// Whether the search service should be reported as unavailable
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.status == SearchStatus::Degraded
    }
}

/// Bounded address lookup against the geocoding port
#[derive(Clone)]
pub struct GeoSearchService {
    port: Arc<dyn GeocodingPort>,
    config: GeoSearchConfig,
    bias: RegionBias,
}

impl std::fmt::Debug for GeoSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoSearchService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GeoSearchService {
    /// Create a new search service
    #[must_use]
    pub fn new(port: Arc<dyn GeocodingPort>, config: GeoSearchConfig) -> Self {
        let bias = config.region_bias();
        Self { port, config, bias }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &GeoSearchConfig {
        &self.config
    }

    /// Whether `text` is long enough to be worth a request
    #[must_use]
    pub fn should_search(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.config.min_query_chars
    }

    /// Look up candidates for `text`
    ///
    /// Never fails: errors and timeouts are reported as
    /// [`SearchStatus::Degraded`], short input as [`SearchStatus::Skipped`].
    #[instrument(skip(self))]
    pub async fn search(&self, text: &str) -> SearchOutcome {
        let query = text.trim();
        if !self.should_search(query) {
            return SearchOutcome::with_status(query, SearchStatus::Skipped);
        }

        let limit = self.config.max_results;
        let lookup = self.port.search(query, &self.bias, limit);

        match timeout(self.config.timeout(), lookup).await {
            Ok(Ok(mut candidates)) => {
                candidates.truncate(usize::from(limit));
                let status = if candidates.is_empty() {
                    SearchStatus::NoMatches
                } else {
                    SearchStatus::Matched
                };
                debug!(count = candidates.len(), ?status, "Address search completed");
                SearchOutcome {
                    query: query.to_string(),
                    candidates,
                    status,
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Address search failed");
                SearchOutcome::with_status(query, SearchStatus::Degraded)
            },
            Err(_) => {
                warn!(
                    timeout_secs = self.config.timeout_secs,
                    "Address search timed out"
                );
                SearchOutcome::with_status(query, SearchStatus::Degraded)
            },
        }
    }
}

#[derive(Debug)]
struct SearchResponse {
    ticket: Ticket,
    outcome: SearchOutcome,
}

/// Debounced search for one address field
///
/// Each [`submit`](Self::submit) supersedes the previous one. The quiet
/// period and the lookup share one timer task, so a later keystroke aborts a
/// lookup still in flight and it never holds up the newer query. Responses
/// that slip through are dropped by [`next_response`](Self::next_response).
#[derive(Debug)]
pub struct DebouncedSearch {
    service: GeoSearchService,
    sequencer: Sequencer,
    timer: CancelableTimer,
    tx: mpsc::UnboundedSender<SearchResponse>,
    rx: mpsc::UnboundedReceiver<SearchResponse>,
}

impl DebouncedSearch {
    /// Create a debounced front end for `service`
    #[must_use]
    pub fn new(service: GeoSearchService) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            sequencer: Sequencer::new(),
            timer: CancelableTimer::new(),
            tx,
            rx,
        }
    }

    /// Register a keystroke
    ///
    /// Returns a [`SearchStatus::Skipped`] outcome immediately when the input
    /// is too short; otherwise schedules a lookup and returns `None`.
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, text: &str) -> Option<SearchOutcome> {
        let ticket = self.sequencer.next();

        if !self.service.should_search(text) {
            self.timer.cancel();
            return Some(SearchOutcome::with_status(
                text.trim(),
                SearchStatus::Skipped,
            ));
        }

        let service = self.service.clone();
        let tx = self.tx.clone();
        let query = text.to_string();
        self.timer.schedule(self.service.config().debounce(), async move {
            let outcome = service.search(&query).await;
            if tx.send(SearchResponse { ticket, outcome }).is_err() {
                debug!("Search field dropped before response arrived");
            }
        });
        None
    }

    /// Wait for the response to the latest submission
    ///
    /// Responses to superseded submissions are discarded. Cancel safe.
    pub async fn next_response(&mut self) -> Option<SearchOutcome> {
        loop {
            let response = self.rx.recv().await?;
            if self.sequencer.is_current(response.ticket) {
                return Some(response.outcome);
            }
            debug!(query = %response.outcome.query, "Dropping stale search response");
        }
    }

    /// Abort the pending or in-flight lookup
    pub fn cancel(&mut self) {
        self.sequencer.invalidate();
        self.timer.cancel();
    }

    /// Whether a lookup is waiting for its quiet period or its answer
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }
}
