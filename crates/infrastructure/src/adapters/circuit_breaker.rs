//! Circuit breaker for external service calls
//!
//! # States
//!
//! - **Closed**: calls pass through
//! - **Open**: calls fail fast without reaching the service
//! - **Half-Open**: a trial call decides whether to close again
//!
//! While Nominatim is down, an open circuit turns each keystroke's search
//! into an immediate degraded answer instead of a multi-second timeout.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Thresholds for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close it again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds the circuit stays open before allowing a trial call
    #[serde(default = "default_half_open_timeout_secs")]
    pub half_open_timeout_secs: u64,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_success_threshold() -> u32 {
    1
}

const fn default_half_open_timeout_secs() -> u64 {
    30
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            half_open_timeout_secs: default_half_open_timeout_secs(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if either threshold is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 || self.success_threshold == 0 {
            return Err("circuit breaker thresholds must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast
    Open,
    /// Probing for recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Error from a call made through a circuit breaker
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the service was not called
    CircuitOpen(String),
    /// The service call itself failed
    Service(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen(name) => write!(f, "Circuit breaker open for service '{name}'"),
            Self::Service(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen(_) => None,
            Self::Service(e) => Some(e),
        }
    }
}

#[derive(Debug)]
struct Counters {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Wraps calls to one external service
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    counters: RwLock<Counters>,
}

impl CircuitBreaker {
    /// Create a breaker with default thresholds
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom thresholds
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            counters: RwLock::new(Counters {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Service name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, moving from Open to Half-Open once the timeout elapsed
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut counters = self.counters.write();
        let cooled_down = counters.opened_at.is_some_and(|at| {
            at.elapsed() >= Duration::from_secs(self.config.half_open_timeout_secs)
        });
        if counters.state == CircuitState::Open && cooled_down {
            debug!(service = %self.name, "Circuit half-open");
            counters.state = CircuitState::HalfOpen;
            counters.successes = 0;
        }
        counters.state
    }

    /// Whether calls are currently rejected
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    fn record_success(&self) {
        let mut counters = self.counters.write();
        counters.failures = 0;
        if counters.state == CircuitState::HalfOpen {
            counters.successes += 1;
            if counters.successes >= self.config.success_threshold {
                info!(service = %self.name, "Circuit closed");
                counters.state = CircuitState::Closed;
                counters.successes = 0;
                counters.opened_at = None;
            }
        }
    }

    fn record_failure(&self) {
        let mut counters = self.counters.write();
        counters.failures += 1;
        counters.successes = 0;
        let trip = match counters.state {
            CircuitState::Closed => counters.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            warn!(service = %self.name, failures = counters.failures, "Circuit opened");
            counters.state = CircuitState::Open;
            counters.opened_at = Some(Instant::now());
            counters.failures = 0;
        }
    }

    /// Run `f` unless the circuit is open, recording its outcome
    ///
    /// # Errors
    ///
    /// Returns `CircuitOpen` without calling `f` while open, otherwise the
    /// error of `f` wrapped in `Service`.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_open() {
            debug!(service = %self.name, "Rejected by open circuit");
            return Err(CircuitBreakerError::CircuitOpen(self.name.clone()));
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            },
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::Service(e))
            },
        }
    }
}
