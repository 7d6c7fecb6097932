//! Idle escalation for the results view
//!
//! While results are visible the timer walks `Calm → Nudging → Reassuring →
//! Negotiating`, one armed delay per step. Any qualifying interaction returns
//! to `Calm` and restarts the first delay.
//!
//! Ticks are delivered over a channel and applied by the owner. Each tick
//! carries the epoch and the state it was armed for, so a tick that was
//! already queued when the user interacted is ignored.

use std::time::Duration;

use domain::{BudgetRange, CallToAction, EngagementState};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::services::scheduling::CancelableTimer;

/// Escalation timings and budget picker bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Idle time in `Calm` before nudging, in seconds
    #[serde(default = "default_nudge_after_secs")]
    pub nudge_after_secs: u64,

    /// Further idle time in `Nudging` before reassuring, in seconds
    #[serde(default = "default_reassure_after_secs")]
    pub reassure_after_secs: u64,

    /// Further idle time in `Reassuring` before negotiating, in seconds
    #[serde(default = "default_negotiate_after_secs")]
    pub negotiate_after_secs: u64,

    /// Budget picker bounds
    #[serde(default)]
    pub budget: BudgetRange,
}

const fn default_nudge_after_secs() -> u64 {
    20
}

const fn default_reassure_after_secs() -> u64 {
    5
}

const fn default_negotiate_after_secs() -> u64 {
    8
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            nudge_after_secs: default_nudge_after_secs(),
            reassure_after_secs: default_reassure_after_secs(),
            negotiate_after_secs: default_negotiate_after_secs(),
            budget: BudgetRange::default(),
        }
    }
}

impl EngagementConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a delay is zero or the budget range is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.nudge_after_secs == 0
            || self.reassure_after_secs == 0
            || self.negotiate_after_secs == 0
        {
            return Err("escalation delays must be greater than 0".to_string());
        }
        self.budget.validate().map_err(|e| e.to_string())
    }

    /// Delay armed while in `state`, `None` once escalation is exhausted
    #[must_use]
    pub const fn delay_from(&self, state: EngagementState) -> Option<Duration> {
        let secs = match state {
            EngagementState::Calm => self.nudge_after_secs,
            EngagementState::Nudging => self.reassure_after_secs,
            EngagementState::Reassuring => self.negotiate_after_secs,
            EngagementState::Negotiating => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

/// One elapsed escalation delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementTick {
    epoch: u64,
    from: EngagementState,
}

/// Escalation state machine for one results view
///
/// Created when results become visible; dropping it cancels the armed delay.
#[derive(Debug)]
pub struct EngagementTimer {
    config: EngagementConfig,
    state: EngagementState,
    budget: u32,
    epoch: u64,
    timer: CancelableTimer,
    tx: mpsc::UnboundedSender<EngagementTick>,
    rx: mpsc::UnboundedReceiver<EngagementTick>,
}

impl EngagementTimer {
    /// Start in `Calm` with the first delay armed
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: EngagementConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let budget = config.budget.snap(config.budget.initial);
        let mut timer = Self {
            config,
            state: EngagementState::Calm,
            budget,
            epoch: 0,
            timer: CancelableTimer::new(),
            tx,
            rx,
        };
        timer.arm();
        timer
    }

    fn arm(&mut self) {
        let Some(delay) = self.config.delay_from(self.state) else {
            self.timer.cancel();
            return;
        };

        let tick = EngagementTick {
            epoch: self.epoch,
            from: self.state,
        };
        let tx = self.tx.clone();
        self.timer.schedule(delay, async move {
            if tx.send(tick).is_err() {
                debug!("Engagement timer dropped before tick");
            }
        });
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EngagementState {
        self.state
    }

    /// Current budget picker value
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    /// Budget picker bounds
    #[must_use]
    pub const fn budget_range(&self) -> BudgetRange {
        self.config.budget
    }

    /// What the call-to-action block shows in the current state
    #[must_use]
    pub fn call_to_action(&self) -> CallToAction {
        CallToAction::for_state(self.state)
            .unwrap_or_else(|| CallToAction::budget_picker(self.budget, self.config.budget))
    }

    /// Whether an escalation delay is armed
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Return to `Calm` and restart the first delay
    ///
    /// Returns `true` if the state changed.
    pub fn record_interaction(&mut self) -> bool {
        let changed = self.state != EngagementState::Calm;
        self.state = EngagementState::Calm;
        self.epoch += 1;
        self.arm();
        if changed {
            debug!("Engagement reset to calm");
        }
        changed
    }

    /// Leave the budget picker for the standard call-to-action
    pub fn back_to_standard_pricing(&mut self) -> bool {
        self.record_interaction()
    }

    /// Move the budget picker, clamped and snapped to the configured step
    ///
    /// Returns the value actually stored.
    pub fn set_budget(&mut self, value: u32) -> u32 {
        self.budget = self.config.budget.snap(value);
        self.budget
    }

    /// Wait for the next elapsed delay (possibly stale). Cancel safe.
    pub async fn next_tick(&mut self) -> Option<EngagementTick> {
        self.rx.recv().await
    }

    /// Apply a tick, returning the new state if it escalated
    pub fn apply(&mut self, tick: EngagementTick) -> Option<EngagementState> {
        if tick.epoch != self.epoch || tick.from != self.state {
            debug!(
                tick_epoch = tick.epoch,
                epoch = self.epoch,
                from = %tick.from,
                state = %self.state,
                "Ignoring stale engagement tick"
            );
            return None;
        }

        let next = self.state.next()?;
        self.state = next;
        info!(state = %next, "Engagement escalated");
        self.arm();
        Some(next)
    }

    /// Wait for and apply the next escalation
    pub async fn next_transition(&mut self) -> Option<EngagementState> {
        loop {
            let tick = self.next_tick().await?;
            if let Some(state) = self.apply(tick) {
                return Some(state);
            }
        }
    }

    /// Cancel the armed delay and ignore queued ticks
    pub fn stop(&mut self) {
        self.timer.cancel();
        self.epoch += 1;
    }
}
