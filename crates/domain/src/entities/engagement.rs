//! Engagement escalation states and their visible effect

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::BudgetRange;

/// Attention phase of the results view
///
/// Escalates only in order `Calm → Nudging → Reassuring → Negotiating`;
/// any interaction returns to `Calm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementState {
    /// Standard call-to-action
    #[default]
    Calm,
    /// Call-to-action wiggles with a swapped label
    Nudging,
    /// Reassurance line added under the call-to-action
    Reassuring,
    /// Budget picker replaces the call-to-action
    Negotiating,
}

impl EngagementState {
    /// The state this one escalates to, if any
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Calm => Some(Self::Nudging),
            Self::Nudging => Some(Self::Reassuring),
            Self::Reassuring => Some(Self::Negotiating),
            Self::Negotiating => None,
        }
    }

    /// Whether the budget picker is showing
    #[must_use]
    pub const fn is_negotiating(&self) -> bool {
        matches!(self, Self::Negotiating)
    }
}

impl fmt::Display for EngagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Calm => "calm",
            Self::Nudging => "nudging",
            Self::Reassuring => "reassuring",
            Self::Negotiating => "negotiating",
        };
        write!(f, "{name}")
    }
}

/// Label of the standard call-to-action
pub const STANDARD_CTA_LABEL: &str = "Join the waitlist";

/// Label swapped in while nudging
pub const NUDGE_CTA_LABEL: &str = "Still thinking? Lock in your seat";

/// Message added under the call-to-action while reassuring
pub const REASSURANCE_MESSAGE: &str =
    "No payment now. Joining the waitlist just reserves your spot.";

/// What the results view shows in place of the call-to-action block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallToAction {
    /// Plain button
    Standard {
        /// Button label
        label: String,
    },
    /// Perturbed button with a swapped label
    Perturbed {
        /// Button label
        label: String,
    },
    /// Perturbed button plus a reassurance line
    Reassured {
        /// Button label
        label: String,
        /// Line shown below the button
        message: String,
    },
    /// Budget selection control
    BudgetPicker {
        /// Current slider value in rand
        budget: u32,
        /// Slider minimum
        min: u32,
        /// Slider maximum
        max: u32,
        /// Slider step
        step: u32,
    },
}

impl CallToAction {
    /// Call-to-action for a non-negotiating state
    ///
    /// `Negotiating` needs a budget; use [`CallToAction::budget_picker`].
    #[must_use]
    pub fn for_state(state: EngagementState) -> Option<Self> {
        match state {
            EngagementState::Calm => Some(Self::Standard {
                label: STANDARD_CTA_LABEL.to_string(),
            }),
            EngagementState::Nudging => Some(Self::Perturbed {
                label: NUDGE_CTA_LABEL.to_string(),
            }),
            EngagementState::Reassuring => Some(Self::Reassured {
                label: NUDGE_CTA_LABEL.to_string(),
                message: REASSURANCE_MESSAGE.to_string(),
            }),
            EngagementState::Negotiating => None,
        }
    }

    /// Budget picker for the negotiating state
    #[must_use]
    pub fn budget_picker(budget: u32, range: BudgetRange) -> Self {
        Self::BudgetPicker {
            budget,
            min: range.min,
            max: range.max,
            step: range.step,
        }
    }
}
