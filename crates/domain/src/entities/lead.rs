//! Lead handed to the waitlist collaborator when a user converts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::RiderCategory;

/// Which control the user converted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadSource {
    /// Standard call-to-action under the results
    EstimatorCta,
    /// Budget picker shown while negotiating
    BudgetSlider,
}

impl LeadSource {
    /// Source tag sent with the lead
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::EstimatorCta => "estimator-cta",
            Self::BudgetSlider => "budget-slider",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Conversion payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    /// Monthly budget in rand, only when converting from the budget picker
    pub budget: Option<u32>,
    /// Control the user converted from
    pub source: LeadSource,
    /// Rider category selected in the schedule
    pub rider_category: RiderCategory,
    /// When the user converted
    pub submitted_at: DateTime<Utc>,
}

impl LeadSubmission {
    /// Lead from the standard call-to-action
    #[must_use]
    pub fn from_cta(rider_category: RiderCategory) -> Self {
        Self {
            budget: None,
            source: LeadSource::EstimatorCta,
            rider_category,
            submitted_at: Utc::now(),
        }
    }

    /// Lead from the budget picker
    #[must_use]
    pub fn from_budget(budget: u32, rider_category: RiderCategory) -> Self {
        Self {
            budget: Some(budget),
            source: LeadSource::BudgetSlider,
            rider_category,
            submitted_at: Utc::now(),
        }
    }
}
