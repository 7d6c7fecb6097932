//! Distance tier value object

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (inclusive) of the short tier in km
pub const SHORT_TIER_MAX_KM: f64 = 10.0;

/// Upper bound (inclusive) of the medium tier in km
pub const MEDIUM_TIER_MAX_KM: f64 = 24.0;

/// Fixed distance band with a flat per-person rate
///
/// Boundaries are inclusive on the lower tier:
/// - Short: up to 10 km
/// - Medium: above 10 km up to 24 km
/// - Long: above 24 km
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceTier {
    /// Short trip, 5–10 km
    #[default]
    Short,
    /// Medium trip, 11–24 km
    Medium,
    /// Long trip, over 24 km
    Long,
}

/// Per-vehicle competitor fare for a tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompetitorRate {
    /// Average fare per trip in rand
    pub avg_fare: f64,
    /// Typical peak-hour surge multiplier
    pub surge_multiplier: f64,
}

impl CompetitorRate {
    /// Effective fare per trip including surge
    #[must_use]
    pub fn per_trip(&self) -> f64 {
        self.avg_fare * self.surge_multiplier
    }
}

impl DistanceTier {
    /// All tiers, shortest first
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Derive the tier from a distance in kilometers
    #[must_use]
    pub fn for_km(km: f64) -> Self {
        if km <= SHORT_TIER_MAX_KM {
            Self::Short
        } else if km <= MEDIUM_TIER_MAX_KM {
            Self::Medium
        } else {
            Self::Long
        }
    }

    /// Own-service rate per person per trip in rand
    #[must_use]
    pub const fn rate_per_person(&self) -> u32 {
        match self {
            Self::Short => 60,
            Self::Medium => 80,
            Self::Long => 110,
        }
    }

    /// Competitor fare keyed by the same band
    #[must_use]
    pub const fn competitor_rate(&self) -> CompetitorRate {
        match self {
            Self::Short => CompetitorRate {
                avg_fare: 65.0,
                surge_multiplier: 1.5,
            },
            Self::Medium => CompetitorRate {
                avg_fare: 130.0,
                surge_multiplier: 1.8,
            },
            Self::Long => CompetitorRate {
                avg_fare: 220.0,
                surge_multiplier: 2.0,
            },
        }
    }

    /// Label shown in the manual tier selector
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Short => "Short trip (5–10 km)",
            Self::Medium => "Medium trip (11–24 km)",
            Self::Long => "Long trip (over 24 km)",
        }
    }
}

impl fmt::Display for DistanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
