//! Fare calculation and competitor comparison
//!
//! Pure functions over a [`DistanceTier`] and a [`ScheduleSelection`]. Every
//! figure is a projected monthly cost in rand. Own-service pricing is per
//! seat; competitor pricing is per vehicle, so comparisons are always made
//! against the single-passenger own-service figure.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{DistanceTier, ScheduleSelection};

/// Average number of weeks in a month
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Competitor B prices roughly 13% below competitor A
pub const COMPETITOR_B_FACTOR: f64 = 0.87;

/// Months used to annualise savings
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Pricing band for a distance, inclusive on the lower tier
#[must_use]
pub fn tier_for(km: f64) -> DistanceTier {
    DistanceTier::for_km(km)
}

/// Monthly own-service cost for the whole group
///
/// # Errors
///
/// Returns `DomainError::NoDaysSelected` when `days_selected` is zero.
pub fn own_service_cost(
    tier: DistanceTier,
    passengers: u8,
    trips_per_day: u8,
    days_selected: u32,
) -> Result<f64, DomainError> {
    ensure_days(days_selected)?;
    Ok(f64::from(tier.rate_per_person())
        * f64::from(passengers)
        * f64::from(trips_per_day)
        * f64::from(days_selected)
        * WEEKS_PER_MONTH)
}

/// Monthly competitor cost, per vehicle and independent of group size
///
/// # Errors
///
/// Returns `DomainError::NoDaysSelected` when `days_selected` is zero.
pub fn competitor_cost(
    tier: DistanceTier,
    trips_per_day: u8,
    days_selected: u32,
) -> Result<f64, DomainError> {
    ensure_days(days_selected)?;
    Ok(tier.competitor_rate().per_trip()
        * f64::from(trips_per_day)
        * f64::from(days_selected)
        * WEEKS_PER_MONTH)
}

fn ensure_days(days_selected: u32) -> Result<(), DomainError> {
    if days_selected == 0 {
        return Err(DomainError::NoDaysSelected);
    }
    Ok(())
}

/// Projected monthly cost per provider
///
/// `own_service` is the headline total for the whole group; it is a display
/// figure and never an input to the savings comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareQuote {
    /// Own service, all passengers
    pub own_service: f64,
    /// Competitor A, per vehicle
    pub competitor_a: f64,
    /// Competitor B, per vehicle
    pub competitor_b: f64,
}

impl FareQuote {
    /// Price a schedule in a tier
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` for an empty schedule.
    pub fn compute(tier: DistanceTier, schedule: &ScheduleSelection) -> Result<Self, DomainError> {
        schedule.ensure_priceable()?;
        let trips = schedule.trips_per_day().count();
        let days = schedule.days_selected();

        let own_service = own_service_cost(tier, schedule.passengers().get(), trips, days)?;
        let competitor_a = competitor_cost(tier, trips, days)?;

        Ok(Self {
            own_service,
            competitor_a,
            competitor_b: competitor_a * COMPETITOR_B_FACTOR,
        })
    }

    /// The more expensive competitor, used to scale the comparison bars
    #[must_use]
    pub fn max_competitor(&self) -> f64 {
        self.competitor_a.max(self.competitor_b)
    }

    /// The same quote spread over an average week
    #[must_use]
    pub fn per_week(&self) -> Self {
        Self {
            own_service: self.own_service / WEEKS_PER_MONTH,
            competitor_a: self.competitor_a / WEEKS_PER_MONTH,
            competitor_b: self.competitor_b / WEEKS_PER_MONTH,
        }
    }
}

/// Relative bar lengths in percent of the most expensive competitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBars {
    /// Own service (single passenger)
    pub own_service: f64,
    /// Competitor A
    pub competitor_a: f64,
    /// Competitor B
    pub competitor_b: f64,
}

/// Per-person savings against competitor A
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsComparison {
    /// Own-service monthly cost for one passenger
    pub own_service_per_person: f64,
    /// Monthly saving per person, never negative
    pub savings_per_person: f64,
    /// Savings times twelve
    pub annual_savings: f64,
    /// Savings as a whole percentage of the competitor fare
    pub savings_percent: f64,
    /// Chart bar lengths
    pub bars: ComparisonBars,
}

impl SavingsComparison {
    /// Compare the single-passenger own-service cost with competitor fares
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` for an empty schedule.
    pub fn compute(tier: DistanceTier, schedule: &ScheduleSelection) -> Result<Self, DomainError> {
        let quote = FareQuote::compute(tier, schedule)?;
        let own_service_per_person = own_service_cost(
            tier,
            1,
            schedule.trips_per_day().count(),
            schedule.days_selected(),
        )?;

        let savings_per_person = (quote.competitor_a - own_service_per_person).max(0.0);
        let savings_percent = percent_of(savings_per_person, quote.competitor_a);
        let max_cost = quote.max_competitor();

        Ok(Self {
            own_service_per_person,
            savings_per_person,
            annual_savings: savings_per_person * MONTHS_PER_YEAR,
            savings_percent,
            bars: ComparisonBars {
                own_service: percent_of(own_service_per_person, max_cost),
                competitor_a: percent_of(quote.competitor_a, max_cost),
                competitor_b: percent_of(quote.competitor_b, max_cost),
            },
        })
    }
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 100.0).round()
}

/// Format an amount in whole rand with space-grouped thousands, e.g. `R10 132`
#[must_use]
pub fn format_rand(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.max(0.0).round());
    let digits: Vec<char> = rounded.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*digit);
    }
    format!("R{grouped}")
}
