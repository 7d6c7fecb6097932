//! Weekly travel schedule selected in the estimator

use std::collections::HashSet;
use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Smallest bookable group
pub const MIN_PASSENGERS: u8 = 1;

/// Largest bookable group
pub const MAX_PASSENGERS: u8 = 4;

/// One-way or return travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripsPerDay {
    /// One trip per travel day
    OneWay,
    /// Two trips per travel day
    #[default]
    Return,
}

impl TripsPerDay {
    /// Number of trips per travel day
    #[must_use]
    pub const fn count(&self) -> u8 {
        match self {
            Self::OneWay => 1,
            Self::Return => 2,
        }
    }
}

impl TryFrom<u8> for TripsPerDay {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::OneWay),
            2 => Ok(Self::Return),
            other => Err(DomainError::InvalidTripsPerDay(other)),
        }
    }
}

/// Who is riding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiderCategory {
    /// Commuting staff member
    #[default]
    Staff,
    /// Scholar travelling to school
    Scholar,
}

impl fmt::Display for RiderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staff => write!(f, "staff"),
            Self::Scholar => write!(f, "scholar"),
        }
    }
}

/// Number of passengers sharing the booking (1 to 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PassengerCount(u8);

impl PassengerCount {
    /// Create a passenger count
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPassengerCount` outside 1..=4.
    pub fn new(count: u8) -> Result<Self, DomainError> {
        if count < MIN_PASSENGERS || count > MAX_PASSENGERS {
            return Err(DomainError::InvalidPassengerCount(count));
        }
        Ok(Self(count))
    }

    /// Raw count
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// One more passenger, saturating at the maximum
    #[must_use]
    pub const fn increment(self) -> Self {
        if self.0 >= MAX_PASSENGERS {
            self
        } else {
            Self(self.0 + 1)
        }
    }

    /// One passenger fewer, saturating at the minimum
    #[must_use]
    pub const fn decrement(self) -> Self {
        if self.0 <= MIN_PASSENGERS {
            self
        } else {
            Self(self.0 - 1)
        }
    }
}

impl Default for PassengerCount {
    fn default() -> Self {
        Self(MIN_PASSENGERS)
    }
}

impl TryFrom<u8> for PassengerCount {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PassengerCount> for u8 {
    fn from(count: PassengerCount) -> Self {
        count.0
    }
}

/// Days, trips, group size and rider category chosen by the user
///
/// Freely mutable and independent of the selected locations. A calculation
/// requires at least one selected day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSelection {
    days: HashSet<Weekday>,
    trips_per_day: TripsPerDay,
    passengers: PassengerCount,
    rider_category: RiderCategory,
}

impl Default for ScheduleSelection {
    /// Weekday commute: Monday to Friday, return trip, one staff rider
    fn default() -> Self {
        Self {
            days: [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .into_iter()
            .collect(),
            trips_per_day: TripsPerDay::Return,
            passengers: PassengerCount::default(),
            rider_category: RiderCategory::Staff,
        }
    }
}

impl ScheduleSelection {
    /// Create a schedule from its parts
    #[must_use]
    pub fn new(
        days: impl IntoIterator<Item = Weekday>,
        trips_per_day: TripsPerDay,
        passengers: PassengerCount,
        rider_category: RiderCategory,
    ) -> Self {
        Self {
            days: days.into_iter().collect(),
            trips_per_day,
            passengers,
            rider_category,
        }
    }

    /// Selected days, Monday first
    #[must_use]
    pub fn days(&self) -> Vec<Weekday> {
        let mut days: Vec<Weekday> = self.days.iter().copied().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days
    }

    /// Whether a day is selected
    #[must_use]
    pub fn includes(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }

    /// Number of selected days per week
    #[must_use]
    pub fn days_selected(&self) -> u32 {
        u32::try_from(self.days.len()).unwrap_or(u32::MAX)
    }

    /// Trip mode
    #[must_use]
    pub const fn trips_per_day(&self) -> TripsPerDay {
        self.trips_per_day
    }

    /// Group size
    #[must_use]
    pub const fn passengers(&self) -> PassengerCount {
        self.passengers
    }

    /// Rider category
    #[must_use]
    pub const fn rider_category(&self) -> RiderCategory {
        self.rider_category
    }

    /// Add the day if absent, remove it if present
    pub fn toggle_day(&mut self, day: Weekday) {
        if !self.days.remove(&day) {
            self.days.insert(day);
        }
    }

    /// Change the trip mode
    pub fn set_trips_per_day(&mut self, trips: TripsPerDay) {
        self.trips_per_day = trips;
    }

    /// Change the group size
    pub fn set_passengers(&mut self, passengers: PassengerCount) {
        self.passengers = passengers;
    }

    /// Change the rider category
    pub fn set_rider_category(&mut self, category: RiderCategory) {
        self.rider_category = category;
    }

    /// Ensure the schedule can be priced
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NoDaysSelected` if no day is selected.
    pub fn ensure_priceable(&self) -> Result<(), DomainError> {
        if self.days.is_empty() {
            return Err(DomainError::NoDaysSelected);
        }
        Ok(())
    }
}
