//! Monthly budget chosen in the negotiation flow

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Slider bounds for the monthly budget picker, in rand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    /// Lowest selectable budget
    #[serde(default = "default_min")]
    pub min: u32,
    /// Highest selectable budget
    #[serde(default = "default_max")]
    pub max: u32,
    /// Slider step
    #[serde(default = "default_step")]
    pub step: u32,
    /// Initial slider position
    #[serde(default = "default_initial")]
    pub initial: u32,
}

const fn default_min() -> u32 {
    200
}

const fn default_max() -> u32 {
    2500
}

const fn default_step() -> u32 {
    50
}

const fn default_initial() -> u32 {
    800
}

impl Default for BudgetRange {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            step: default_step(),
            initial: default_initial(),
        }
    }
}

impl BudgetRange {
    /// Validate the range
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` if the bounds are inverted, the
    /// step is zero, or the initial value lies outside the bounds.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.step == 0 {
            return Err(DomainError::ValidationError(
                "budget step must be greater than 0".to_string(),
            ));
        }
        if self.min >= self.max {
            return Err(DomainError::ValidationError(
                "budget min must be below max".to_string(),
            ));
        }
        if !(self.min..=self.max).contains(&self.initial) {
            return Err(DomainError::ValidationError(
                "initial budget must lie within min and max".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp a raw slider value into range and snap it to the nearest step
    #[must_use]
    pub fn snap(&self, value: u32) -> u32 {
        let clamped = value.clamp(self.min, self.max);
        if self.step == 0 {
            return clamped;
        }
        let offset = clamped - self.min;
        let steps = (offset + self.step / 2) / self.step;
        (self.min + steps * self.step).min(self.max)
    }

    /// Slider fill in percent for a value, as drawn under the thumb
    #[must_use]
    pub fn fill_percent(&self, value: u32) -> f64 {
        let span = f64::from(self.max.saturating_sub(self.min));
        if span == 0.0 {
            return 0.0;
        }
        f64::from(value.saturating_sub(self.min)) / span * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range() {
        let range = BudgetRange::default();
        assert_eq!(range.min, 200);
        assert_eq!(range.max, 2500);
        assert_eq!(range.step, 50);
        assert_eq!(range.initial, 800);
        assert!(range.validate().is_ok());
    }

    #[test]
    fn snap_clamps_and_rounds() {
        let range = BudgetRange::default();
        assert_eq!(range.snap(0), 200);
        assert_eq!(range.snap(9_999), 2500);
        assert_eq!(range.snap(824), 800);
        assert_eq!(range.snap(825), 850);
        assert_eq!(range.snap(1_000), 1_000);
    }

    #[test]
    fn fill_percent_spans_range() {
        let range = BudgetRange::default();
        assert!(range.fill_percent(200).abs() < f64::EPSILON);
        assert!((range.fill_percent(2500) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_ranges_rejected() {
        let zero_step = BudgetRange {
            step: 0,
            ..BudgetRange::default()
        };
        assert!(zero_step.validate().is_err());

        let inverted = BudgetRange {
            min: 3000,
            ..BudgetRange::default()
        };
        assert!(inverted.validate().is_err());

        let outside = BudgetRange {
            initial: 100,
            ..BudgetRange::default()
        };
        assert!(outside.validate().is_err());
    }
}
