//! Failure isolation for independently rendered sections
//!
//! A [`SectionBoundary`] runs a section's render function, catching both
//! returned errors and panics, and substitutes a fallback scoped to that one
//! section. Once tripped it keeps showing the fallback until reset.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::error::ApplicationError;

/// What a section shows
#[derive(Debug, Clone, PartialEq)]
pub enum SectionView<T> {
    /// The section rendered normally
    Rendered(T),
    /// The section failed; show a placeholder instead
    Fallback {
        /// Section name
        label: String,
        /// Failure description
        message: String,
    },
}

impl<T> SectionView<T> {
    /// Whether the fallback is showing
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// The rendered value, if any
    #[must_use]
    pub fn rendered(self) -> Option<T> {
        match self {
            Self::Rendered(value) => Some(value),
            Self::Fallback { .. } => None,
        }
    }
}

/// Error boundary around one section
#[derive(Debug, Clone)]
pub struct SectionBoundary {
    label: String,
    failure: Option<String>,
}

impl SectionBoundary {
    /// Create a boundary for the named section
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            failure: None,
        }
    }

    /// Section name
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the boundary has tripped
    #[must_use]
    pub const fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Render the section, or its fallback if rendering fails or has failed
    pub fn render<T, F>(&mut self, render: F) -> SectionView<T>
    where
        F: FnOnce() -> Result<T, ApplicationError>,
    {
        if let Some(message) = &self.failure {
            return self.fallback(message.clone());
        }

        let message = match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(value)) => return SectionView::Rendered(value),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        error!(section = %self.label, error = %message, "Section failed to render");
        self.failure = Some(message.clone());
        self.fallback(message)
    }

    /// Clear the failure so the next render tries again
    pub fn reset(&mut self) {
        self.failure = None;
    }

    fn fallback<T>(&self, message: String) -> SectionView<T> {
        SectionView::Fallback {
            label: self.label.clone(),
            message,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "section panicked".to_string())
}
