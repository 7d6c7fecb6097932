//! Waitlist lead port

use async_trait::async_trait;
use domain::LeadSubmission;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for handing a converted lead to the waitlist backend
///
/// Callers treat submission as fire-and-forget; the result is only logged.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LeadSubmissionPort: Send + Sync {
    /// Submit a lead
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), ApplicationError>;
}
