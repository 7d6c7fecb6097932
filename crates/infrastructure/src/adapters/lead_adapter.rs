//! Lead adapters - Implement LeadSubmissionPort
//!
//! [`WebhookLeadAdapter`] POSTs each lead as JSON to the waitlist webhook,
//! retrying transient failures. [`LogOnlyLeadAdapter`] is used when no
//! webhook is configured.

use std::sync::Arc;
use std::time::Duration;

use application::error::ApplicationError;
use application::ports::LeadSubmissionPort;
use async_trait::async_trait;
use domain::LeadSubmission;
use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::config::LeadConfig;
use crate::retry::{RetryConfig, with_retry};

/// Delivers leads to an HTTP webhook
#[derive(Debug, Clone)]
pub struct WebhookLeadAdapter {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl WebhookLeadAdapter {
    /// Create an adapter for `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(integration_osm::USER_AGENT)
            .build()
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            retry,
        })
    }

    async fn post(&self, lead: &LeadSubmission) -> Result<(), ApplicationError> {
        let response = self
            .client
            .post(&self.url)
            .json(lead)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApplicationError::Timeout("lead webhook".to_string())
                } else {
                    ApplicationError::ExternalService(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApplicationError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ApplicationError::ExternalService(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ApplicationError::Configuration(format!(
                "lead webhook rejected submission: HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadSubmissionPort for WebhookLeadAdapter {
    #[instrument(skip(self, lead), fields(source = %lead.source))]
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), ApplicationError> {
        let outcome = with_retry(&self.retry, || self.post(lead)).await;
        if outcome.result.is_ok() {
            info!(attempts = outcome.attempts, "Lead delivered");
        }
        outcome.result
    }
}

/// Records leads in the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyLeadAdapter;

#[async_trait]
impl LeadSubmissionPort for LogOnlyLeadAdapter {
    async fn submit(&self, lead: &LeadSubmission) -> Result<(), ApplicationError> {
        info!(
            source = %lead.source,
            budget = ?lead.budget,
            rider_category = %lead.rider_category,
            "Lead received (no webhook configured)"
        );
        Ok(())
    }
}

/// Pick the lead adapter for `config`
///
/// # Errors
///
/// Returns an error if the webhook client cannot be built.
pub fn lead_adapter_from_config(
    config: &LeadConfig,
) -> Result<Arc<dyn LeadSubmissionPort>, ApplicationError> {
    match config.webhook_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            debug!(url, "Delivering leads to webhook");
            Ok(Arc::new(WebhookLeadAdapter::new(
                url,
                config.timeout(),
                config.retry.clone(),
            )?))
        },
        None => Ok(Arc::new(LogOnlyLeadAdapter)),
    }
}
