//! Waitlist lead delivery configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Where converted leads are sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadConfig {
    /// Webhook receiving a JSON POST per lead; leads are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backoff for transient webhook failures
    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl LeadConfig {
    /// Webhook delivery to `url` with fast, deterministic retries
    #[must_use]
    pub fn for_testing(url: impl Into<String>) -> Self {
        Self {
            webhook_url: Some(url.into()),
            timeout_secs: 5,
            retry: RetryConfig::for_testing(),
        }
    }

    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook URL is not HTTP(S), the timeout is
    /// zero or the retry settings are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = self.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("webhook_url must be an http(s) URL, got '{url}'"));
            }
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        self.retry.validate().map_err(|e| format!("retry: {e}"))
    }
}
