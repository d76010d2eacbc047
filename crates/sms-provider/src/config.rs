//! Configuration shared by all provider adapters.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default Twilio REST base URL.
pub const TWILIO_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Default Telnyx REST base URL.
pub const TELNYX_BASE_URL: &str = "https://api.telnyx.com/v2";

/// Timeout, retry and endpoint settings for provider adapters.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Backoff policy for read operations on adapters that retry.
    pub retry: RetryPolicy,
    /// Twilio REST base URL.
    pub twilio_base_url: String,
    /// Telnyx REST base URL.
    pub telnyx_base_url: String,
    /// Overrides the SignalWire base URL that is otherwise derived from the
    /// space URL in the credentials.
    pub signalwire_base_url: Option<String>,
    /// URL providers call with delivery status updates.
    pub status_callback_url: Option<String>,
}

impl ProviderConfig {
    /// Point every adapter at a single base URL. Used against mock servers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.twilio_base_url = base_url.clone();
        self.telnyx_base_url = base_url.clone();
        self.signalwire_base_url = Some(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_status_callback(mut self, url: impl Into<String>) -> Self {
        self.status_callback_url = Some(url.into());
        self
    }

    /// Base URL of the LaML API for a SignalWire space.
    pub fn signalwire_base_url_for(&self, space_url: &str) -> String {
        match &self.signalwire_base_url {
            Some(url) => url.clone(),
            None => {
                let host = space_url
                    .trim()
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/');
                format!("https://{host}/api/laml/2010-04-01")
            }
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            twilio_base_url: TWILIO_BASE_URL.to_string(),
            telnyx_base_url: TELNYX_BASE_URL.to_string(),
            signalwire_base_url: None,
            status_callback_url: None,
        }
    }
}
