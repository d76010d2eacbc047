//! Stand-in adapter for tenants without an active gateway.

use async_trait::async_trait;
use database::ProviderKind;

use crate::error::ProviderError;
use crate::provider::SmsProvider;
use crate::types::{
    AvailableNumber, ConnectionTest, NumberSearch, OwnedNumber, PurchasedNumber, SendRequest,
    SentMessage,
};

/// Default explanation shown to users.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "No SMS gateway is configured. Connect Twilio, SignalWire or Telnyx in gateway settings.";

/// Adapter whose every capability fails with [`ProviderError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new() -> Self {
        Self::with_reason(NOT_CONFIGURED_MESSAGE)
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::NotConfigured(self.reason.clone())
    }
}

impl Default for UnconfiguredProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn kind(&self) -> Option<ProviderKind> {
        None
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn test_connection(&self) -> ConnectionTest {
        ConnectionTest::failed(self.reason.clone())
    }

    async fn search_available_numbers(
        &self,
        _search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        Err(self.error())
    }

    async fn list_owned_numbers(&self) -> Result<Vec<OwnedNumber>, ProviderError> {
        Err(self.error())
    }

    async fn purchase_number(&self, _phone_number: &str) -> Result<PurchasedNumber, ProviderError> {
        Err(self.error())
    }

    async fn send_message(&self, _request: &SendRequest) -> Result<SentMessage, ProviderError> {
        Err(self.error())
    }
}
