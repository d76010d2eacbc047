//! The capability interface every provider adapter implements.

use async_trait::async_trait;
use database::ProviderKind;

use crate::error::ProviderError;
use crate::types::{
    AvailableNumber, ConnectionTest, NumberSearch, OwnedNumber, PurchasedNumber, SendRequest,
    SentMessage,
};

/// Uniform interface over an SMS provider's REST API.
///
/// Callers hold an `Arc<dyn SmsProvider>` and never branch on the provider;
/// only the factory knows which implementation sits behind it.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &str;

    /// The provider, or `None` for the unconfigured adapter.
    fn kind(&self) -> Option<ProviderKind>;

    /// Whether all required credential fields are non-empty. No network call.
    fn is_configured(&self) -> bool;

    /// One cheap authenticated read. Failures are reported, not raised.
    async fn test_connection(&self) -> ConnectionTest;

    /// Search numbers available for purchase.
    async fn search_available_numbers(
        &self,
        search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError>;

    /// Numbers the account owns.
    async fn list_owned_numbers(&self) -> Result<Vec<OwnedNumber>, ProviderError>;

    /// Purchase an E.164 number.
    async fn purchase_number(&self, phone_number: &str) -> Result<PurchasedNumber, ProviderError>;

    /// Hand a message to the provider. Never retried.
    async fn send_message(&self, request: &SendRequest) -> Result<SentMessage, ProviderError>;
}
