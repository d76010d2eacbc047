//! SignalWire adapter.
//!
//! Read operations are retried with exponential backoff. `send_message` is
//! never retried so a message is not sent twice.

use async_trait::async_trait;
use database::ProviderKind;
use reqwest::Client;

use crate::config::ProviderConfig;
use crate::credentials::SignalWireCredentials;
use crate::error::ProviderError;
use crate::laml::LamlClient;
use crate::provider::SmsProvider;
use crate::retry::RetryPolicy;
use crate::types::{
    AvailableNumber, ConnectionTest, NumberSearch, OwnedNumber, PurchasedNumber, SendRequest,
    SentMessage,
};

pub struct SignalWireProvider {
    client: LamlClient,
    retry: RetryPolicy,
    configured: bool,
    status_callback_url: Option<String>,
}

impl SignalWireProvider {
    pub fn new(http: Client, credentials: SignalWireCredentials, config: &ProviderConfig) -> Self {
        let configured = credentials.is_complete();
        let base_url = config.signalwire_base_url_for(&credentials.space_url);
        Self {
            client: LamlClient::new(
                http,
                ProviderKind::SignalWire,
                base_url,
                credentials.project_id,
                credentials.api_token,
            ),
            retry: config.retry.clone(),
            configured,
            status_callback_url: config.status_callback_url.clone(),
        }
    }
}

#[async_trait]
impl SmsProvider for SignalWireProvider {
    fn name(&self) -> &str {
        "SignalWire"
    }

    fn kind(&self) -> Option<ProviderKind> {
        Some(ProviderKind::SignalWire)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn test_connection(&self) -> ConnectionTest {
        ConnectionTest::from_result(
            self.retry
                .retry("test connection", || self.client.probe())
                .await,
        )
    }

    async fn search_available_numbers(
        &self,
        search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        self.retry
            .retry("search numbers", || self.client.search_available(search))
            .await
    }

    async fn list_owned_numbers(&self) -> Result<Vec<OwnedNumber>, ProviderError> {
        self.retry
            .retry("list numbers", || self.client.list_owned())
            .await
    }

    async fn purchase_number(&self, phone_number: &str) -> Result<PurchasedNumber, ProviderError> {
        self.client.purchase(phone_number).await
    }

    async fn send_message(&self, request: &SendRequest) -> Result<SentMessage, ProviderError> {
        let callback = request
            .status_callback_url
            .as_deref()
            .or(self.status_callback_url.as_deref());
        self.client.send(request, callback).await
    }
}
