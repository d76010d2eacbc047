//! Twilio adapter.

use async_trait::async_trait;
use database::ProviderKind;
use reqwest::Client;

use crate::config::ProviderConfig;
use crate::credentials::TwilioCredentials;
use crate::error::ProviderError;
use crate::laml::LamlClient;
use crate::provider::SmsProvider;
use crate::types::{
    AvailableNumber, ConnectionTest, NumberSearch, OwnedNumber, PurchasedNumber, SendRequest,
    SentMessage,
};

pub struct TwilioProvider {
    client: LamlClient,
    configured: bool,
    status_callback_url: Option<String>,
}

impl TwilioProvider {
    pub fn new(http: Client, credentials: TwilioCredentials, config: &ProviderConfig) -> Self {
        let configured = credentials.is_complete();
        Self {
            client: LamlClient::new(
                http,
                ProviderKind::Twilio,
                config.twilio_base_url.clone(),
                credentials.account_sid,
                credentials.auth_token,
            ),
            configured,
            status_callback_url: config.status_callback_url.clone(),
        }
    }
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    fn name(&self) -> &str {
        "Twilio"
    }

    fn kind(&self) -> Option<ProviderKind> {
        Some(ProviderKind::Twilio)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn test_connection(&self) -> ConnectionTest {
        ConnectionTest::from_result(self.client.probe().await)
    }

    async fn search_available_numbers(
        &self,
        search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        self.client.search_available(search).await
    }

    async fn list_owned_numbers(&self) -> Result<Vec<OwnedNumber>, ProviderError> {
        self.client.list_owned().await
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

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::build_client;
    use crate::types::Capability;

    async fn provider(server: &MockServer) -> TwilioProvider {
        let config = ProviderConfig::default().with_base_url(server.uri());
        let credentials = TwilioCredentials::from_json(&json!({
            "accountSid": "AC123",
            "authToken": "token"
        }))
        .unwrap();
        TwilioProvider::new(build_client(config.timeout).unwrap(), credentials, &config)
    }

    #[tokio::test]
    async fn test_connection_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Accounts/AC123/IncomingPhoneNumbers.json"))
            .and(query_param("PageSize", "1"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"incoming_phone_numbers": []})))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server).await.test_connection().await;
        assert!(result.success, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_connection_auth_failure_is_structured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"code": 20003, "message": "Authenticate", "status": 401})),
            )
            .mount(&server)
            .await;

        let result = provider(&server).await.test_connection().await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Authentication failed for twilio"));
        assert!(error.contains("Authenticate"));
        assert!(!error.contains("token"));
    }

    #[tokio::test]
    async fn test_search_defaults_capabilities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Accounts/AC123/AvailablePhoneNumbers/US/Local.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "available_phone_numbers": [
                    {"phone_number": "+14155550100", "friendly_name": "(415) 555-0100", "region": "CA",
                     "capabilities": {"voice": true, "SMS": true, "MMS": false}},
                    {"phone_number": "+14155550101"}
                ]
            })))
            .mount(&server)
            .await;

        let numbers = provider(&server)
            .await
            .search_available_numbers(&NumberSearch::default())
            .await
            .unwrap();

        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[0].capabilities, vec![Capability::Sms, Capability::Voice]);
        assert_eq!(numbers[1].capabilities, vec![Capability::Sms, Capability::Voice]);
    }

    #[tokio::test]
    async fn test_send_message_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(body_string_contains("Body=hello"))
            .and(body_string_contains("StatusCallback="))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "sid": "SM1", "status": "queued", "from": "+14155550100", "to": "+19998887777", "body": "hello"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sent = provider(&server)
            .await
            .send_message(
                &SendRequest::new("+14155550100", "+19998887777", "hello")
                    .with_status_callback("https://gw.example.com/webhooks/sms/status"),
            )
            .await
            .unwrap();

        assert_eq!(sent.provider_message_id, "SM1");
        assert_eq!(sent.status, "queued");
    }

    #[tokio::test]
    async fn test_purchase_surfaces_provider_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/IncomingPhoneNumbers.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 21422, "message": "PhoneNumber is not available", "status": 400
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .purchase_number("+14155550100")
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert!(err.to_string().contains("PhoneNumber is not available"));
    }

    #[test]
    fn test_incomplete_credentials() {
        let config = ProviderConfig::default();
        let credentials = TwilioCredentials::from_json(&json!({"accountSid": "AC1"})).unwrap();
        let provider = TwilioProvider::new(Client::new(), credentials, &config);
        assert!(!provider.is_configured());
    }
}
