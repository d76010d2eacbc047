//! Telnyx adapter (API v2).
//!
//! Bearer-token auth, JSON bodies, and `{"data": ...}` response envelopes.

use async_trait::async_trait;
use database::ProviderKind;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::credentials::TelnyxCredentials;
use crate::error::ProviderError;
use crate::http::{read_json, transport_error};
use crate::provider::SmsProvider;
use crate::types::{
    normalize_capabilities, AvailableNumber, Capability, ConnectionTest, NumberSearch,
    OwnedNumber, PurchasedNumber, SendRequest, SentMessage,
};

const PROVIDER: ProviderKind = ProviderKind::Telnyx;

#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Data<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TelnyxAvailableNumber {
    phone_number: String,
    #[serde(default)]
    region_information: Vec<RegionInformation>,
    #[serde(default)]
    features: Vec<Feature>,
    cost_information: Option<CostInformation>,
}

#[derive(Debug, Deserialize)]
struct RegionInformation {
    region_type: Option<String>,
    region_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CostInformation {
    monthly_cost: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelnyxPhoneNumber {
    id: String,
    phone_number: String,
    connection_name: Option<String>,
    purchased_at: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NumberOrder {
    id: String,
    #[serde(default)]
    phone_numbers: Vec<OrderedNumber>,
}

#[derive(Debug, Deserialize)]
struct OrderedNumber {
    id: Option<String>,
    phone_number: String,
}

#[derive(Debug, Serialize)]
struct NumberOrderRequest<'a> {
    phone_numbers: Vec<OrderedNumberRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messaging_profile_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OrderedNumberRequest<'a> {
    phone_number: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    messaging_profile_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TelnyxMessage {
    id: String,
    #[serde(default)]
    to: Vec<MessageRecipient>,
    from: Option<MessageEndpoint>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRecipient {
    phone_number: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageEndpoint {
    phone_number: String,
}

fn region_of(info: &[RegionInformation], kind: &str) -> Option<String> {
    info.iter()
        .find(|r| r.region_type.as_deref() == Some(kind))
        .and_then(|r| r.region_name.clone())
}

pub struct TelnyxProvider {
    http: Client,
    base_url: String,
    api_key: SecretString,
    messaging_profile_id: Option<String>,
    status_callback_url: Option<String>,
}

impl TelnyxProvider {
    pub fn new(http: Client, credentials: TelnyxCredentials, config: &ProviderConfig) -> Self {
        Self {
            http,
            base_url: config.telnyx_base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
            messaging_profile_id: credentials.messaging_profile_id,
            status_callback_url: config.status_callback_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, operation, e))?;
        read_json(PROVIDER, operation, response).await
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        let request = self
            .http
            .get(self.url("phone_numbers"))
            .query(&[("page[size]", "1")]);
        let _: DataList<TelnyxPhoneNumber> = self.execute("test connection", request).await?;
        Ok(())
    }
}

#[async_trait]
impl SmsProvider for TelnyxProvider {
    fn name(&self) -> &str {
        "Telnyx"
    }

    fn kind(&self) -> Option<ProviderKind> {
        Some(PROVIDER)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    async fn test_connection(&self) -> ConnectionTest {
        ConnectionTest::from_result(self.probe().await)
    }

    async fn search_available_numbers(
        &self,
        search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        let mut query = vec![
            ("filter[country_code]", search.country_code()),
            ("filter[features][]", "sms".to_string()),
            ("filter[limit]", search.limit.to_string()),
        ];
        if let Some(area_code) = search.area_code_filter() {
            query.push(("filter[national_destination_code]", area_code.to_string()));
        }
        if let Some(region) = search.region_filter() {
            query.push(("filter[administrative_area]", region.to_string()));
        }

        debug!(provider = %PROVIDER, "Searching available numbers");
        let request = self.http.get(self.url("available_phone_numbers")).query(&query);
        let list: DataList<TelnyxAvailableNumber> = self.execute("search numbers", request).await?;

        let country = search.country_code();
        Ok(list
            .data
            .into_iter()
            .map(|n| AvailableNumber {
                capabilities: normalize_capabilities(
                    n.features
                        .iter()
                        .filter_map(|f| Capability::from_feature(&f.name))
                        .collect(),
                ),
                locality: region_of(&n.region_information, "location"),
                region: region_of(&n.region_information, "state"),
                country: Some(country.clone()),
                monthly_rate: n
                    .cost_information
                    .and_then(|c| c.monthly_cost)
                    .and_then(|c| c.parse().ok()),
                friendly_name: None,
                phone_number: n.phone_number,
            })
            .collect())
    }

    async fn list_owned_numbers(&self) -> Result<Vec<OwnedNumber>, ProviderError> {
        let request = self
            .http
            .get(self.url("phone_numbers"))
            .query(&[("page[size]", "250")]);
        let list: DataList<TelnyxPhoneNumber> = self.execute("list numbers", request).await?;

        // The numbers endpoint does not report features.
        Ok(list
            .data
            .into_iter()
            .map(|n| OwnedNumber {
                phone_number: n.phone_number,
                friendly_name: n.connection_name,
                provider_sid: n.id,
                capabilities: normalize_capabilities(Vec::new()),
                purchased_at: n.purchased_at.or(n.created_at),
            })
            .collect())
    }

    async fn purchase_number(&self, phone_number: &str) -> Result<PurchasedNumber, ProviderError> {
        let body = NumberOrderRequest {
            phone_numbers: vec![OrderedNumberRequest { phone_number }],
            messaging_profile_id: self.messaging_profile_id.as_deref(),
        };
        let request = self.http.post(self.url("number_orders")).json(&body);
        let order: Data<NumberOrder> = self.execute("purchase number", request).await?;

        let ordered = order
            .data
            .phone_numbers
            .into_iter()
            .find(|n| n.phone_number == phone_number);

        Ok(PurchasedNumber {
            phone_number: phone_number.to_string(),
            friendly_name: None,
            provider_sid: ordered.and_then(|n| n.id).unwrap_or(order.data.id),
            capabilities: normalize_capabilities(Vec::new()),
        })
    }

    async fn send_message(&self, request: &SendRequest) -> Result<SentMessage, ProviderError> {
        let body = MessageRequest {
            from: &request.from,
            to: &request.to,
            text: &request.body,
            messaging_profile_id: self.messaging_profile_id.as_deref(),
            webhook_url: request
                .status_callback_url
                .as_deref()
                .or(self.status_callback_url.as_deref()),
        };
        let http_request = self.http.post(self.url("messages")).json(&body);
        let message: Data<TelnyxMessage> = self.execute("send message", http_request).await?;
        let message = message.data;

        let recipient = message.to.into_iter().next();
        Ok(SentMessage {
            provider_message_id: message.id,
            status: recipient
                .as_ref()
                .and_then(|r| r.status.clone())
                .unwrap_or_else(|| "queued".to_string()),
            from: message
                .from
                .map(|f| f.phone_number)
                .unwrap_or_else(|| request.from.clone()),
            to: recipient
                .map(|r| r.phone_number)
                .unwrap_or_else(|| request.to.clone()),
            body: message.text.unwrap_or_else(|| request.body.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::build_client;

    fn provider(server: &MockServer, profile: Option<&str>) -> TelnyxProvider {
        let config = ProviderConfig::default().with_base_url(server.uri());
        let credentials = TelnyxCredentials::from_json(&json!({
            "apiKey": "KEY123",
            "messagingProfileId": profile
        }))
        .unwrap();
        TelnyxProvider::new(build_client(config.timeout).unwrap(), credentials, &config)
    }

    #[tokio::test]
    async fn test_connection_uses_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/phone_numbers"))
            .and(header("authorization", "Bearer KEY123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(provider(&server, None).test_connection().await.success);
    }

    #[tokio::test]
    async fn test_connection_reports_auth_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errors": [{"code": "10009", "title": "Authentication failed", "detail": "Could not understand the provided credentials."}]
            })))
            .mount(&server)
            .await;

        let result = provider(&server, None).test_connection().await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Could not understand the provided credentials."));
        assert!(!error.contains("KEY123"));
    }

    #[tokio::test]
    async fn test_search_maps_features_and_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/available_phone_numbers"))
            .and(query_param("filter[country_code]", "US"))
            .and(query_param("filter[national_destination_code]", "415"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "phone_number": "+14155550100",
                        "features": [{"name": "sms"}, {"name": "voice"}, {"name": "mms"}, {"name": "emergency"}],
                        "region_information": [
                            {"region_type": "location", "region_name": "San Francisco"},
                            {"region_type": "state", "region_name": "CA"}
                        ],
                        "cost_information": {"monthly_cost": "1.00", "currency": "USD"}
                    },
                    {"phone_number": "+14155550101", "features": []}
                ]
            })))
            .mount(&server)
            .await;

        let numbers = provider(&server, None)
            .search_available_numbers(&NumberSearch::default().area_code("415"))
            .await
            .unwrap();

        assert_eq!(numbers.len(), 2);
        assert_eq!(
            numbers[0].capabilities,
            vec![Capability::Sms, Capability::Voice, Capability::Mms]
        );
        assert_eq!(numbers[0].region.as_deref(), Some("CA"));
        assert_eq!(numbers[0].locality.as_deref(), Some("San Francisco"));
        assert_eq!(numbers[0].monthly_rate, Some(1.0));
        assert_eq!(numbers[1].capabilities, vec![Capability::Sms, Capability::Voice]);
    }

    #[tokio::test]
    async fn test_purchase_forwards_messaging_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/number_orders"))
            .and(body_partial_json(json!({
                "phone_numbers": [{"phone_number": "+14155550100"}],
                "messaging_profile_id": "profile-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "order-1",
                    "status": "pending",
                    "phone_numbers": [{"id": "num-1", "phone_number": "+14155550100", "status": "pending"}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let purchased = provider(&server, Some("profile-1"))
            .purchase_number("+14155550100")
            .await
            .unwrap();
        assert_eq!(purchased.provider_sid, "num-1");
    }

    #[tokio::test]
    async fn test_purchase_error_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "errors": [{"title": "Number unavailable", "detail": "+14155550100 is no longer available"}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server, None)
            .purchase_number("+14155550100")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no longer available"));
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({"from": "+14155550100", "to": "+19998887777", "text": "hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": "msg-1",
                    "from": {"phone_number": "+14155550100"},
                    "to": [{"phone_number": "+19998887777", "status": "queued"}],
                    "text": "hi"
                }
            })))
            .mount(&server)
            .await;

        let sent = provider(&server, None)
            .send_message(&SendRequest::new("+14155550100", "+19998887777", "hi"))
            .await
            .unwrap();
        assert_eq!(sent.provider_message_id, "msg-1");
        assert_eq!(sent.status, "queued");
        assert_eq!(sent.to, "+19998887777");
    }
}
