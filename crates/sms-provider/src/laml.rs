//! Client for the Twilio-compatible REST dialect ("LaML") spoken by both
//! Twilio and SignalWire.
//!
//! HTTP Basic auth with the account id and token, form-encoded writes, JSON
//! responses, and `/Accounts/{sid}/...` resource paths.

use database::ProviderKind;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::http::{read_json, transport_error};
use crate::types::{
    capabilities_from_flags, AvailableNumber, Capability, NumberSearch, OwnedNumber,
    PurchasedNumber, SendRequest, SentMessage,
};

#[derive(Debug, Deserialize)]
struct AvailableNumbersPage {
    #[serde(default)]
    available_phone_numbers: Vec<LamlAvailableNumber>,
}

#[derive(Debug, Deserialize)]
struct LamlAvailableNumber {
    phone_number: String,
    friendly_name: Option<String>,
    locality: Option<String>,
    region: Option<String>,
    iso_country: Option<String>,
    #[serde(default)]
    capabilities: LamlCapabilities,
}

/// Capability flags. Twilio uses lowercase keys, older payloads uppercase.
#[derive(Debug, Default, Deserialize)]
struct LamlCapabilities {
    #[serde(default, alias = "SMS")]
    sms: Option<bool>,
    #[serde(default, alias = "Voice")]
    voice: Option<bool>,
    #[serde(default, alias = "MMS")]
    mms: Option<bool>,
}

impl LamlCapabilities {
    fn to_list(&self) -> Vec<Capability> {
        capabilities_from_flags(
            self.sms.unwrap_or(false),
            self.voice.unwrap_or(false),
            self.mms.unwrap_or(false),
        )
    }
}

#[derive(Debug, Deserialize)]
struct IncomingNumbersPage {
    #[serde(default)]
    incoming_phone_numbers: Vec<LamlIncomingNumber>,
}

#[derive(Debug, Deserialize)]
struct LamlIncomingNumber {
    sid: String,
    phone_number: String,
    friendly_name: Option<String>,
    #[serde(default)]
    capabilities: LamlCapabilities,
    date_created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LamlMessage {
    sid: String,
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
    body: Option<String>,
}

/// Authenticated client for one LaML account.
pub(crate) struct LamlClient {
    http: Client,
    provider: ProviderKind,
    base_url: String,
    account_sid: String,
    token: SecretString,
}

impl LamlClient {
    pub(crate) fn new(
        http: Client,
        provider: ProviderKind,
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        token: SecretString,
    ) -> Self {
        Self {
            http,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            token,
        }
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/Accounts/{}/{}", self.base_url, self.account_sid, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.account_url(path);
        debug!(provider = %self.provider, operation, "GET {}", url);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.account_sid, Some(self.token.expose_secret()))
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, operation, e))?;

        read_json(self.provider, operation, response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.account_url(path);
        debug!(provider = %self.provider, operation, "POST {}", url);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(self.token.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, operation, e))?;

        read_json(self.provider, operation, response).await
    }

    /// List one owned number to prove the credentials work.
    pub(crate) async fn probe(&self) -> Result<(), ProviderError> {
        let _: IncomingNumbersPage = self
            .get(
                "test connection",
                "IncomingPhoneNumbers.json",
                &[("PageSize", "1".to_string())],
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn search_available(
        &self,
        search: &NumberSearch,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        let mut query = vec![
            ("SmsEnabled", "true".to_string()),
            ("PageSize", search.limit.to_string()),
        ];
        if let Some(area_code) = search.area_code_filter() {
            query.push(("AreaCode", area_code.to_string()));
        }
        if let Some(region) = search.region_filter() {
            query.push(("InRegion", region.to_string()));
        }

        let path = format!("AvailablePhoneNumbers/{}/Local.json", search.country_code());
        let page: AvailableNumbersPage = self.get("search numbers", &path, &query).await?;

        Ok(page
            .available_phone_numbers
            .into_iter()
            .map(|n| AvailableNumber {
                capabilities: n.capabilities.to_list(),
                phone_number: n.phone_number,
                friendly_name: n.friendly_name,
                locality: n.locality,
                region: n.region,
                country: n.iso_country,
                monthly_rate: None,
            })
            .collect())
    }

    pub(crate) async fn list_owned(&self) -> Result<Vec<OwnedNumber>, ProviderError> {
        let page: IncomingNumbersPage = self
            .get(
                "list numbers",
                "IncomingPhoneNumbers.json",
                &[("PageSize", "1000".to_string())],
            )
            .await?;

        Ok(page
            .incoming_phone_numbers
            .into_iter()
            .map(|n| OwnedNumber {
                capabilities: n.capabilities.to_list(),
                phone_number: n.phone_number,
                friendly_name: n.friendly_name,
                provider_sid: n.sid,
                purchased_at: n.date_created,
            })
            .collect())
    }

    pub(crate) async fn purchase(&self, phone_number: &str) -> Result<PurchasedNumber, ProviderError> {
        let number: LamlIncomingNumber = self
            .post_form(
                "purchase number",
                "IncomingPhoneNumbers.json",
                &[("PhoneNumber", phone_number.to_string())],
            )
            .await?;

        Ok(PurchasedNumber {
            capabilities: number.capabilities.to_list(),
            phone_number: number.phone_number,
            friendly_name: number.friendly_name,
            provider_sid: number.sid,
        })
    }

    pub(crate) async fn send(
        &self,
        request: &SendRequest,
        status_callback: Option<&str>,
    ) -> Result<SentMessage, ProviderError> {
        let mut form = vec![
            ("From", request.from.clone()),
            ("To", request.to.clone()),
            ("Body", request.body.clone()),
        ];
        if let Some(url) = status_callback {
            form.push(("StatusCallback", url.to_string()));
        }

        let message: LamlMessage = self.post_form("send message", "Messages.json", &form).await?;

        Ok(SentMessage {
            provider_message_id: message.sid,
            status: message.status.unwrap_or_else(|| "queued".to_string()),
            from: message.from.unwrap_or_else(|| request.from.clone()),
            to: message.to.unwrap_or_else(|| request.to.clone()),
            body: message.body.unwrap_or_else(|| request.body.clone()),
        })
    }
}
