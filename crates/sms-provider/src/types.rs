//! Provider-neutral request and response types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// What a number can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Sms,
    Voice,
    Mms,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Sms => "sms",
            Capability::Voice => "voice",
            Capability::Mms => "mms",
        }
    }

    /// Parse a provider feature name (`sms`, `SMS`, `voice`, `mms`, ...).
    pub fn from_feature(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sms" => Some(Capability::Sms),
            "voice" => Some(Capability::Voice),
            "mms" => Some(Capability::Mms),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a capability list from boolean flags.
///
/// Never returns an empty list: when the provider reports nothing the number
/// is assumed to support SMS and voice.
pub fn capabilities_from_flags(sms: bool, voice: bool, mms: bool) -> Vec<Capability> {
    let mut caps = Vec::with_capacity(3);
    if sms {
        caps.push(Capability::Sms);
    }
    if voice {
        caps.push(Capability::Voice);
    }
    if mms {
        caps.push(Capability::Mms);
    }
    normalize_capabilities(caps)
}

/// Deduplicate and apply the `sms, voice` default for empty lists.
pub fn normalize_capabilities(caps: Vec<Capability>) -> Vec<Capability> {
    let mut out = Vec::with_capacity(caps.len());
    for cap in caps {
        if !out.contains(&cap) {
            out.push(cap);
        }
    }
    if out.is_empty() {
        out = vec![Capability::Sms, Capability::Voice];
    }
    out
}

/// Criteria for searching purchasable numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberSearch {
    pub area_code: Option<String>,
    /// ISO country code. Defaults to `US`.
    #[serde(default = "default_country")]
    pub country: String,
    pub region: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_country() -> String {
    "US".to_string()
}

fn default_limit() -> u32 {
    20
}

impl Default for NumberSearch {
    fn default() -> Self {
        Self {
            area_code: None,
            country: default_country(),
            region: None,
            limit: default_limit(),
        }
    }
}

impl NumberSearch {
    pub fn area_code(mut self, area_code: impl Into<String>) -> Self {
        self.area_code = Some(area_code.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Area code with blanks treated as absent.
    pub(crate) fn area_code_filter(&self) -> Option<&str> {
        self.area_code.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub(crate) fn region_filter(&self) -> Option<&str> {
        self.region.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub(crate) fn country_code(&self) -> String {
        let country = self.country.trim();
        if country.is_empty() {
            default_country()
        } else {
            country.to_ascii_uppercase()
        }
    }
}

/// A number offered for purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableNumber {
    pub phone_number: String,
    pub friendly_name: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub capabilities: Vec<Capability>,
    pub monthly_rate: Option<f64>,
}

/// A number the account already owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNumber {
    pub phone_number: String,
    pub friendly_name: Option<String>,
    /// Provider-side id of the number.
    pub provider_sid: String,
    pub capabilities: Vec<Capability>,
    pub purchased_at: Option<String>,
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedNumber {
    pub phone_number: String,
    pub friendly_name: Option<String>,
    pub provider_sid: String,
    pub capabilities: Vec<Capability>,
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    pub body: String,
    /// Overrides the configured status callback URL.
    pub status_callback_url: Option<String>,
}

impl SendRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            body: body.into(),
            status_callback_url: None,
        }
    }

    pub fn with_status_callback(mut self, url: impl Into<String>) -> Self {
        self.status_callback_url = Some(url.into());
        self
    }
}

/// The provider's acknowledgement of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub provider_message_id: String,
    /// Raw provider status (`queued`, `accepted`, ...).
    pub status: String,
    pub from: String,
    pub to: String,
    pub body: String,
}

/// Outcome of a connection test. Never an error; render `error` directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionTest {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Turn a probe result into a user-facing outcome.
    pub fn from_result(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(ProviderError::Authentication {
                provider, message, ..
            }) => Self::failed(format!(
                "Authentication failed for {provider}: {message}. Check the account credentials."
            )),
            Err(ProviderError::Timeout { provider, .. }) => {
                Self::failed(format!("Connection to {provider} timed out"))
            }
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use database::ProviderKind;

    use super::*;

    #[test]
    fn test_empty_flags_default_to_sms_voice() {
        assert_eq!(
            capabilities_from_flags(false, false, false),
            vec![Capability::Sms, Capability::Voice]
        );
        assert_eq!(capabilities_from_flags(true, false, true), vec![Capability::Sms, Capability::Mms]);
    }

    #[test]
    fn test_normalize_dedups() {
        let caps = normalize_capabilities(vec![Capability::Sms, Capability::Sms, Capability::Mms]);
        assert_eq!(caps, vec![Capability::Sms, Capability::Mms]);
    }

    #[test]
    fn test_search_defaults_to_us() {
        let search: NumberSearch = serde_json::from_str(r#"{"areaCode":"415"}"#).unwrap();
        assert_eq!(search.country, "US");
        assert_eq!(search.area_code_filter(), Some("415"));

        let blank = NumberSearch {
            country: " ".to_string(),
            area_code: Some("".to_string()),
            ..NumberSearch::default()
        };
        assert_eq!(blank.country_code(), "US");
        assert_eq!(blank.area_code_filter(), None);
    }

    #[test]
    fn test_connection_test_messages() {
        let auth = ConnectionTest::from_result(Err(ProviderError::Authentication {
            provider: ProviderKind::Telnyx,
            operation: "test connection",
            message: "Authentication failed".to_string(),
        }));
        assert!(!auth.success);
        assert!(auth.error.unwrap().contains("Authentication failed for telnyx"));

        let timeout = ConnectionTest::from_result(Err(ProviderError::Timeout {
            provider: ProviderKind::Twilio,
            operation: "test connection",
        }));
        assert_eq!(timeout.error.as_deref(), Some("Connection to twilio timed out"));

        let json = serde_json::to_value(ConnectionTest::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"success": true}));
    }
}
