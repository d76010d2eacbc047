//! Per-provider credential shapes.
//!
//! Tokens are held in [`SecretString`] so `Debug` output and error messages
//! never contain them.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: SecretString,
}

#[derive(Debug, Clone)]
pub struct SignalWireCredentials {
    pub project_id: String,
    pub api_token: SecretString,
    /// Space host, e.g. `example.signalwire.com`.
    pub space_url: String,
}

#[derive(Debug, Clone)]
pub struct TelnyxCredentials {
    pub api_key: SecretString,
    pub messaging_profile_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTwilio {
    #[serde(default)]
    account_sid: String,
    #[serde(default)]
    auth_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignalWire {
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    api_token: String,
    #[serde(default)]
    space_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTelnyx {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    messaging_profile_id: Option<String>,
}

fn parse<T: for<'de> Deserialize<'de>>(value: &Value, provider: &str) -> Result<T, ProviderError> {
    // serde messages can quote the offending value, so they are not forwarded.
    T::deserialize(value).map_err(|_| {
        ProviderError::InvalidCredentials(format!("{provider} credentials are malformed"))
    })
}

impl TwilioCredentials {
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        let raw: RawTwilio = parse(value, "twilio")?;
        Ok(Self {
            account_sid: raw.account_sid.trim().to_string(),
            auth_token: SecretString::from(raw.auth_token.trim().to_string()),
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.expose_secret().is_empty()
    }
}

impl SignalWireCredentials {
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        let raw: RawSignalWire = parse(value, "signalwire")?;
        Ok(Self {
            project_id: raw.project_id.trim().to_string(),
            api_token: SecretString::from(raw.api_token.trim().to_string()),
            space_url: raw.space_url.trim().to_string(),
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.project_id.is_empty()
            && !self.api_token.expose_secret().is_empty()
            && !self.space_url.is_empty()
    }
}

impl TelnyxCredentials {
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        let raw: RawTelnyx = parse(value, "telnyx")?;
        Ok(Self {
            api_key: SecretString::from(raw.api_key.trim().to_string()),
            messaging_profile_id: raw
                .messaging_profile_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_twilio_parse_and_redact() {
        let creds = TwilioCredentials::from_json(&json!({
            "accountSid": "AC123",
            "authToken": "super-secret-token"
        }))
        .unwrap();

        assert!(creds.is_complete());
        assert_eq!(creds.auth_token.expose_secret(), "super-secret-token");
        assert!(!format!("{creds:?}").contains("super-secret-token"));
    }

    #[test]
    fn test_missing_fields_are_incomplete() {
        let creds = SignalWireCredentials::from_json(&json!({"projectId": "p"})).unwrap();
        assert!(!creds.is_complete());

        let telnyx = TelnyxCredentials::from_json(&json!({"apiKey": "  "})).unwrap();
        assert!(!telnyx.is_complete());
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let err = TwilioCredentials::from_json(&json!({"accountSid": 5, "authToken": "hunter2"}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidCredentials(_)));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_telnyx_blank_profile_is_none() {
        let creds =
            TelnyxCredentials::from_json(&json!({"apiKey": "KEY", "messagingProfileId": ""}))
                .unwrap();
        assert!(creds.messaging_profile_id.is_none());
    }
}
