//! Resolves stored gateways to adapters.
//!
//! This is the only place that branches on the provider kind.

use std::sync::Arc;

use database::{Gateway, ProviderKind};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::credentials::{SignalWireCredentials, TelnyxCredentials, TwilioCredentials};
use crate::error::ProviderError;
use crate::http::build_client;
use crate::provider::SmsProvider;
use crate::signalwire::SignalWireProvider;
use crate::telnyx::TelnyxProvider;
use crate::twilio::TwilioProvider;
use crate::unconfigured::UnconfiguredProvider;
use crate::vault::{CredentialVault, SealedEnvelope, VaultError};

/// Builds adapters from gateway records.
#[derive(Debug, Clone)]
pub struct ProviderFactory {
    vault: Arc<CredentialVault>,
    config: ProviderConfig,
    http: Client,
}

impl ProviderFactory {
    pub fn new(vault: Arc<CredentialVault>, config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = build_client(config.timeout)?;
        Ok(Self {
            vault,
            config,
            http,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the adapter for a stored gateway.
    pub fn create(&self, gateway: &Gateway) -> Result<Arc<dyn SmsProvider>, ProviderError> {
        let kind: ProviderKind = gateway
            .provider
            .parse()
            .map_err(|e: database::UnknownProvider| ProviderError::UnknownProvider(e.0))?;
        let credentials = self.open_credentials(&gateway.credentials)?;

        debug!(gateway_id = gateway.id, provider = %kind, "Creating provider adapter");
        self.build(kind, &credentials)
    }

    /// Build an adapter from plaintext credentials, e.g. before a gateway is saved.
    pub fn build(
        &self,
        kind: ProviderKind,
        credentials: &Value,
    ) -> Result<Arc<dyn SmsProvider>, ProviderError> {
        if !credentials.is_object() {
            return Err(ProviderError::InvalidCredentials(
                "credentials must be a JSON object".to_string(),
            ));
        }

        let http = self.http.clone();
        let provider: Arc<dyn SmsProvider> = match kind {
            ProviderKind::Twilio => Arc::new(TwilioProvider::new(
                http,
                TwilioCredentials::from_json(credentials)?,
                &self.config,
            )),
            ProviderKind::SignalWire => Arc::new(SignalWireProvider::new(
                http,
                SignalWireCredentials::from_json(credentials)?,
                &self.config,
            )),
            ProviderKind::Telnyx => Arc::new(TelnyxProvider::new(
                http,
                TelnyxCredentials::from_json(credentials)?,
                &self.config,
            )),
        };
        Ok(provider)
    }

    /// The adapter used when a tenant has no active gateway.
    pub fn unconfigured(&self) -> Arc<dyn SmsProvider> {
        Arc::new(UnconfiguredProvider::new())
    }

    /// Encrypt credentials for storage.
    pub fn seal_credentials(&self, credentials: &Value) -> Result<String, ProviderError> {
        let plaintext = serde_json::to_string(credentials)
            .map_err(|e| ProviderError::InvalidCredentials(e.to_string()))?;
        Ok(self.vault.encrypt(&plaintext)?)
    }

    /// Decrypt a stored credential blob, accepting legacy plaintext JSON.
    ///
    /// A value carrying envelope fields is always opened with the vault and
    /// never read as plaintext, even if opening fails.
    pub fn open_credentials(&self, stored: &str) -> Result<Value, ProviderError> {
        let value: Value = serde_json::from_str(stored).map_err(|_| {
            ProviderError::InvalidCredentials(
                "stored credentials are neither JSON nor a sealed envelope".to_string(),
            )
        })?;

        if SealedEnvelope::is_envelope(&value) {
            let envelope: SealedEnvelope = serde_json::from_value(value)
                .map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;
            let plaintext = self.vault.open(&envelope)?;
            return serde_json::from_slice(&plaintext).map_err(|_| {
                ProviderError::InvalidCredentials("decrypted credentials are not JSON".to_string())
            });
        }

        if value.is_object() {
            debug!("Using legacy plaintext credentials");
            return Ok(value);
        }

        Err(ProviderError::InvalidCredentials(
            "stored credentials are neither JSON nor a sealed envelope".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn factory() -> ProviderFactory {
        ProviderFactory::new(
            Arc::new(CredentialVault::new([3u8; 32])),
            ProviderConfig::default(),
        )
        .unwrap()
    }

    fn gateway(provider: &str, credentials: String) -> Gateway {
        Gateway {
            id: 1,
            tenant_id: 1,
            provider: provider.to_string(),
            name: "Main".to_string(),
            credentials,
            is_active: true,
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_create_from_sealed_credentials() {
        let factory = factory();
        let sealed = factory
            .seal_credentials(&json!({"apiKey": "KEY123"}))
            .unwrap();
        assert!(!sealed.contains("KEY123"));

        let adapter = factory.create(&gateway("telnyx", sealed)).unwrap();
        assert_eq!(adapter.kind(), Some(ProviderKind::Telnyx));
        assert!(adapter.is_configured());
    }

    #[test]
    fn test_legacy_plaintext_credentials() {
        let adapter = factory()
            .create(&gateway(
                "Twilio",
                r#"{"accountSid":"AC1","authToken":"tok"}"#.to_string(),
            ))
            .unwrap();
        assert_eq!(adapter.kind(), Some(ProviderKind::Twilio));
        assert!(adapter.is_configured());
    }

    #[test]
    fn test_unknown_provider() {
        let err = factory()
            .create(&gateway("nexmo", r#"{"apiKey":"k"}"#.to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(ref p) if p == "nexmo"));
    }

    #[test]
    fn test_garbage_credentials() {
        let factory = factory();
        for stored in ["not json", "\"a string\"", "[1,2]"] {
            let err = factory.create(&gateway("telnyx", stored.to_string())).err().unwrap();
            assert!(matches!(err, ProviderError::InvalidCredentials(_)), "{stored}");
        }
    }

    #[test]
    fn test_tampered_envelope_is_not_treated_as_plaintext() {
        let factory = factory();
        let sealed = factory.seal_credentials(&json!({"apiKey": "KEY123"})).unwrap();
        let mut envelope: Value = serde_json::from_str(&sealed).unwrap();
        envelope["tag"] = json!(hex::encode([0u8; 16]));

        let err = factory
            .create(&gateway("telnyx", envelope.to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Decryption(VaultError::Authentication)));
    }

    #[test]
    fn test_envelope_from_other_key_fails() {
        let sealed = factory().seal_credentials(&json!({"apiKey": "KEY"})).unwrap();
        let other = ProviderFactory::new(
            Arc::new(CredentialVault::new([4u8; 32])),
            ProviderConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            other.create(&gateway("telnyx", sealed)).err().unwrap(),
            ProviderError::Decryption(_)
        ));
    }

    #[test]
    fn test_unconfigured_adapter() {
        let adapter = factory().unconfigured();
        assert!(!adapter.is_configured());
        assert_eq!(adapter.name(), "unconfigured");
    }
}
