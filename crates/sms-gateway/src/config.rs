//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use sms_provider::ProviderConfig;
use sms_webhook::SignatureSecrets;

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Public base URL providers reach this server on.
    pub public_base_url: Option<String>,
    /// Credential vault key (hex or base64).
    pub encryption_key: Option<SecretString>,
    /// Production disables the insecure fallback vault key.
    pub production: bool,
    /// Secret for `X-Twilio-Signature`.
    pub twilio_auth_token: Option<SecretString>,
    /// Secret for `X-SignalWire-Signature`.
    pub signalwire_signing_key: Option<SecretString>,
    /// Timeout for provider REST calls.
    pub provider_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GATEWAY_ADDR` | Server bind address | `127.0.0.1:5000` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:sms-gateway.db?mode=rwc` |
    /// | `PUBLIC_BASE_URL` | External base URL for callbacks | (none) |
    /// | `CREDENTIAL_ENCRYPTION_KEY` | 32-byte vault key, hex or base64 | (required in production) |
    /// | `APP_ENV` | `production` disables the fallback key | `development` |
    /// | `TWILIO_AUTH_TOKEN` | Twilio webhook signing secret | (none) |
    /// | `SIGNALWIRE_SIGNING_KEY` | SignalWire webhook signing secret | (none) |
    /// | `PROVIDER_TIMEOUT_SECS` | Provider request timeout | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let addr = var("GATEWAY_ADDR")
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite:sms-gateway.db?mode=rwc".to_string());

        let public_base_url = var("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string());

        let production = var("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let encryption_key = var("CREDENTIAL_ENCRYPTION_KEY").map(SecretString::from);
        if production && encryption_key.is_none() {
            return Err(ConfigError::MissingEncryptionKey);
        }

        let provider_timeout = match var("PROVIDER_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .map_err(|_| ConfigError::InvalidTimeout(secs.clone()))?,
            ),
            None => Duration::from_secs(30),
        };

        Ok(Self {
            addr,
            database_url,
            public_base_url,
            encryption_key,
            production,
            twilio_auth_token: var("TWILIO_AUTH_TOKEN").map(SecretString::from),
            signalwire_signing_key: var("SIGNALWIRE_SIGNING_KEY").map(SecretString::from),
            provider_timeout,
        })
    }

    /// Where providers should post delivery status updates.
    pub fn status_callback_url(&self) -> Option<String> {
        self.public_base_url
            .as_ref()
            .map(|base| format!("{base}/webhooks/sms/status"))
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let config = ProviderConfig::default().with_timeout(self.provider_timeout);
        match self.status_callback_url() {
            Some(url) => config.with_status_callback(url),
            None => config,
        }
    }

    pub fn signature_secrets(&self) -> SignatureSecrets {
        SignatureSecrets {
            twilio_auth_token: self.twilio_auth_token.clone(),
            signalwire_signing_key: self.signalwire_signing_key.clone(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid GATEWAY_ADDR format")]
    InvalidAddr,

    #[error("CREDENTIAL_ENCRYPTION_KEY is required when APP_ENV=production")]
    MissingEncryptionKey,

    #[error("Invalid PROVIDER_TIMEOUT_SECS: {0}")]
    InvalidTimeout(String),
}
