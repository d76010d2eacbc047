//! Application state.

use std::sync::Arc;

use database::Database;
use fanout::Hub;
use secrecy::ExposeSecret;
use sms_provider::{CredentialVault, ProviderFactory};
use sms_webhook::{Normalizer, SignatureSecrets};

use crate::config::Config;
use crate::error::GatewayError;
use crate::tenancy::TenancyPolicy;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<Hub>,
    pub tenancy: Arc<TenancyPolicy>,
    pub normalizer: Arc<Normalizer>,
    pub signatures: SignatureSecrets,
    /// External base URL, used to rebuild the URL providers signed.
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(
        db: Database,
        providers: ProviderFactory,
        signatures: SignatureSecrets,
        public_base_url: Option<String>,
    ) -> Self {
        let tenancy = Arc::new(TenancyPolicy::new(db.clone(), providers));
        let hub = Arc::new(Hub::new(tenancy.clone()));

        Self {
            db,
            hub,
            tenancy,
            normalizer: Arc::new(Normalizer::default()),
            signatures,
            public_base_url,
        }
    }

    /// Build the vault and provider factory from configuration.
    pub fn from_config(db: Database, config: &Config) -> Result<Self, GatewayError> {
        let vault = CredentialVault::from_settings(
            config.encryption_key.as_ref().map(|key| key.expose_secret()),
            config.production,
        )?;
        let providers = ProviderFactory::new(Arc::new(vault), config.provider_config())?;

        Ok(Self::new(
            db,
            providers,
            config.signature_secrets(),
            config.public_base_url.clone(),
        ))
    }

    pub fn providers(&self) -> &ProviderFactory {
        self.tenancy.providers()
    }
}
