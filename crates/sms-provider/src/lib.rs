//! SMS provider adapters for the gateway.
//!
//! One [`SmsProvider`] implementation per provider hides each REST API's auth
//! scheme, encoding and response shapes. [`ProviderFactory`] turns a stored
//! [`database::Gateway`] into an adapter, opening its sealed credentials with
//! the [`CredentialVault`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sms_provider::{CredentialVault, ProviderConfig, ProviderFactory, SendRequest};
//!
//! # async fn run(gateway: database::Gateway) -> Result<(), Box<dyn std::error::Error>> {
//! let vault = Arc::new(CredentialVault::from_settings(None, false)?);
//! let factory = ProviderFactory::new(vault, ProviderConfig::default())?;
//!
//! let adapter = factory.create(&gateway)?;
//! let sent = adapter
//!     .send_message(&SendRequest::new("+14155551234", "+19998887777", "hello"))
//!     .await?;
//! println!("{} accepted as {}", adapter.name(), sent.provider_message_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod http;
mod laml;
pub mod provider;
pub mod retry;
pub mod signalwire;
pub mod telnyx;
pub mod twilio;
pub mod types;
pub mod unconfigured;
pub mod vault;

pub use config::ProviderConfig;
pub use credentials::{SignalWireCredentials, TelnyxCredentials, TwilioCredentials};
pub use error::ProviderError;
pub use factory::ProviderFactory;
pub use provider::SmsProvider;
pub use retry::RetryPolicy;
pub use signalwire::SignalWireProvider;
pub use telnyx::TelnyxProvider;
pub use twilio::TwilioProvider;
pub use types::{
    AvailableNumber, Capability, ConnectionTest, NumberSearch, OwnedNumber, PurchasedNumber,
    SendRequest, SentMessage,
};
pub use unconfigured::{UnconfiguredProvider, NOT_CONFIGURED_MESSAGE};
pub use vault::{CredentialVault, SealedEnvelope, VaultError};
