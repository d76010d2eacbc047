//! Error types for provider adapters.

use database::ProviderKind;
use thiserror::Error;

use crate::vault::VaultError;

/// Errors raised by provider adapters and the adapter factory.
///
/// Messages carry the provider and operation but never credential values.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No usable gateway. Expected and user-actionable.
    #[error("{0}")]
    NotConfigured(String),

    /// The provider rejected the credentials.
    #[error("{provider} rejected the credentials during {operation}: {message}")]
    Authentication {
        provider: ProviderKind,
        operation: &'static str,
        message: String,
    },

    /// The provider answered with a non-retryable error.
    #[error("{provider} {operation} failed (HTTP {status}): {message}")]
    Api {
        provider: ProviderKind,
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// 5xx, rate limiting or a network failure.
    #[error("{provider} {operation} failed temporarily: {message}")]
    Transient {
        provider: ProviderKind,
        operation: &'static str,
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("{provider} {operation} timed out")]
    Timeout {
        provider: ProviderKind,
        operation: &'static str,
    },

    /// The provider answered 2xx with a body we could not interpret.
    #[error("{provider} {operation} returned an unexpected response: {message}")]
    InvalidResponse {
        provider: ProviderKind,
        operation: &'static str,
        message: String,
    },

    /// The stored provider kind is not supported.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Credentials are missing fields or are neither JSON nor a sealed envelope.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The sealed credential envelope could not be opened.
    #[error("credential decryption failed: {0}")]
    Decryption(#[from] VaultError),

    /// The shared HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl ProviderError {
    /// Whether the failure may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Transient { .. } | ProviderError::Timeout { .. }
        )
    }

    /// The provider involved, when known.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            ProviderError::Authentication { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::InvalidResponse { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}
