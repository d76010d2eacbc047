//! Error types for the gateway HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use database::DatabaseError;
use serde_json::json;
use sms_provider::{ProviderError, VaultError};
use sms_webhook::{SignatureError, WebhookError};
use thiserror::Error;

/// Errors returned by routes and pipelines.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or inactive gateway, or bad gateway input. User-actionable.
    #[error("{0}")]
    Configuration(String),

    /// No authenticated user on the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// Cross-tenant or cross-assignment access. The body stays generic.
    #[error("Access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid webhook signature")]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The message was stored as failed; the provider refused it.
    #[error("Message {message_id} could not be sent: {source}")]
    SendFailed {
        message_id: i64,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<VaultError> for GatewayError {
    fn from(err: VaultError) -> Self {
        GatewayError::Provider(ProviderError::Decryption(err))
    }
}

const UNUSABLE_CREDENTIALS: &str = "Stored gateway credentials could not be used";

fn provider_status(err: &ProviderError) -> StatusCode {
    match err {
        ProviderError::NotConfigured(_) | ProviderError::InvalidCredentials(_) => {
            StatusCode::BAD_REQUEST
        }
        ProviderError::Authentication { .. }
        | ProviderError::Api { .. }
        | ProviderError::Transient { .. }
        | ProviderError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
        ProviderError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ProviderError::UnknownProvider(_)
        | ProviderError::Decryption(_)
        | ProviderError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Configuration(_) | GatewayError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Webhook(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated | GatewayError::Signature(_) => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Provider(err) | GatewayError::SendFailed { source: err, .. } => {
                provider_status(err)
            }
            GatewayError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            GatewayError::Database(DatabaseError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            GatewayError::Signature(err) => tracing::warn!("Rejected webhook: {}", err),
            GatewayError::Configuration(msg) => tracing::debug!("Configuration error: {}", msg),
            GatewayError::Provider(ProviderError::NotConfigured(msg)) => {
                tracing::debug!("No gateway configured: {}", msg)
            }
            _ if status.is_server_error() => tracing::error!("Request failed: {}", self),
            _ => tracing::debug!("Request rejected ({}): {}", status, self),
        }

        // Internal details stay in the log.
        let message = match &self {
            GatewayError::Database(DatabaseError::NotFound { entity, .. }) => {
                format!("{entity} not found")
            }
            GatewayError::Database(DatabaseError::AlreadyExists { entity, .. }) => {
                format!("{entity} already exists")
            }
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                "Internal server error".to_string()
            }
            GatewayError::Provider(
                ProviderError::Decryption(_) | ProviderError::Client(_),
            ) => UNUSABLE_CREDENTIALS.to_string(),
            GatewayError::SendFailed {
                message_id,
                source: ProviderError::Decryption(_) | ProviderError::Client(_),
            } => format!("Message {message_id} could not be sent: {UNUSABLE_CREDENTIALS}"),
            other => other.to_string(),
        };

        let body = match &self {
            GatewayError::SendFailed { message_id, .. } => {
                json!({ "error": message, "messageId": message_id })
            }
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for gateway handlers.
pub type Result<T> = std::result::Result<T, GatewayError>;
