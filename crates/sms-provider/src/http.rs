//! HTTP plumbing shared by the adapters.

use std::time::Duration;

use database::ProviderKind;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ProviderError;

const MAX_DETAIL_CHARS: usize = 300;

/// Build the HTTP client shared by every adapter.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ProviderError::Client)
}

/// Classify a transport-level failure.
pub(crate) fn transport_error(
    provider: ProviderKind,
    operation: &'static str,
    err: reqwest::Error,
) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider,
            operation,
        }
    } else {
        // reqwest errors include the URL, which never carries credentials here.
        ProviderError::Transient {
            provider,
            operation,
            message: err.to_string(),
        }
    }
}

/// Map a non-2xx status to the error taxonomy.
pub(crate) fn status_error(
    provider: ProviderKind,
    operation: &'static str,
    status: StatusCode,
    detail: String,
) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication {
            provider,
            operation,
            message: detail,
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Transient {
            provider,
            operation,
            message: detail,
        },
        s if s.is_server_error() => ProviderError::Transient {
            provider,
            operation,
            message: format!("HTTP {}: {detail}", s.as_u16()),
        },
        s => ProviderError::Api {
            provider,
            operation,
            status: s.as_u16(),
            message: detail,
        },
    }
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    operation: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, operation, e))?;

    if !status.is_success() {
        return Err(status_error(provider, operation, status, error_detail(&body, status)));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        provider,
        operation,
        message: e.to_string(),
    })
}

/// Extract the provider's own error text from an error body.
///
/// Understands the LaML shape (`{"message": ...}`) and the Telnyx shape
/// (`{"errors": [{"title": ..., "detail": ...}]}`).
pub(crate) fn error_detail(body: &str, status: StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(first) = json
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            let title = first.get("title").and_then(Value::as_str);
            let detail = first.get("detail").and_then(Value::as_str);
            match (title, detail) {
                (Some(t), Some(d)) if t != d => return format!("{t}: {d}"),
                (_, Some(d)) => return d.to_string(),
                (Some(t), None) => return t.to_string(),
                (None, None) => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        trimmed.chars().take(MAX_DETAIL_CHARS).collect()
    }
}
