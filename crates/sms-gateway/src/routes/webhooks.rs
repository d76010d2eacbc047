//! Provider webhooks.
//!
//! Every request is signature-checked against the raw body before the
//! payload is parsed.

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sms_webhook::{
    PayloadShape, RawPayload, SignatureCheck, SignedRequest, SIGNALWIRE_SIGNATURE_HEADER,
    TWILIO_SIGNATURE_HEADER,
};
use tracing::debug;

use crate::error::Result;
use crate::pipeline::{inbound, status as status_pipeline};
use crate::state::AppState;

/// Inbound message webhook.
pub async fn inbound(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let payload = verified_payload(&state, uri.path_and_query().map(|p| p.as_str()), &headers, &body)?;
    let (shape, sms) = state.normalizer.inbound(&payload)?;

    inbound::record_inbound(&state, &sms).await?;
    Ok(acknowledge(shape))
}

/// Delivery status webhook. Unknown message ids are acknowledged.
pub async fn status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let payload = verified_payload(&state, uri.path_and_query().map(|p| p.as_str()), &headers, &body)?;
    let (shape, update) = state.normalizer.status(&payload)?;

    status_pipeline::apply_status(&state, &update).await?;
    Ok(acknowledge(shape))
}

fn verified_payload(
    state: &AppState,
    path: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<RawPayload> {
    let url = signed_url(state, path.unwrap_or("/"), headers);
    let request = SignedRequest {
        url: &url,
        body,
        twilio_signature: header_str(headers, TWILIO_SIGNATURE_HEADER),
        signalwire_signature: header_str(headers, SIGNALWIRE_SIGNATURE_HEADER),
    };

    if state.signatures.verify(&request)? == SignatureCheck::Skipped {
        debug!(url = %url, "Unsigned webhook");
    }

    Ok(RawPayload::parse(header_str(headers, CONTENT_TYPE.as_str()), body)?)
}

/// The URL the provider signed: the public base URL when configured,
/// otherwise rebuilt from the request headers.
fn signed_url(state: &AppState, path: &str, headers: &HeaderMap) -> String {
    if let Some(base) = &state.public_base_url {
        return format!("{base}{path}");
    }

    let scheme = header_str(headers, "x-forwarded-proto").unwrap_or("http");
    let host = header_str(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, HOST.as_str()))
        .unwrap_or("localhost");
    format!("{scheme}://{host}{path}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn acknowledge(shape: PayloadShape) -> Response {
    match shape.ack_content_type() {
        Some(content_type) => (
            StatusCode::OK,
            [(CONTENT_TYPE, content_type)],
            shape.ack_body(),
        )
            .into_response(),
        None => StatusCode::OK.into_response(),
    }
}
