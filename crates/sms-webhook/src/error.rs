//! Error types for webhook normalization and verification.

use thiserror::Error;

/// A webhook body that cannot be turned into a canonical event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// No shape matcher recognized the payload.
    #[error("unrecognized webhook payload")]
    UnrecognizedPayload,

    /// The body could not be decoded at all.
    #[error("malformed webhook body: {0}")]
    MalformedBody(String),

    /// The shape was recognized but a required field is missing or empty.
    #[error("webhook payload is missing {0}")]
    MissingField(&'static str),
}

/// A signature header was present but could not be verified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The header is present but no secret is configured to check it.
    #[error("{header} present but no verification secret is configured")]
    MissingSecret { header: &'static str },

    /// The signature does not match the request.
    #[error("{header} does not match the request")]
    Mismatch { header: &'static str },
}
