//! Webhook signature verification.
//!
//! A missing signature header skips that check. A present header is a hard
//! failure when no secret is configured or the signature does not match.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use sha2::Sha256;
use tracing::warn;

use crate::error::SignatureError;

pub const TWILIO_SIGNATURE_HEADER: &str = "X-Twilio-Signature";
pub const SIGNALWIRE_SIGNATURE_HEADER: &str = "X-SignalWire-Signature";

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Server-side secrets for each signature scheme.
#[derive(Debug, Clone, Default)]
pub struct SignatureSecrets {
    pub twilio_auth_token: Option<SecretString>,
    pub signalwire_signing_key: Option<SecretString>,
}

/// The parts of a webhook request that signatures cover.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    /// Full public URL the provider posted to.
    pub url: &'a str,
    pub body: &'a [u8],
    pub twilio_signature: Option<&'a str>,
    pub signalwire_signature: Option<&'a str>,
}

/// Result of a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// At least one signature header was present and valid.
    Verified,
    /// No signature header was present.
    Skipped,
}

impl SignatureSecrets {
    /// Check every signature header present on the request.
    pub fn verify(&self, request: &SignedRequest<'_>) -> Result<SignatureCheck, SignatureError> {
        let mut checked = false;

        if let Some(signature) = request.twilio_signature {
            let header = TWILIO_SIGNATURE_HEADER;
            let Some(token) = &self.twilio_auth_token else {
                warn!(header, "Signed webhook received but no Twilio auth token is configured");
                return Err(SignatureError::MissingSecret { header });
            };
            if !verify_twilio(token.expose_secret(), request.url, request.body, signature) {
                warn!(header, url = %request.url, "Webhook signature mismatch");
                return Err(SignatureError::Mismatch { header });
            }
            checked = true;
        }

        if let Some(signature) = request.signalwire_signature {
            let header = SIGNALWIRE_SIGNATURE_HEADER;
            let Some(key) = &self.signalwire_signing_key else {
                warn!(header, "Signed webhook received but no SignalWire signing key is configured");
                return Err(SignatureError::MissingSecret { header });
            };
            if !verify_signalwire(key.expose_secret(), request.body, signature) {
                warn!(header, url = %request.url, "Webhook signature mismatch");
                return Err(SignatureError::Mismatch { header });
            }
            checked = true;
        }

        Ok(if checked {
            SignatureCheck::Verified
        } else {
            SignatureCheck::Skipped
        })
    }
}

/// Base64 HMAC-SHA1 over the URL followed by the raw body.
pub fn twilio_signature(auth_token: &str, url: &str, body: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(url.as_bytes());
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Hex HMAC-SHA256 over the raw body.
pub fn signalwire_signature(signing_key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of an `X-Twilio-Signature` value.
pub fn verify_twilio(auth_token: &str, url: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(auth_token.as_bytes()) else {
        return false;
    };
    mac.update(url.as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Constant-time check of an `X-SignalWire-Signature` value.
pub fn verify_signalwire(signing_key: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(signing_key.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
