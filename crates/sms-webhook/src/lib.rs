//! Webhook normalization for the SMS gateway.
//!
//! Providers post inbound messages and delivery updates in incompatible
//! shapes. This crate decodes the raw body ([`RawPayload`]), verifies any
//! signature headers ([`SignatureSecrets`]), and turns the payload into an
//! [`InboundSms`] or [`StatusUpdate`] through an ordered list of
//! [`ShapeMatcher`]s.

pub mod e164;
pub mod error;
pub mod payload;
pub mod shape;
pub mod signature;
pub mod status;

pub use e164::{format_to_e164, is_plausible_e164};
pub use error::{SignatureError, WebhookError};
pub use payload::RawPayload;
pub use shape::{
    FormFieldsMatcher, InboundSms, Normalizer, PayloadShape, ShapeMatcher, StatusUpdate,
    TelnyxEnvelopeMatcher, EMPTY_TWIML,
};
pub use signature::{
    signalwire_signature, twilio_signature, verify_signalwire, verify_twilio, SignatureCheck,
    SignatureSecrets, SignedRequest, SIGNALWIRE_SIGNATURE_HEADER, TWILIO_SIGNATURE_HEADER,
};
pub use status::map_provider_status;
