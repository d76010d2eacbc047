//! Payload shape detection and normalization.
//!
//! Shapes are tried in order; the first matcher that recognizes a payload
//! normalizes it. Supporting another provider means adding one matcher.

use database::MessageStatus;
use serde::Serialize;
use serde_json::Value;

use crate::e164::format_to_e164;
use crate::error::WebhookError;
use crate::payload::RawPayload;
use crate::status::map_provider_status;

/// Empty TwiML acknowledgement.
pub const EMPTY_TWIML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>";

/// Which family of payload a webhook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// Top-level `From`/`To`/`Body` fields (Twilio, SignalWire).
    FormFields,
    /// JSON with fields under `data.payload` (Telnyx).
    TelnyxEnvelope,
}

impl PayloadShape {
    /// Content type of the acknowledgement, if it has a body.
    pub fn ack_content_type(&self) -> Option<&'static str> {
        match self {
            PayloadShape::FormFields => Some("text/xml"),
            PayloadShape::TelnyxEnvelope => None,
        }
    }

    /// Body of the acknowledgement the provider expects.
    pub fn ack_body(&self) -> &'static str {
        match self {
            PayloadShape::FormFields => EMPTY_TWIML,
            PayloadShape::TelnyxEnvelope => "",
        }
    }
}

/// A normalized inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
    pub provider_message_id: Option<String>,
}

/// A normalized delivery status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub provider_message_id: String,
    pub raw_status: String,
    pub status: MessageStatus,
    pub error_code: Option<String>,
}

/// Recognizes and normalizes one payload family.
pub trait ShapeMatcher: Send + Sync {
    fn shape(&self) -> PayloadShape;

    fn matches(&self, payload: &RawPayload) -> bool;

    fn inbound(&self, payload: &RawPayload) -> Result<InboundSms, WebhookError>;

    fn status(&self, payload: &RawPayload) -> Result<StatusUpdate, WebhookError>;
}

/// Twilio and SignalWire: flat fields, form-encoded or JSON.
#[derive(Debug, Default)]
pub struct FormFieldsMatcher;

const FORM_MARKERS: &[&str] = &[
    "From",
    "To",
    "Body",
    "MessageSid",
    "SmsSid",
    "MessageStatus",
    "SmsStatus",
];

impl ShapeMatcher for FormFieldsMatcher {
    fn shape(&self) -> PayloadShape {
        PayloadShape::FormFields
    }

    fn matches(&self, payload: &RawPayload) -> bool {
        payload.first_field(FORM_MARKERS).is_some()
    }

    fn inbound(&self, payload: &RawPayload) -> Result<InboundSms, WebhookError> {
        let from = payload.field("From").ok_or(WebhookError::MissingField("From"))?;
        let to = payload.field("To").ok_or(WebhookError::MissingField("To"))?;

        Ok(InboundSms {
            from: format_to_e164(from),
            to: format_to_e164(to),
            body: raw_body(payload),
            provider_message_id: payload
                .first_field(&["MessageSid", "SmsSid", "SmsMessageSid"])
                .map(str::to_string),
        })
    }

    fn status(&self, payload: &RawPayload) -> Result<StatusUpdate, WebhookError> {
        let id = payload
            .first_field(&["MessageSid", "SmsSid"])
            .ok_or(WebhookError::MissingField("MessageSid"))?;
        let raw = payload
            .first_field(&["MessageStatus", "SmsStatus"])
            .ok_or(WebhookError::MissingField("MessageStatus"))?;

        Ok(StatusUpdate {
            provider_message_id: id.to_string(),
            raw_status: raw.to_string(),
            status: map_provider_status(raw),
            error_code: payload.field("ErrorCode").map(str::to_string),
        })
    }
}

/// The body is kept verbatim: whitespace is content.
fn raw_body(payload: &RawPayload) -> String {
    match payload {
        RawPayload::Form(fields) => fields.get("Body").cloned().unwrap_or_default(),
        RawPayload::Json(value) => value
            .get("Body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Telnyx: `{"data": {"event_type": ..., "payload": {...}}}`.
#[derive(Debug, Default)]
pub struct TelnyxEnvelopeMatcher;

impl TelnyxEnvelopeMatcher {
    fn payload<'a>(&self, payload: &'a RawPayload) -> Option<&'a Value> {
        payload
            .as_json()?
            .get("data")?
            .get("payload")
            .filter(|p| p.is_object())
    }
}

/// Telnyx endpoints are objects with `phone_number`, arrays of them, or bare strings.
fn telnyx_number(value: &Value) -> Option<&str> {
    let number = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => value.get("phone_number").and_then(Value::as_str),
        Value::Array(items) => items.first().and_then(telnyx_number),
        _ => None,
    };
    number.map(str::trim).filter(|s| !s.is_empty())
}

impl ShapeMatcher for TelnyxEnvelopeMatcher {
    fn shape(&self) -> PayloadShape {
        PayloadShape::TelnyxEnvelope
    }

    fn matches(&self, payload: &RawPayload) -> bool {
        self.payload(payload).is_some()
    }

    fn inbound(&self, payload: &RawPayload) -> Result<InboundSms, WebhookError> {
        let data = self
            .payload(payload)
            .ok_or(WebhookError::UnrecognizedPayload)?;

        let from = data
            .get("from")
            .and_then(telnyx_number)
            .ok_or(WebhookError::MissingField("data.payload.from"))?;
        let to = data
            .get("to")
            .and_then(telnyx_number)
            .ok_or(WebhookError::MissingField("data.payload.to"))?;

        Ok(InboundSms {
            from: format_to_e164(from),
            to: format_to_e164(to),
            body: data
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            provider_message_id: data
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        })
    }

    fn status(&self, payload: &RawPayload) -> Result<StatusUpdate, WebhookError> {
        let data = self
            .payload(payload)
            .ok_or(WebhookError::UnrecognizedPayload)?;

        let id = data
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(WebhookError::MissingField("data.payload.id"))?;

        // Per-recipient status wins over the message-level one.
        let raw = data
            .get("to")
            .and_then(Value::as_array)
            .and_then(|to| to.first())
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
            .or_else(|| data.get("status").and_then(Value::as_str))
            .ok_or(WebhookError::MissingField("data.payload.to[0].status"))?;

        let error_code = data
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("code"))
            .map(|code| match code {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        Ok(StatusUpdate {
            provider_message_id: id.to_string(),
            raw_status: raw.to_string(),
            status: map_provider_status(raw),
            error_code,
        })
    }
}

/// Ordered list of shape matchers.
pub struct Normalizer {
    matchers: Vec<Box<dyn ShapeMatcher>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FormFieldsMatcher),
            Box::new(TelnyxEnvelopeMatcher),
        ])
    }
}

impl Normalizer {
    pub fn new(matchers: Vec<Box<dyn ShapeMatcher>>) -> Self {
        Self { matchers }
    }

    /// The first matcher that recognizes the payload.
    pub fn detect(&self, payload: &RawPayload) -> Result<&dyn ShapeMatcher, WebhookError> {
        self.matchers
            .iter()
            .find(|m| m.matches(payload))
            .map(|m| &**m)
            .ok_or(WebhookError::UnrecognizedPayload)
    }

    pub fn inbound(&self, payload: &RawPayload) -> Result<(PayloadShape, InboundSms), WebhookError> {
        let matcher = self.detect(payload)?;
        Ok((matcher.shape(), matcher.inbound(payload)?))
    }

    pub fn status(&self, payload: &RawPayload) -> Result<(PayloadShape, StatusUpdate), WebhookError> {
        let matcher = self.detect(payload)?;
        Ok((matcher.shape(), matcher.status(payload)?))
    }
}
