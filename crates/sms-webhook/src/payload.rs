//! Raw webhook bodies.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::WebhookError;

/// A decoded but not yet interpreted webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// `application/x-www-form-urlencoded` fields.
    Form(HashMap<String, String>),
    /// A JSON document.
    Json(Value),
}

impl RawPayload {
    /// Decode a body using its content type, falling back to sniffing the
    /// first non-blank byte when the header is missing.
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, WebhookError> {
        let is_json = match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => true,
            Some(ct) if ct.to_ascii_lowercase().contains("form") => false,
            _ => body
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'{'),
        };

        if is_json {
            let value: Value = serde_json::from_slice(body)
                .map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
            Ok(RawPayload::Json(value))
        } else {
            let fields = url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            Ok(RawPayload::Form(fields))
        }
    }

    /// A top-level string field, trimmed, ignoring empty values.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match self {
            RawPayload::Form(fields) => fields.get(name).map(String::as_str),
            RawPayload::Json(value) => value.get(name).and_then(Value::as_str),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// First non-empty top-level field among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RawPayload::Json(value) => Some(value),
            RawPayload::Form(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        let payload = RawPayload::parse(
            Some("application/x-www-form-urlencoded"),
            b"From=%2B19998887777&To=%2B14155551234&Body=hi+there&MessageSid=SM1",
        )
        .unwrap();

        assert_eq!(payload.field("From"), Some("+19998887777"));
        assert_eq!(payload.field("Body"), Some("hi there"));
        assert_eq!(payload.field("Missing"), None);
    }

    #[test]
    fn test_parse_json_by_sniffing() {
        let payload = RawPayload::parse(None, br#"  {"data": {"payload": {}}}"#).unwrap();
        assert!(payload.as_json().is_some());
    }

    #[test]
    fn test_malformed_json() {
        let err = RawPayload::parse(Some("application/json"), b"{not json").unwrap_err();
        assert!(matches!(err, WebhookError::MalformedBody(_)));
    }

    #[test]
    fn test_first_field_skips_blank() {
        let payload = RawPayload::parse(None, b"MessageSid=&SmsSid=SM9").unwrap();
        assert_eq!(payload.first_field(&["MessageSid", "SmsSid"]), Some("SM9"));
    }
}
