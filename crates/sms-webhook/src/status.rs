//! Provider status vocabularies mapped to the canonical set.

use database::MessageStatus;
use tracing::debug;

/// Map a raw provider status to a canonical one.
///
/// Unknown values map to `sent`.
pub fn map_provider_status(raw: &str) -> MessageStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "queued" | "accepted" | "scheduled" | "pending" => MessageStatus::Pending,
        "sending" | "sent" => MessageStatus::Sent,
        "delivered" | "received" => MessageStatus::Delivered,
        "undelivered" | "failed" | "delivery_failed" | "sending_failed" | "canceled" => {
            MessageStatus::Failed
        }
        "read" => MessageStatus::Read,
        other => {
            debug!(status = %other, "Unknown provider status, treating as sent");
            MessageStatus::Sent
        }
    }
}
