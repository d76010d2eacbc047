//! Database models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role of a user inside a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    /// Tenant owner. An admin's tenant is themself.
    Admin,
    /// Team member created by an admin.
    Member,
}

/// A user of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
    /// The admin that created this user (None for admins).
    pub created_by: Option<i64>,
    pub created_at: String,
}

impl User {
    /// Whether this user owns a tenant.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// The tenant this user belongs to.
    ///
    /// Members without a creator are treated as their own tenant so a broken
    /// row never widens visibility.
    pub fn tenant_id(&self) -> i64 {
        match self.role {
            UserRole::Admin => self.id,
            UserRole::Member => self.created_by.unwrap_or(self.id),
        }
    }
}

/// Supported SMS providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Twilio,
    SignalWire,
    Telnyx,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Twilio,
        ProviderKind::SignalWire,
        ProviderKind::Telnyx,
    ];

    /// Stored/wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Twilio => "twilio",
            ProviderKind::SignalWire => "signalwire",
            ProviderKind::Telnyx => "telnyx",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored provider name is not one we support.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twilio" => Ok(ProviderKind::Twilio),
            "signalwire" => Ok(ProviderKind::SignalWire),
            "telnyx" => Ok(ProviderKind::Telnyx),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A tenant's credentialed connection to one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub id: i64,
    pub tenant_id: i64,
    /// Provider name as stored; parsed into [`ProviderKind`] by the factory.
    pub provider: String,
    pub name: String,
    /// Sealed credential envelope (or legacy plaintext JSON).
    #[serde(skip_serializing)]
    pub credentials: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A provider-owned number synced or purchased into the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    pub id: i64,
    /// E.164 value, globally unique.
    pub number: String,
    pub friendly_name: Option<String>,
    pub provider_sid: Option<String>,
    pub provider: String,
    /// Weak reference; cleared when the gateway is deleted.
    pub gateway_id: Option<i64>,
    pub tenant_id: i64,
    pub assigned_user_id: Option<i64>,
    /// Comma-separated capability list (e.g. `sms,voice,mms`).
    pub capabilities: String,
    pub is_active: bool,
    pub purchased_at: Option<String>,
    pub monthly_rate: Option<f64>,
}

impl PhoneNumber {
    /// Capabilities as a list.
    pub fn capability_list(&self) -> Vec<&str> {
        self.capabilities
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Fields for inserting or refreshing a phone number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoneNumber {
    pub number: String,
    pub friendly_name: Option<String>,
    pub provider_sid: Option<String>,
    pub provider: String,
    pub gateway_id: Option<i64>,
    pub tenant_id: i64,
    pub capabilities: Vec<String>,
    pub purchased_at: Option<String>,
    pub monthly_rate: Option<f64>,
}

/// A thread between one phone number and one external contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub phone_number_id: i64,
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub assigned_user_id: Option<i64>,
    pub category: Option<String>,
    pub unread_count: i64,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

/// Mutable presentation flags of a conversation. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationFlags {
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
    pub category: Option<String>,
    pub contact_name: Option<String>,
}

/// Direction of a message relative to the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Canonical, provider-agnostic delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
            MessageStatus::Read => "read",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic unit within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    /// None for inbound messages.
    pub sender_id: Option<i64>,
    pub content: String,
    pub direction: MessageDirection,
    pub status: MessageStatus,
    /// Join key for status webhooks.
    pub provider_message_id: Option<String>,
    pub created_at: String,
}

/// Fields for inserting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender_id: Option<i64>,
    pub content: String,
    pub direction: MessageDirection,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
}
