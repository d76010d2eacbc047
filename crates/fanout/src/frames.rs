//! JSON frames exchanged over the real-time channel.

use database::{Conversation, Message, MessageStatus, PhoneNumber};
use serde::{Deserialize, Serialize};

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Auth { user_id: i64 },
    Subscribe { conversation_id: i64 },
    Unsubscribe { conversation_id: i64 },
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    AuthSuccess {
        user_id: i64,
    },
    AuthError {
        message: String,
    },
    Subscribed {
        conversation_id: i64,
    },
    Unsubscribed {
        conversation_id: i64,
    },
    Error {
        message: String,
    },
    /// An outbound message was recorded.
    NewMessage {
        conversation_id: i64,
        message: Message,
    },
    /// An inbound message arrived.
    NewInboundMessage {
        conversation_id: i64,
        message: Message,
        conversation: Conversation,
    },
    /// A delivery status changed.
    MessageStatus {
        conversation_id: i64,
        message_id: i64,
        status: MessageStatus,
        provider_message_id: Option<String>,
    },
    ConversationUpdated {
        conversation: Conversation,
    },
    PhoneAssignmentChanged {
        phone_number: PhoneNumber,
        previous_assignee_id: Option<i64>,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::AuthSuccess { .. } => "auth_success",
            ServerEvent::AuthError { .. } => "auth_error",
            ServerEvent::Subscribed { .. } => "subscribed",
            ServerEvent::Unsubscribed { .. } => "unsubscribed",
            ServerEvent::Error { .. } => "error",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::NewInboundMessage { .. } => "new_inbound_message",
            ServerEvent::MessageStatus { .. } => "message_status",
            ServerEvent::ConversationUpdated { .. } => "conversation_updated",
            ServerEvent::PhoneAssignmentChanged { .. } => "phone_assignment_changed",
        }
    }
}
