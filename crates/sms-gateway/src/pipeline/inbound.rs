//! Inbound SMS: record the message and notify the tenant.

use database::{
    conversation, message, phone_number, Conversation, Message, MessageDirection, MessageStatus,
    NewMessage,
};
use fanout::ServerEvent;
use sms_webhook::InboundSms;
use tracing::info;

use super::conversation_targets;
use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// What happened to an inbound message.
#[derive(Debug)]
pub enum InboundOutcome {
    Recorded {
        conversation: Conversation,
        message: Message,
        created_conversation: bool,
    },
    /// A replay of a provider message id already stored. Nothing changed.
    Duplicate { conversation_id: i64 },
}

pub async fn record_inbound(state: &AppState, sms: &InboundSms) -> Result<InboundOutcome> {
    let pool = state.db.pool();

    let number = phone_number::find_by_number(pool, &sms.to)
        .await?
        .ok_or(GatewayError::NotFound("Phone number"))?;

    let (conversation, created_conversation) =
        conversation::find_or_create(pool, number.id, &sms.from, number.assigned_user_id).await?;

    let new_message = NewMessage {
        conversation_id: conversation.id,
        sender_id: None,
        content: sms.body.clone(),
        direction: MessageDirection::Inbound,
        status: MessageStatus::Delivered,
        provider_message_id: sms.provider_message_id.clone(),
    };
    let Some((message, conversation)) =
        message::record_inbound_message(pool, &new_message).await?
    else {
        info!(
            conversation_id = conversation.id,
            provider_message_id = ?sms.provider_message_id,
            "Ignoring replayed inbound message"
        );
        return Ok(InboundOutcome::Duplicate {
            conversation_id: conversation.id,
        });
    };

    info!(
        conversation_id = conversation.id,
        message_id = message.id,
        phone_number_id = number.id,
        "Inbound message recorded"
    );

    state.hub.publish(
        &conversation_targets(&number, &conversation),
        &ServerEvent::NewInboundMessage {
            conversation_id: conversation.id,
            message: message.clone(),
            conversation: conversation.clone(),
        },
    );

    Ok(InboundOutcome::Recorded {
        conversation,
        message,
        created_conversation,
    })
}
