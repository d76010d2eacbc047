//! Outbound SMS.
//!
//! The message row is written as `pending` before the provider is resolved or
//! called, so an attempted send is never lost: any provider failure marks it
//! `failed`.

use database::{
    conversation, message, Conversation, Message, MessageDirection, MessageStatus, NewMessage,
    PhoneNumber, User,
};
use fanout::ServerEvent;
use sms_provider::SendRequest;
use sms_webhook::{format_to_e164, map_provider_status};
use tracing::{info, warn};

use super::conversation_targets;
use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// Send a message in an existing conversation. Access is checked by the caller.
pub async fn send_in_conversation(
    state: &AppState,
    sender: &User,
    number: &PhoneNumber,
    conversation: &Conversation,
    body: &str,
) -> Result<Message> {
    require_body(body)?;

    let pool = state.db.pool();
    let pending = message::insert_message(
        pool,
        &NewMessage {
            conversation_id: conversation.id,
            sender_id: Some(sender.id),
            content: body.to_string(),
            direction: MessageDirection::Outbound,
            status: MessageStatus::Pending,
            provider_message_id: None,
        },
    )
    .await?;

    // Resolving the adapter can fail on stored credentials; the row exists by now.
    let adapter = match state.tenancy.provider_for_number(number).await {
        Ok(adapter) => adapter,
        Err(GatewayError::Provider(err)) => {
            warn!(message_id = pending.id, "No usable provider for send: {}", err);
            let stored =
                message::record_send_result(pool, pending.id, None, MessageStatus::Failed).await?;
            publish_sent(state, number, conversation, body, &stored).await?;
            return Err(GatewayError::SendFailed {
                message_id: stored.id,
                source: err,
            });
        }
        Err(other) => {
            let stored =
                message::record_send_result(pool, pending.id, None, MessageStatus::Failed).await?;
            publish_sent(state, number, conversation, body, &stored).await?;
            return Err(other);
        }
    };

    let request = SendRequest::new(&number.number, &conversation.contact_number, body);
    let outcome = adapter.send_message(&request).await;

    let (stored, failure) = match outcome {
        Ok(sent) => {
            let status = map_provider_status(&sent.status);
            let stored = message::record_send_result(
                pool,
                pending.id,
                Some(&sent.provider_message_id),
                status,
            )
            .await?;
            info!(
                message_id = stored.id,
                provider = adapter.name(),
                provider_message_id = %sent.provider_message_id,
                "Message handed to provider"
            );
            (stored, None)
        }
        Err(err) => {
            warn!(message_id = pending.id, provider = adapter.name(), "Send failed: {}", err);
            let stored =
                message::record_send_result(pool, pending.id, None, MessageStatus::Failed).await?;
            (stored, Some(err))
        }
    };

    publish_sent(state, number, conversation, body, &stored).await?;

    match failure {
        None => Ok(stored),
        Some(source) => Err(GatewayError::SendFailed {
            message_id: stored.id,
            source,
        }),
    }
}

/// Bump the conversation and fan the stored message out, whatever its status.
async fn publish_sent(
    state: &AppState,
    number: &PhoneNumber,
    conversation: &Conversation,
    body: &str,
    stored: &Message,
) -> Result<()> {
    let conversation = conversation::record_outbound(state.db.pool(), conversation.id, body).await?;
    state.hub.publish(
        &conversation_targets(number, &conversation),
        &ServerEvent::NewMessage {
            conversation_id: conversation.id,
            message: stored.clone(),
        },
    );
    Ok(())
}

/// Send from one of the sender's visible numbers to a contact, opening the
/// conversation when needed.
pub async fn send_to_contact(
    state: &AppState,
    sender: &User,
    phone_number_id: i64,
    to: &str,
    body: &str,
) -> Result<Message> {
    require_body(body)?;
    let number = state.tenancy.authorize_number(sender, phone_number_id).await?;

    if to.chars().filter(char::is_ascii_digit).count() == 0 {
        return Err(GatewayError::BadRequest("Recipient number is required".to_string()));
    }
    let contact = format_to_e164(to);

    let (conversation, _) =
        conversation::find_or_create(state.db.pool(), number.id, &contact, number.assigned_user_id)
            .await?;

    send_in_conversation(state, sender, &number, &conversation, body).await
}

fn require_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(GatewayError::BadRequest("Message body is required".to_string()));
    }
    Ok(())
}
