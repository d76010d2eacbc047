//! Delivery status updates.

use database::{message, Message};
use fanout::{ServerEvent, Target};
use sms_webhook::StatusUpdate;
use tracing::{info, warn};

use crate::error::Result;
use crate::state::AppState;

/// Apply a status update in arrival order. An unknown provider message id is
/// a no-op and returns `None`.
pub async fn apply_status(state: &AppState, update: &StatusUpdate) -> Result<Option<Message>> {
    let pool = state.db.pool();

    let Some(existing) = message::find_by_provider_id(pool, &update.provider_message_id).await? else {
        info!(
            provider_message_id = %update.provider_message_id,
            raw_status = %update.raw_status,
            "Status update for unknown message"
        );
        return Ok(None);
    };

    if let Some(code) = &update.error_code {
        warn!(
            message_id = existing.id,
            provider_message_id = %update.provider_message_id,
            error_code = %code,
            "Provider reported a delivery error"
        );
    }

    let updated = message::update_status(pool, existing.id, update.status).await?;

    let mut targets = vec![Target::Conversation(updated.conversation_id)];
    if let Some(sender) = updated.sender_id {
        targets.push(Target::User(sender));
    }
    state.hub.publish(
        &targets,
        &ServerEvent::MessageStatus {
            conversation_id: updated.conversation_id,
            message_id: updated.id,
            status: updated.status,
            provider_message_id: updated.provider_message_id.clone(),
        },
    );

    Ok(Some(updated))
}
