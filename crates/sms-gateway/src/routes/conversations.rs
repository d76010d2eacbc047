//! Conversation routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::{conversation, message, Conversation, ConversationFlags, Message, PhoneNumber};
use fanout::ServerEvent;
use serde::Deserialize;

use crate::error::Result;
use crate::pipeline::{conversation_targets, outbound};
use crate::routes::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub body: String,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Conversation>>> {
    Ok(Json(state.tenancy.visible_conversations(&user).await?))
}

pub async fn messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Message>>> {
    let (conversation, _) = state.tenancy.authorize_conversation(&user, id).await?;
    Ok(Json(
        message::list_for_conversation(state.db.pool(), conversation.id).await?,
    ))
}

/// Reply in an existing conversation.
pub async fn send(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let (conversation, number) = state.tenancy.authorize_conversation(&user, id).await?;
    let sent =
        outbound::send_in_conversation(&state, &user, &number, &conversation, &request.body)
            .await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

/// Reset the unread counter.
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Conversation>> {
    let (conversation, number) = state.tenancy.authorize_conversation(&user, id).await?;
    let updated = conversation::mark_read(state.db.pool(), conversation.id).await?;
    announce(&state, &number, &updated);
    Ok(Json(updated))
}

/// Pin, archive, categorize or rename the contact.
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(flags): Json<ConversationFlags>,
) -> Result<Json<Conversation>> {
    let (conversation, number) = state.tenancy.authorize_conversation(&user, id).await?;
    let updated = conversation::update_flags(state.db.pool(), conversation.id, &flags).await?;
    announce(&state, &number, &updated);
    Ok(Json(updated))
}

fn announce(state: &AppState, number: &PhoneNumber, conversation: &Conversation) {
    state.hub.publish(
        &conversation_targets(number, conversation),
        &ServerEvent::ConversationUpdated {
            conversation: conversation.clone(),
        },
    );
}
