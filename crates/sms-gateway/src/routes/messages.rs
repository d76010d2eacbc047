//! Outbound messages to a contact.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use database::Message;
use serde::Deserialize;

use crate::error::Result;
use crate::pipeline::outbound;
use crate::routes::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRequest {
    /// The sending number; must be visible to the caller.
    pub phone_number_id: i64,
    pub to: String,
    pub body: String,
}

/// Send from a visible number, opening the conversation when needed.
pub async fn send(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<NewMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let sent = outbound::send_to_contact(
        &state,
        &user,
        request.phone_number_id,
        &request.to,
        &request.body,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(sent)))
}
