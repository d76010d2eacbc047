//! The authenticated user of a request.
//!
//! Sessions live in front of this service, which forwards the user id in the
//! `X-User-Id` header.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use database::{user, User};

use crate::error::GatewayError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the calling user. Missing or unknown users get 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id: i64 = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .ok_or(GatewayError::Unauthenticated)?;

        user::find_user(state.db.pool(), user_id)
            .await?
            .map(CurrentUser)
            .ok_or(GatewayError::Unauthenticated)
    }
}
