//! Route handlers for the gateway.

pub mod conversations;
pub mod gateways;
pub mod health;
pub mod identity;
pub mod messages;
pub mod numbers;
pub mod webhooks;
pub mod ws;

use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Provider webhooks
        .route("/webhooks/sms/inbound", post(webhooks::inbound))
        .route("/webhooks/sms/status", post(webhooks::status))
        // Real-time channel
        .route("/ws", get(ws::upgrade))
        // Gateways
        .route("/api/gateways", get(gateways::list).post(gateways::create))
        .route("/api/gateways/test", post(gateways::test))
        .route("/api/gateways/:id/activate", post(gateways::activate))
        .route("/api/gateways/:id", axum::routing::delete(gateways::remove))
        // Phone numbers
        .route("/api/phone-numbers", get(numbers::list))
        .route("/api/phone-numbers/available", get(numbers::available))
        .route("/api/phone-numbers/purchase", post(numbers::purchase))
        .route("/api/phone-numbers/sync", post(numbers::sync))
        .route("/api/phone-numbers/:id/assign", put(numbers::assign))
        // Conversations
        .route("/api/conversations", get(conversations::list))
        .route("/api/conversations/:id", patch(conversations::update))
        .route(
            "/api/conversations/:id/messages",
            get(conversations::messages).post(conversations::send),
        )
        .route("/api/conversations/:id/read", post(conversations::mark_read))
        // Messages
        .route("/api/messages", post(messages::send))
}
