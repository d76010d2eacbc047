//! Multi-tenant SMS gateway.
//!
//! Tenants connect a Twilio, SignalWire or Telnyx account, buy and assign
//! numbers, and exchange messages with contacts. Provider webhooks are
//! verified, normalized and recorded, then fanned out to live WebSocket
//! sessions.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod tenancy;

pub use config::{Config, ConfigError};
pub use error::{GatewayError, Result};
pub use state::AppState;
pub use tenancy::{ProviderContext, TenancyPolicy};

use axum::Router;

/// The complete application router.
pub fn app(state: AppState) -> Router {
    routes::router().with_state(state)
}
