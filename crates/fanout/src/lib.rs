//! Real-time fan-out for the SMS gateway.
//!
//! The [`Hub`] tracks live connections by conversation and by user and
//! pushes [`ServerEvent`]s to them. Callers decide who receives an event;
//! the hub only authorizes subscriptions, through a [`SubscriptionPolicy`].

pub mod error;
pub mod frames;
pub mod hub;

pub use error::HubError;
pub use frames::{ClientMessage, ServerEvent};
pub use hub::{ConnectionId, Hub, SubscriptionPolicy, Target};
