//! Error types for the fan-out hub.

use thiserror::Error;

use crate::hub::ConnectionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("connection is already authenticated as another user")]
    AlreadyAuthenticated,

    #[error("unknown user {0}")]
    UnknownUser(i64),

    #[error("access denied to conversation {0}")]
    AccessDenied(i64),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
