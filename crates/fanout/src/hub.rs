//! Connection registry and publish/subscribe.
//!
//! Three concurrent maps: connections, conversation subscribers and user
//! sessions. No map guard is held while another map is locked.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::frames::{ClientMessage, ServerEvent};

pub type ConnectionId = u64;

/// Subscribe-time authorization.
#[async_trait]
pub trait SubscriptionPolicy: Send + Sync {
    /// Whether the user exists. Lookup failures should deny.
    async fn user_exists(&self, user_id: i64) -> bool;

    /// Whether the user may see the conversation. Lookup failures should deny.
    async fn can_access_conversation(&self, user_id: i64, conversation_id: i64) -> bool;
}

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Every connection subscribed to the conversation.
    Conversation(i64),
    /// Every authenticated session of the user.
    User(i64),
}

#[derive(Debug)]
struct Connection {
    tx: mpsc::UnboundedSender<String>,
    user_id: Option<i64>,
    conversations: HashSet<i64>,
}

/// The fan-out engine.
pub struct Hub {
    policy: Arc<dyn SubscriptionPolicy>,
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, Connection>,
    by_conversation: DashMap<i64, HashSet<ConnectionId>>,
    by_user: DashMap<i64, HashSet<ConnectionId>>,
}

impl Hub {
    pub fn new(policy: Arc<dyn SubscriptionPolicy>) -> Self {
        Self {
            policy,
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
            by_conversation: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    /// Register a new, unauthenticated connection. The receiver yields the
    /// serialized frames to write to the socket.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            Connection {
                tx,
                user_id: None,
                conversations: HashSet::new(),
            },
        );
        debug!(connection_id = id, "Connection registered");
        (id, rx)
    }

    /// Handle one text frame from a client.
    ///
    /// The client always gets a reply frame; the returned error is for logging.
    pub async fn handle_text(&self, id: ConnectionId, text: &str) -> Result<(), HubError> {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                self.send_to(id, &ServerEvent::error("Invalid message format"));
                return Err(HubError::InvalidFrame(e.to_string()));
            }
        };

        match message {
            ClientMessage::Auth { user_id } => self.authenticate(id, user_id).await,
            ClientMessage::Subscribe { conversation_id } => {
                self.subscribe(id, conversation_id).await
            }
            ClientMessage::Unsubscribe { conversation_id } => {
                self.unsubscribe(id, conversation_id)
            }
        }
    }

    fn user_of(&self, id: ConnectionId) -> Result<Option<i64>, HubError> {
        self.connections
            .get(&id)
            .map(|c| c.user_id)
            .ok_or(HubError::UnknownConnection(id))
    }

    /// Bind a connection to a user.
    pub async fn authenticate(&self, id: ConnectionId, user_id: i64) -> Result<(), HubError> {
        match self.user_of(id)? {
            Some(current) if current == user_id => {
                self.send_to(id, &ServerEvent::AuthSuccess { user_id });
                return Ok(());
            }
            Some(_) => {
                self.send_to(
                    id,
                    &ServerEvent::AuthError {
                        message: "Connection is already authenticated".to_string(),
                    },
                );
                return Err(HubError::AlreadyAuthenticated);
            }
            None => {}
        }

        if !self.policy.user_exists(user_id).await {
            self.send_to(
                id,
                &ServerEvent::AuthError {
                    message: "Invalid user".to_string(),
                },
            );
            return Err(HubError::UnknownUser(user_id));
        }

        // Another auth frame may have bound the connection during the lookup.
        let bound = match self.connections.get_mut(&id) {
            Some(mut connection) => {
                let current = connection.user_id;
                if current.is_none() {
                    connection.user_id = Some(user_id);
                }
                current
            }
            None => return Err(HubError::UnknownConnection(id)),
        };
        match bound {
            Some(current) if current == user_id => {
                self.send_to(id, &ServerEvent::AuthSuccess { user_id });
                return Ok(());
            }
            Some(_) => {
                self.send_to(
                    id,
                    &ServerEvent::AuthError {
                        message: "Connection is already authenticated".to_string(),
                    },
                );
                return Err(HubError::AlreadyAuthenticated);
            }
            None => {}
        }
        self.by_user.entry(user_id).or_default().insert(id);

        // The socket may have closed while the user lookup was in flight.
        if !self.connections.contains_key(&id) {
            self.remove_from_index(&self.by_user, user_id, id);
            return Err(HubError::UnknownConnection(id));
        }

        info!(connection_id = id, user_id, "Connection authenticated");
        self.send_to(id, &ServerEvent::AuthSuccess { user_id });
        Ok(())
    }

    /// Subscribe an authenticated connection to a conversation.
    pub async fn subscribe(&self, id: ConnectionId, conversation_id: i64) -> Result<(), HubError> {
        let Some(user_id) = self.user_of(id)? else {
            self.send_to(id, &ServerEvent::error("Not authenticated"));
            return Err(HubError::NotAuthenticated);
        };

        if !self
            .policy
            .can_access_conversation(user_id, conversation_id)
            .await
        {
            warn!(connection_id = id, user_id, conversation_id, "Subscription denied");
            self.send_to(id, &ServerEvent::error("Access denied"));
            return Err(HubError::AccessDenied(conversation_id));
        }

        match self.connections.get_mut(&id) {
            Some(mut connection) => {
                connection.conversations.insert(conversation_id);
            }
            None => return Err(HubError::UnknownConnection(id)),
        }
        self.by_conversation
            .entry(conversation_id)
            .or_default()
            .insert(id);

        if !self.connections.contains_key(&id) {
            self.remove_from_index(&self.by_conversation, conversation_id, id);
            return Err(HubError::UnknownConnection(id));
        }

        debug!(connection_id = id, conversation_id, "Subscribed");
        self.send_to(id, &ServerEvent::Subscribed { conversation_id });
        Ok(())
    }

    /// Remove a conversation subscription.
    pub fn unsubscribe(&self, id: ConnectionId, conversation_id: i64) -> Result<(), HubError> {
        if self.user_of(id)?.is_none() {
            self.send_to(id, &ServerEvent::error("Not authenticated"));
            return Err(HubError::NotAuthenticated);
        }

        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.conversations.remove(&conversation_id);
        }
        self.remove_from_index(&self.by_conversation, conversation_id, id);

        debug!(connection_id = id, conversation_id, "Unsubscribed");
        self.send_to(id, &ServerEvent::Unsubscribed { conversation_id });
        Ok(())
    }

    /// Deliver an event to every connection in the targets, at most once per
    /// connection. Returns the number of connections written to.
    ///
    /// A failed write prunes that connection and the broadcast continues.
    pub fn publish(&self, targets: &[Target], event: &ServerEvent) -> usize {
        let mut recipients: HashSet<ConnectionId> = HashSet::new();
        for target in targets {
            let members = match target {
                Target::Conversation(id) => self.by_conversation.get(id),
                Target::User(id) => self.by_user.get(id),
            };
            if let Some(members) = members {
                recipients.extend(members.iter().copied());
            }
        }

        if recipients.is_empty() {
            debug!(event = event.kind(), "No live recipients");
            return 0;
        }

        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event = event.kind(), "Failed to serialize event: {}", e);
                return 0;
            }
        };

        let delivered = recipients
            .into_iter()
            .filter(|id| self.send_raw(*id, payload.clone()))
            .count();

        debug!(event = event.kind(), delivered, "Published");
        delivered
    }

    /// Send an event to one connection.
    pub fn send_to(&self, id: ConnectionId, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(payload) => self.send_raw(id, payload),
            Err(e) => {
                warn!(event = event.kind(), "Failed to serialize event: {}", e);
                false
            }
        }
    }

    fn send_raw(&self, id: ConnectionId, payload: String) -> bool {
        let result = match self.connections.get(&id) {
            Some(connection) => connection.tx.send(payload).is_ok(),
            None => false,
        };

        if !result {
            debug!(connection_id = id, "Write failed, pruning connection");
            self.disconnect(id);
        }
        result
    }

    /// Drop a connection from every set it joined.
    pub fn disconnect(&self, id: ConnectionId) {
        let Some((_, connection)) = self.connections.remove(&id) else {
            // Already gone; clear any index entries a racing call left.
            self.by_conversation.retain(|_, members| {
                members.remove(&id);
                !members.is_empty()
            });
            self.by_user.retain(|_, members| {
                members.remove(&id);
                !members.is_empty()
            });
            return;
        };

        for conversation_id in &connection.conversations {
            self.remove_from_index(&self.by_conversation, *conversation_id, id);
        }
        if let Some(user_id) = connection.user_id {
            self.remove_from_index(&self.by_user, user_id, id);
        }

        debug!(connection_id = id, "Connection removed");
    }

    fn remove_from_index(&self, index: &DashMap<i64, HashSet<ConnectionId>>, key: i64, id: ConnectionId) {
        if let Some(mut members) = index.get_mut(&key) {
            members.remove(&id);
        }
        index.remove_if(&key, |_, members| members.is_empty());
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn conversation_subscribers(&self, conversation_id: i64) -> usize {
        self.by_conversation
            .get(&conversation_id)
            .map_or(0, |members| members.len())
    }

    pub fn user_sessions(&self, user_id: i64) -> usize {
        self.by_user.get(&user_id).map_or(0, |members| members.len())
    }
}
