//! Message flows shared by webhooks and API routes.

pub mod inbound;
pub mod outbound;
pub mod status;

use database::{Conversation, PhoneNumber};
use fanout::Target;

/// Everyone who should hear about a change to a conversation: its
/// subscribers, the tenant admin and the assignee.
pub(crate) fn conversation_targets(number: &PhoneNumber, conversation: &Conversation) -> Vec<Target> {
    let mut targets = vec![
        Target::Conversation(conversation.id),
        Target::User(number.tenant_id),
    ];
    if let Some(assignee) = conversation.assigned_user_id.or(number.assigned_user_id) {
        if assignee != number.tenant_id {
            targets.push(Target::User(assignee));
        }
    }
    targets
}
