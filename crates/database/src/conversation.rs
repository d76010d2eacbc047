//! Conversation operations.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Conversation, ConversationFlags};

const CONVERSATION_COLUMNS: &str = "id, phone_number_id, contact_number, contact_name, \
    assigned_user_id, category, unread_count, is_pinned, is_archived, \
    last_message_preview, last_message_at, created_at";

/// Maximum length of the stored last-message preview, in characters.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Find the conversation for `(phone_number_id, contact_number)`, creating it
/// if needed.
///
/// `assignee` is only used when the row is created; an existing conversation
/// keeps its own assignee. Concurrent callers for the same pair get the same
/// row. Returns the conversation and whether it was created.
pub async fn find_or_create(
    pool: &SqlitePool,
    phone_number_id: i64,
    contact_number: &str,
    assignee: Option<i64>,
) -> Result<(Conversation, bool)> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO conversations (phone_number_id, contact_number, assigned_user_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(phone_number_id)
    .bind(contact_number)
    .bind(assignee)
    .execute(pool)
    .await?
    .rows_affected()
        > 0;

    let conversation = sqlx::query_as::<_, Conversation>(&format!(
        r#"
        SELECT {CONVERSATION_COLUMNS}
        FROM conversations
        WHERE phone_number_id = ? AND contact_number = ?
        "#
    ))
    .bind(phone_number_id)
    .bind(contact_number)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        DatabaseError::not_found("Conversation", format!("{phone_number_id}/{contact_number}"))
    })?;

    Ok((conversation, inserted))
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, id: i64) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        SELECT {CONVERSATION_COLUMNS}
        FROM conversations
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Conversations on any number owned by a tenant, pinned first then most recent.
pub async fn list_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT c.id, c.phone_number_id, c.contact_number, c.contact_name,
               c.assigned_user_id, c.category, c.unread_count, c.is_pinned, c.is_archived,
               c.last_message_preview, c.last_message_at, c.created_at
        FROM conversations c
        JOIN phone_numbers p ON p.id = c.phone_number_id
        WHERE p.tenant_id = ?
        ORDER BY c.is_pinned DESC, COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}

/// Conversations on numbers assigned to a user, or assigned to the user directly.
pub async fn list_for_assignee(pool: &SqlitePool, user_id: i64) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT c.id, c.phone_number_id, c.contact_number, c.contact_name,
               c.assigned_user_id, c.category, c.unread_count, c.is_pinned, c.is_archived,
               c.last_message_preview, c.last_message_at, c.created_at
        FROM conversations c
        JOIN phone_numbers p ON p.id = c.phone_number_id
        WHERE p.assigned_user_id = ? OR c.assigned_user_id = ?
        ORDER BY c.is_pinned DESC, COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}

/// Record an inbound message: bump the unread counter by one and refresh the
/// preview, in a single statement so concurrent inbound messages never lose
/// an increment.
pub async fn record_inbound<'e, E>(executor: E, id: i64, content: &str) -> Result<Conversation>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        UPDATE conversations
        SET unread_count = unread_count + 1,
            last_message_preview = ?,
            last_message_at = datetime('now')
        WHERE id = ?
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(preview(content))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Refresh the preview after an outbound message. Unread is untouched.
pub async fn record_outbound(pool: &SqlitePool, id: i64, content: &str) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        UPDATE conversations
        SET last_message_preview = ?,
            last_message_at = datetime('now')
        WHERE id = ?
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(preview(content))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Reset the unread counter.
pub async fn mark_read(pool: &SqlitePool, id: i64) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        UPDATE conversations
        SET unread_count = 0
        WHERE id = ?
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Update pinned/archived/category/contact name. Unset fields are left alone.
pub async fn update_flags(
    pool: &SqlitePool,
    id: i64,
    flags: &ConversationFlags,
) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        UPDATE conversations
        SET is_pinned = COALESCE(?, is_pinned),
            is_archived = COALESCE(?, is_archived),
            category = COALESCE(?, category),
            contact_name = COALESCE(?, contact_name)
        WHERE id = ?
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(flags.is_pinned)
    .bind(flags.is_archived)
    .bind(&flags.category)
    .bind(&flags.contact_name)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Reassign a conversation.
pub async fn set_assignee(pool: &SqlitePool, id: i64, assignee: Option<i64>) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(&format!(
        r#"
        UPDATE conversations
        SET assigned_user_id = ?
        WHERE id = ?
        RETURNING {CONVERSATION_COLUMNS}
        "#
    ))
    .bind(assignee)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Conversation", id))
}

/// Delete a conversation and, through the foreign key, its messages.
pub async fn delete_conversation(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Conversation", id));
    }

    Ok(())
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_MAX_CHARS).collect()
}
