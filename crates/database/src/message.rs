//! Message operations.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::conversation;
use crate::error::{DatabaseError, Result};
use crate::models::{Conversation, Message, MessageStatus, NewMessage};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, direction, status, provider_message_id, created_at";

/// Insert a message.
pub async fn insert_message(pool: &SqlitePool, message: &NewMessage) -> Result<Message> {
    let inserted = sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (conversation_id, sender_id, content, direction, status, provider_message_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(message.conversation_id)
    .bind(message.sender_id)
    .bind(&message.content)
    .bind(message.direction)
    .bind(message.status)
    .bind(&message.provider_message_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        DatabaseError::from_insert(
            e,
            "Message",
            message.provider_message_id.as_deref().unwrap_or_default(),
        )
    })?;

    Ok(inserted)
}

/// Insert an inbound message unless one with the same provider message id
/// already exists. Returns `None` for a replay.
pub async fn insert_inbound_dedup<'e, E>(executor: E, message: &NewMessage) -> Result<Option<Message>>
where
    E: SqliteExecutor<'e>,
{
    let inserted = sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT OR IGNORE INTO messages (conversation_id, sender_id, content, direction, status, provider_message_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(message.conversation_id)
    .bind(message.sender_id)
    .bind(&message.content)
    .bind(message.direction)
    .bind(message.status)
    .bind(&message.provider_message_id)
    .fetch_optional(executor)
    .await?;

    Ok(inserted)
}

/// Store an inbound message and count it as unread on its conversation.
///
/// Both writes commit together, so a failure leaves no row behind for a
/// provider retry to be deduplicated against. Returns `None` for a replay.
pub async fn record_inbound_message(
    pool: &SqlitePool,
    message: &NewMessage,
) -> Result<Option<(Message, Conversation)>> {
    let mut tx = pool.begin().await?;

    let Some(inserted) = insert_inbound_dedup(&mut *tx, message).await? else {
        return Ok(None);
    };
    let conversation =
        conversation::record_inbound(&mut *tx, message.conversation_id, &message.content).await?;

    tx.commit().await?;
    Ok(Some((inserted, conversation)))
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Message> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Message", id))
}

/// Look up a message by the id the provider assigned to it.
pub async fn find_by_provider_id(pool: &SqlitePool, provider_message_id: &str) -> Result<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE provider_message_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#
    ))
    .bind(provider_message_id)
    .fetch_optional(pool)
    .await?;

    Ok(message)
}

/// Overwrite the delivery status. Transitions are applied in call order.
pub async fn update_status(pool: &SqlitePool, id: i64, status: MessageStatus) -> Result<Message> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        UPDATE messages
        SET status = ?
        WHERE id = ?
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Message", id))
}

/// Store the outcome of handing a message to the provider.
pub async fn record_send_result(
    pool: &SqlitePool,
    id: i64,
    provider_message_id: Option<&str>,
    status: MessageStatus,
) -> Result<Message> {
    sqlx::query_as::<_, Message>(&format!(
        r#"
        UPDATE messages
        SET provider_message_id = COALESCE(?, provider_message_id),
            status = ?
        WHERE id = ?
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(provider_message_id)
    .bind(status)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Message", id))
}

/// Messages of a conversation in creation order.
pub async fn list_for_conversation(pool: &SqlitePool, conversation_id: i64) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE conversation_id = ?
        ORDER BY id
        "#
    ))
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}
