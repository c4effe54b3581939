use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use execboard_models::{Message, Page, PageRequest};

use super::rows::MessageRow;
use super::{to_count, PgStore};
use crate::error::DbResult;
use crate::repos::MessageRepository;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, recipient_id, application_id, subject, body, read_at, created_at";

#[async_trait]
impl MessageRepository for PgStore {
    async fn insert(&self, message: &Message) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, application_id, subject, body, read_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(message.application_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.read_at)
        .bind(message.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Message>> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE sender_id = $1 OR recipient_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE sender_id = $1 OR recipient_id = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await?;

        let items = rows.into_iter().map(Message::from).collect();
        Ok(Page::new(items, to_count(total), page))
    }

    async fn unread_count(&self, recipient_id: Uuid) -> DbResult<u64> {
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(self.pool())
        .await?;
        Ok(to_count(n))
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> DbResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "UPDATE messages SET read_at = COALESCE(read_at, $3)
             WHERE id = $1 AND recipient_id = $2
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(recipient_id)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Message::from))
    }
}
