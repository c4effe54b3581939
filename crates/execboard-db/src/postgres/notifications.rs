use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use execboard_models::Notification;

use super::rows::{convert_all, NotificationRow};
use super::PgStore;
use crate::error::DbResult;
use crate::repos::NotificationRepository;

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, notification: &Notification) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, body, link, read_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.link)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> DbResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, title, body, link, read_at, created_at
             FROM notifications
             WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        convert_all(rows)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3)
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
