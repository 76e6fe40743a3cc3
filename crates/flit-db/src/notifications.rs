//! Persisted notification store, the reconnect-time catch-up path for
//! clients that missed a live event (spec §4.9).

use flit_core::domain::Notification;
use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient, kind, actor, subject_post_id, data, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(n.id)
        .bind(n.recipient)
        .bind(n.kind.0.as_str())
        .bind(n.actor)
        .bind(n.subject_post_id)
        .bind(&n.data)
        .bind(n.read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient, kind, actor, subject_post_id, data, read, created_at
            FROM notifications
            WHERE recipient = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, notification_id: Uuid, recipient: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read = true WHERE id = $1 AND recipient = $2",
        )
        .bind(notification_id)
        .bind(recipient)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
