//! Follow-edge repository with symmetric counter maintenance, grounded on
//! `social-service/src/repository` conventions (idempotent create/delete
//! guarded by row-affected checks).

use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct FollowRepository {
    pool: PgPool,
}

impl FollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the edge and bumps both counters atomically. Returns `true`
    /// iff a new edge was created (idempotent on repeat calls).
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            sqlx::query("UPDATE users SET following_count = following_count + 1 WHERE id = $1")
                .bind(follower_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE users SET follower_count = follower_count + 1 WHERE id = $1")
                .bind(followee_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Removes the edge and decrements both counters. Returns `true` iff a
    /// row was actually removed.
    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            sqlx::query(
                "UPDATE users SET following_count = GREATEST(following_count - 1, 0) WHERE id = $1",
            )
            .bind(follower_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "UPDATE users SET follower_count = GREATEST(follower_count - 1, 0) WHERE id = $1",
            )
            .bind(followee_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    pub async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn follower_count(&self, user_id: Uuid) -> Result<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT follower_count FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    pub async fn followees(&self, user_id: Uuid, limit: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT followee_id FROM follows WHERE follower_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Followers active within `window_days`, up to `limit` rows, used by
    /// the hybrid fan-out strategy (spec §4.5).
    pub async fn active_followers(
        &self,
        followee_id: Uuid,
        window_days: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT f.follower_id
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.followee_id = $1
              AND u.last_active_at >= now() - make_interval(days => $2::int)
            ORDER BY u.last_active_at DESC
            LIMIT $3
            "#,
        )
        .bind(followee_id)
        .bind(window_days as i32)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn all_followers(&self, followee_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT follower_id FROM follows WHERE followee_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(followee_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
