//! Like/retweet engagement repository, grounded on
//! `social-service/src/repository/likes.rs`'s idempotent upsert pattern.

use flit_core::domain::Engagement;
use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct EngagementRepository {
    pool: PgPool,
    table: &'static str,
}

impl EngagementRepository {
    pub fn likes(pool: PgPool) -> Self {
        Self { pool, table: "likes" }
    }

    pub fn retweets(pool: PgPool) -> Self {
        Self {
            pool,
            table: "retweets",
        }
    }

    /// Idempotent create. Returns `(engagement, was_created)`, with
    /// `was_created` derived from the insert's own atomicity (`ON
    /// CONFLICT DO NOTHING` returns no row iff the pair already existed)
    /// rather than a separate existence check, so two concurrent calls
    /// for the same pair can never both observe `was_created = true`.
    pub async fn create(&self, user_id: Uuid, post_id: Uuid) -> Result<(Engagement, bool)> {
        let insert_query = format!(
            r#"
            INSERT INTO {} (user_id, post_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id, post_id) DO NOTHING
            RETURNING user_id, post_id, created_at
            "#,
            self.table
        );

        if let Some(engagement) = sqlx::query_as::<_, Engagement>(&insert_query)
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok((engagement, true));
        }

        let select_query = format!(
            "SELECT user_id, post_id, created_at FROM {} WHERE user_id = $1 AND post_id = $2",
            self.table
        );
        let engagement = sqlx::query_as::<_, Engagement>(&select_query)
            .bind(user_id)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((engagement, false))
    }

    /// Idempotent delete. Returns `true` iff a row was actually removed.
    pub async fn delete(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let query = format!("DELETE FROM {} WHERE user_id = $1 AND post_id = $2", self.table);
        let result = sqlx::query(&query)
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND post_id = $2)",
            self.table
        );
        let exists: bool = sqlx::query_scalar(&query)
            .bind(user_id)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn count_for_post(&self, post_id: Uuid) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE post_id = $1", self.table);
        let count: i64 = sqlx::query_scalar(&query)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn batch_exists(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT post_id FROM {} WHERE user_id = $1 AND post_id = ANY($2)",
            self.table
        );
        let found: Vec<Uuid> = sqlx::query_scalar(&query)
            .bind(user_id)
            .bind(post_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(found)
    }
}
