//! Authoritative relational repository for posts, grounded on
//! `content-service/src/db/post_repo.rs`.

use flit_core::domain::Post;
use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        author_id: Uuid,
        content: &str,
        media_ids: &[String],
        reply_to: Option<Uuid>,
        retweet_of: Option<Uuid>,
    ) -> Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, author_id, content, media_ids, reply_to, retweet_of, created_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, now())
            RETURNING id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                      like_count, retweet_count, reply_count, deleted_at
            "#,
        )
        .bind(author_id)
        .bind(content)
        .bind(media_ids)
        .bind(reply_to)
        .bind(retweet_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    pub async fn find_by_id(&self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                   like_count, retweet_count, reply_count, deleted_at
            FROM posts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    pub async fn find_batch(&self, ids: &[Uuid]) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                   like_count, retweet_count, reply_count, deleted_at
            FROM posts
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn find_by_author(&self, author_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                   like_count, retweet_count, reply_count, deleted_at
            FROM posts
            WHERE author_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn find_replies(&self, parent_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                   like_count, retweet_count, reply_count, deleted_at
            FROM posts
            WHERE reply_to = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(parent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Soft-delete; returns true iff the row existed and was owned.
    pub async fn soft_delete(&self, post_id: Uuid, caller_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET deleted_at = now()
            WHERE id = $1 AND author_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .bind(caller_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE posts SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn decrement_like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE posts SET like_count = GREATEST(like_count - 1, 0) WHERE id = $1 RETURNING like_count",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn increment_retweet_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE posts SET retweet_count = retweet_count + 1 WHERE id = $1 RETURNING retweet_count",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn decrement_retweet_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE posts SET retweet_count = GREATEST(retweet_count - 1, 0) WHERE id = $1 RETURNING retweet_count",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn increment_reply_count(&self, post_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE posts SET reply_count = reply_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Finds the derived retweet post (if any) for (retweeter, original),
    /// so a repeat retweet call can return the existing derivative
    /// instead of creating a duplicate.
    pub async fn find_retweet(&self, retweeter_id: Uuid, original_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, content, media_ids, reply_to, retweet_of, created_at,
                   like_count, retweet_count, reply_count, deleted_at
            FROM posts
            WHERE author_id = $1 AND retweet_of = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(retweeter_id)
        .bind(original_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Raw relational row count for a metric, used by the counter store to
    /// refresh its cache from authoritative truth (spec §4.2).
    pub async fn authoritative_count(
        &self,
        post_id: Uuid,
        metric: flit_core::domain::CounterMetric,
    ) -> Result<i64> {
        let column = match metric {
            flit_core::domain::CounterMetric::Likes => "like_count",
            flit_core::domain::CounterMetric::Retweets => "retweet_count",
            flit_core::domain::CounterMetric::Replies => "reply_count",
        };
        let count: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT {column} FROM posts WHERE id = $1"
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }

    pub async fn recent_published_ids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM posts WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
