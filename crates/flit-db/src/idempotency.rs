//! Durable idempotency tracking for queue consumers (spec §4.3), grounded
//! on `idempotent-consumer::IdempotencyGuard`'s check-then-insert shape
//! over a `processed_events`-style table — here `idempotency_keys`,
//! keyed by the work item's own id.

use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn is_processed(&self, key: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM idempotency_keys WHERE key = $1")
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Returns `true` if this call newly marked the key (first time seen).
    pub async fn mark_processed(&self, key: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO idempotency_keys (key) VALUES ($1) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Periodic housekeeper: deletes keys older than `retention_secs`.
    pub async fn cleanup_older_than(&self, retention_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM idempotency_keys WHERE handled_at < now() - ($1 || ' seconds')::interval",
        )
        .bind(retention_secs.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
