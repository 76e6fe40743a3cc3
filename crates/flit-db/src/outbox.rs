//! Outbox table repository — the durable storage half of the Durable
//! Work Queue (spec §4.3), grounded on
//! `transactional-outbox::SqlxOutboxRepository`. The queue's dispatch
//! semantics (priority, Ack/Nack, dead-letter) live in `flit-queue`; this
//! module is pure persistence.

use chrono::{DateTime, Utc};
use flit_core::domain::{Priority, WorkPayload};
use flit_core::error::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: Uuid,
    pub payload: WorkPayload,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub dead_lettered: bool,
}

#[derive(Clone)]
pub struct OutboxRepository {
    pool: PgPool,
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
    }
}

fn priority_from_str(s: &str) -> Priority {
    match s {
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Normal,
    }
}

impl OutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a work item within an existing transaction, so the business
    /// write and the enqueue commit atomically (the "transactional" half
    /// of transactional outbox).
    pub async fn insert_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        queue_name: &str,
        payload: &WorkPayload,
        priority: Priority,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO outbox_events (id, queue_name, payload, priority, created_at, retry_count)
            VALUES ($1, $2, $3, $4, now(), 0)
            "#,
        )
        .bind(id)
        .bind(queue_name)
        .bind(serde_json::to_value(payload)?)
        .bind(priority_str(priority))
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Insert a work item outside any caller transaction (best-effort
    /// enqueue path, spec §7: "fan-out work enqueue is best-effort with
    /// retry on the next write").
    pub async fn insert(
        &self,
        queue_name: &str,
        payload: &WorkPayload,
        priority: Priority,
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;
        let id = self.insert_in_tx(&mut tx, queue_name, payload, priority).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Claim up to `limit` unpublished, non-dead-lettered, unleased rows
    /// for a queue, ordered by priority then FIFO within priority —
    /// "FIFO per producer per queue is not guaranteed across multiple
    /// workers" (spec §4.3) still holds because concurrent claims race on
    /// `created_at` order, not a hard lock. The select and the lease stamp
    /// run in the same transaction, so a concurrent claimer's `SKIP
    /// LOCKED` scan never observes a row this call just took: the row
    /// stays leased (`claimed_at` set) past this transaction's commit,
    /// not just past its row lock.
    pub async fn claim_batch(&self, queue_name: &str, limit: i64, lease_secs: i64) -> Result<Vec<OutboxRow>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, payload, priority, created_at, published_at, retry_count, last_error, dead_lettered
            FROM outbox_events
            WHERE queue_name = $1 AND published_at IS NULL AND dead_lettered = false
                AND (claimed_at IS NULL OR claimed_at < now() - ($3 || ' seconds')::interval)
            ORDER BY
                CASE priority WHEN 'high' THEN 0 WHEN 'normal' THEN 1 ELSE 2 END,
                created_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(queue_name)
        .bind(limit)
        .bind(lease_secs.to_string())
        .fetch_all(&mut *tx)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let payload_json: serde_json::Value = row.try_get("payload")?;
            let payload: WorkPayload = serde_json::from_value(payload_json)?;
            let id: Uuid = row.try_get("id")?;
            ids.push(id);
            out.push(OutboxRow {
                id,
                payload,
                priority: priority_from_str(row.try_get::<String, _>("priority")?.as_str()),
                created_at: row.try_get("created_at")?,
                published_at: row.try_get("published_at")?,
                retry_count: row.try_get("retry_count")?,
                last_error: row.try_get("last_error")?,
                dead_lettered: row.try_get("dead_lettered")?,
            });
        }

        if !ids.is_empty() {
            sqlx::query("UPDATE outbox_events SET claimed_at = now() WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(out)
    }

    pub async fn ack(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE outbox_events SET published_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Nack: bump retry_count, record the error, and clear the claim
    /// lease so the item is immediately eligible for redelivery rather
    /// than waiting out the full lease window; dead-letter once the
    /// retry count reaches `max_redeliveries` (spec §4.3, N=5).
    pub async fn nack(&self, id: Uuid, error: &str, max_redeliveries: u32) -> Result<bool> {
        let row = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = retry_count + 1, last_error = $2, claimed_at = NULL
            WHERE id = $1
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        let retry_count: i32 = row.try_get("retry_count")?;
        let dead_lettered = retry_count as u32 >= max_redeliveries;
        if dead_lettered {
            sqlx::query("UPDATE outbox_events SET dead_lettered = true WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(dead_lettered)
    }

    pub async fn pending_count(&self, queue_name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE queue_name = $1 AND published_at IS NULL AND dead_lettered = false",
        )
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn dead_letter_count(&self, queue_name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_events WHERE queue_name = $1 AND dead_lettered = true",
        )
        .bind(queue_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
