//! Durable Work Queue (spec §4.3): named queues per kind, at-least-once
//! delivery, per-item acknowledgement, dead-letter after `N` redeliveries.
//! Grounded on `social-service/src/workers/outbox_worker.rs`'s poll loop
//! and on `libs/transactional-outbox`'s repository contract, adapted to
//! use Postgres itself as the durable substrate (`FOR UPDATE SKIP
//! LOCKED` claims) rather than a Kafka bridge, so the whole system runs
//! without an external broker.

pub mod idempotency;
pub mod names;

use flit_core::config::thresholds::{OUTBOX_CLAIM_LEASE_SECS, WORK_ITEM_MAX_REDELIVERIES};
use flit_core::domain::{Priority, WorkItem, WorkPayload};
use flit_core::error::Result;
use flit_db::{OutboxRepository, OutboxRow};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Handle to a durable queue, bound to one queue name.
#[derive(Clone)]
pub struct Queue {
    outbox: OutboxRepository,
    queue_name: &'static str,
}

impl Queue {
    pub fn new(outbox: OutboxRepository, queue_name: &'static str) -> Self {
        Self { outbox, queue_name }
    }

    pub async fn publish(&self, payload: WorkPayload, priority: Priority) -> Result<Uuid> {
        self.outbox.insert(self.queue_name, &payload, priority).await
    }

    pub async fn publish_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payload: WorkPayload,
        priority: Priority,
    ) -> Result<Uuid> {
        self.outbox.insert_in_tx(tx, self.queue_name, &payload, priority).await
    }

    async fn claim(&self, batch_size: i64) -> Result<Vec<OutboxRow>> {
        self.outbox
            .claim_batch(self.queue_name, batch_size, OUTBOX_CLAIM_LEASE_SECS)
            .await
    }

    pub async fn ack(&self, id: Uuid) -> Result<()> {
        self.outbox.ack(id).await
    }

    /// Returns `true` if the item was dead-lettered as a result of this
    /// nack.
    pub async fn nack(&self, id: Uuid, error: &str) -> Result<bool> {
        self.outbox.nack(id, error, WORK_ITEM_MAX_REDELIVERIES).await
    }

    pub async fn pending_count(&self) -> Result<i64> {
        self.outbox.pending_count(self.queue_name).await
    }

    pub async fn dead_letter_count(&self) -> Result<i64> {
        self.outbox.dead_letter_count(self.queue_name).await
    }
}

/// Per-worker health snapshot, mirrored after `outbox_worker.rs`'s
/// `WORKER_HEALTH` static: a metrics endpoint reads this without taking a
/// lock on the hot consume path.
#[derive(Default)]
pub struct ConsumerHealth {
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub dead_lettered: AtomicU64,
}

/// Runs `handler` against items claimed from `queue` until `shutdown`
/// fires. A consume error naks the item (retry, with dead-letter past
/// `N=5`); the idempotency-id check means a handler seeing a redelivered
/// item it already completed can skip straight to `Ack`.
pub async fn run_consumer<F, Fut>(
    queue: Queue,
    health: Arc<ConsumerHealth>,
    handled_ids: Arc<idempotency::HandledIds>,
    batch_size: i64,
    poll_interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
    handler: F,
) where
    F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        let rows = match queue.claim(batch_size).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(queue = queue.queue_name, error = %err, "claim failed, backing off");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        if rows.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        }

        for row in rows {
            if handled_ids.is_duplicate(row.id).await {
                debug!(queue = queue.queue_name, id = %row.id, "skipping duplicate redelivery");
                let _ = queue.ack(row.id).await;
                continue;
            }

            let item = WorkItem {
                id: row.id,
                payload: row.payload,
                priority: row.priority,
                enqueued_at: row.created_at,
                redelivery_count: row.retry_count.max(0) as u32,
            };
            let id = item.id;

            match handler(item).await {
                Ok(()) => {
                    let _ = queue.ack(id).await;
                    handled_ids.mark_handled(id).await;
                    health.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    health.failed.fetch_add(1, Ordering::Relaxed);
                    match queue.nack(id, &err.to_string()).await {
                        Ok(true) => {
                            warn!(queue = queue.queue_name, id = %id, "dead-lettered after max redeliveries");
                            health.dead_lettered.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {
                            warn!(queue = queue.queue_name, id = %id, error = %err, "handler failed, will redeliver");
                        }
                        Err(nack_err) => {
                            error!(queue = queue.queue_name, id = %id, error = %nack_err, "failed to record nack");
                        }
                    }
                }
            }
        }
    }
}
