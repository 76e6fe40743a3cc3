//! Handled-id tracking for queue consumers (spec §4.3): an in-memory,
//! bounded fast path backed by `flit_db::IdempotencyRepository`'s
//! `idempotency_keys` table for the cross-restart/cross-instance case.
//! Grounded on `idempotent-consumer::IdempotencyGuard`'s check-then-mark
//! shape, with the in-memory set added so a hot redelivery loop within a
//! single process doesn't round-trip to Postgres on every item.

use dashmap::DashSet;
use flit_db::IdempotencyRepository;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

pub struct HandledIds {
    seen: DashSet<Uuid>,
    order: Mutex<VecDeque<Uuid>>,
    capacity: usize,
    durable: IdempotencyRepository,
}

impl HandledIds {
    pub fn new(capacity: usize, durable: IdempotencyRepository) -> Self {
        Self {
            seen: DashSet::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            durable,
        }
    }

    /// Returns `true` if `id` was already marked handled, checking the
    /// in-process cache first and falling back to the durable table so a
    /// redelivery after a worker restart is still caught.
    pub async fn is_duplicate(&self, id: Uuid) -> bool {
        if self.seen.contains(&id) {
            return true;
        }
        match self.durable.is_processed(id).await {
            Ok(processed) => processed,
            Err(err) => {
                warn!(id = %id, error = %err, "idempotency lookup failed, treating as not-yet-handled");
                false
            }
        }
    }

    /// Marks `id` as handled both in the local cache and durably.
    pub async fn mark_handled(&self, id: Uuid) {
        if self.seen.insert(id) {
            let mut order = self.order.lock().unwrap();
            order.push_back(id);
            if order.len() > self.capacity {
                if let Some(evicted) = order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
        if let Err(err) = self.durable.mark_processed(id).await {
            warn!(id = %id, error = %err, "failed to durably record handled id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flit_db::{create_pool, migrate, DbConfig};

    async fn test_pool() -> Option<sqlx::PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(DbConfig {
            database_url: url,
            ..Default::default()
        })
        .await
        .ok()?;
        migrate(&pool).await.ok()?;
        Some(pool)
    }

    #[tokio::test]
    async fn evicts_oldest_from_local_cache_past_capacity() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };
        let ids = HandledIds::new(2, IdempotencyRepository::new(pool));
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        ids.mark_handled(a).await;
        ids.mark_handled(b).await;
        ids.mark_handled(c).await;
        assert!(ids.seen.contains(&b));
        assert!(ids.seen.contains(&c));
        assert!(!ids.seen.contains(&a));
    }

    #[tokio::test]
    async fn marks_and_detects_duplicate() {
        let Some(pool) = test_pool().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };
        let ids = HandledIds::new(10, IdempotencyRepository::new(pool));
        let id = Uuid::new_v4();
        assert!(!ids.is_duplicate(id).await);
        ids.mark_handled(id).await;
        assert!(ids.is_duplicate(id).await);
    }
}
