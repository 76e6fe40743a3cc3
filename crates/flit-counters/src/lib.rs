//! Counter Store (spec §4.2): best-effort fast counter reads, advisory
//! relative to the authoritative relational row count. Grounded
//! directly on `social-service/src/services/counters.rs`'s Redis
//! INCR/DECR-with-TTL pattern, batch MGET, and periodic PostgreSQL
//! reconciliation.

use flit_core::domain::CounterMetric;
use flit_core::error::{FlitError, Result};
use flit_db::PostRepository;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use uuid::Uuid;

/// TTL for counter keys: 7 days, matching the teacher's cache-warming
/// window.
const COUNTER_TTL_SECS: i64 = 604_800;

fn counter_key(post_id: Uuid, metric: CounterMetric) -> String {
    format!("post:{}:{}", post_id, metric.as_str())
}

#[derive(Clone)]
pub struct CounterStore {
    redis: ConnectionManager,
    posts: PostRepository,
}

impl CounterStore {
    pub fn new(redis: ConnectionManager, posts: PostRepository) -> Self {
        Self { redis, posts }
    }

    /// Increments and saturates the TTL on first touch.
    pub async fn incr(&self, post_id: Uuid, metric: CounterMetric) -> Result<i64> {
        let key = counter_key(post_id, metric);
        let mut conn = self.redis.clone();
        let new_count: i64 = conn.incr(&key, 1).await.map_err(FlitError::from)?;
        if new_count == 1 {
            let _: () = conn.expire(&key, COUNTER_TTL_SECS).await.map_err(FlitError::from)?;
        }
        Ok(new_count)
    }

    /// Decrements, saturating at zero (spec §4.2: "Decr saturating at
    /// zero").
    pub async fn decr(&self, post_id: Uuid, metric: CounterMetric) -> Result<i64> {
        let key = counter_key(post_id, metric);
        let mut conn = self.redis.clone();
        let current: i64 = conn.get(&key).await.unwrap_or(0);
        if current > 0 {
            let new_count: i64 = conn.decr(&key, 1).await.map_err(FlitError::from)?;
            Ok(new_count.max(0))
        } else {
            Ok(0)
        }
    }

    /// Reads from Redis, falling back to (and warming from) the
    /// authoritative relational count on cache miss.
    pub async fn get(&self, post_id: Uuid, metric: CounterMetric) -> Result<i64> {
        let key = counter_key(post_id, metric);
        let mut conn = self.redis.clone();
        let cached: Option<i64> = conn.get(&key).await.map_err(FlitError::from)?;
        match cached {
            Some(count) => Ok(count),
            None => {
                let count = self.posts.authoritative_count(post_id, metric).await?;
                let _: () = conn
                    .set_ex(&key, count, COUNTER_TTL_SECS as u64)
                    .await
                    .map_err(FlitError::from)?;
                Ok(count)
            }
        }
    }

    /// Batched read over `(post_id, metric)` pairs with a single MGET;
    /// falls back to per-post authoritative lookups on Redis failure.
    pub async fn batch_get(
        &self,
        post_ids: &[Uuid],
        metric: CounterMetric,
    ) -> Result<HashMap<Uuid, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = post_ids.iter().map(|id| counter_key(*id, metric)).collect();
        let mut conn = self.redis.clone();

        match conn.get::<_, Vec<Option<i64>>>(&keys).await {
            Ok(values) => {
                let mut result = HashMap::with_capacity(post_ids.len());
                let mut missing = Vec::new();
                for (post_id, value) in post_ids.iter().zip(values.into_iter()) {
                    match value {
                        Some(v) => {
                            result.insert(*post_id, v);
                        }
                        None => missing.push(*post_id),
                    }
                }
                if !missing.is_empty() {
                    if let Err(err) = self.warm_missing(&missing, metric, &mut result).await {
                        tracing::warn!(error = %err, count = missing.len(), "failed to warm missing counters");
                    }
                }
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "counter MGET failed, falling back to relational reads");
                let mut result = HashMap::with_capacity(post_ids.len());
                for post_id in post_ids {
                    let count = self.posts.authoritative_count(*post_id, metric).await?;
                    result.insert(*post_id, count);
                }
                Ok(result)
            }
        }
    }

    async fn warm_missing(
        &self,
        missing: &[Uuid],
        metric: CounterMetric,
        result: &mut HashMap<Uuid, i64>,
    ) -> Result<()> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        for post_id in missing {
            let count = self.posts.authoritative_count(*post_id, metric).await?;
            result.insert(*post_id, count);
            pipe.set_ex(counter_key(*post_id, metric), count, COUNTER_TTL_SECS as u64)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.map_err(FlitError::from)?;
        Ok(())
    }

    /// Periodic housekeeper: resyncs Redis from the authoritative
    /// relational counts for `post_ids`, correcting any divergence
    /// accumulated from missed cache writes (spec §4.2, "Divergence is
    /// bounded by the lag between EE's relational commit and the
    /// subsequent CS update").
    pub async fn reconcile(&self, post_ids: &[Uuid], metric: CounterMetric) -> Result<usize> {
        if post_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        for post_id in post_ids {
            let count = self.posts.authoritative_count(*post_id, metric).await?;
            pipe.set_ex(counter_key(*post_id, metric), count, COUNTER_TTL_SECS as u64)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.map_err(FlitError::from)?;
        tracing::info!(count = post_ids.len(), metric = metric.as_str(), "reconciled counters");
        Ok(post_ids.len())
    }
}
