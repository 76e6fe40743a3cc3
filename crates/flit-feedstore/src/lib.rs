//! Feed Store (spec §4.1): per-user ordered set of post ids keyed by
//! score, backed by Redis sorted sets. Grounded on
//! `libs/redis-utils::SharedConnectionManager` for the connection shape;
//! the sorted-set operations themselves mirror the counter-cache access
//! pattern in `social-service/src/services/counters.rs` (pipelined
//! reads, saturating mutation, TTL-free persistent keys here since feed
//! entries are not ephemeral).

use flit_core::domain::FeedKind;
use flit_core::error::{FlitError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

fn feed_key(owner: Uuid, kind: FeedKind) -> String {
    format!("feed:{}:{}", kind.as_str(), owner)
}

#[derive(Clone)]
pub struct FeedStore {
    conn: ConnectionManager,
}

impl FeedStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Appends (or re-scores) `post_id` in `key`'s ordered set, then trims
    /// to `max_size` if that pushed it over bound (spec §4.1 policy).
    pub async fn append(
        &self,
        owner: Uuid,
        kind: FeedKind,
        post_id: Uuid,
        score: f64,
        max_size: usize,
    ) -> Result<()> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(&key, post_id.to_string(), score)
            .await
            .map_err(FlitError::from)?;

        let size: usize = conn.zcard(&key).await.map_err(FlitError::from)?;
        if size > max_size {
            self.trim(owner, kind, max_size).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, owner: Uuid, kind: FeedKind, post_id: Uuid) -> Result<()> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let _: () = conn
            .zrem(&key, post_id.to_string())
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }

    /// Removes every entry beyond the `max_size` highest-scored positions.
    pub async fn trim(&self, owner: Uuid, kind: FeedKind, max_size: usize) -> Result<()> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        // ranks are ascending by score, so the lowest-scored excess
        // entries occupy ranks [0, size - max_size - 1].
        let _: () = conn
            .zremrangebyrank(&key, 0, -(max_size as isize) - 1)
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }

    /// Post ids in descending score order, `offset`..`offset+limit`.
    pub async fn range(
        &self,
        owner: Uuid,
        kind: FeedKind,
        offset: isize,
        limit: isize,
    ) -> Result<Vec<Uuid>> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let stop = offset + limit - 1;
        let ids: Vec<String> = conn
            .zrevrange(&key, offset, stop)
            .await
            .map_err(FlitError::from)?;
        Ok(ids.into_iter().filter_map(|s| Uuid::parse_str(&s).ok()).collect())
    }

    /// Like `range`, but also returns each entry's score, so callers can
    /// merge multiple ranges and re-sort without a second round trip.
    pub async fn range_with_scores(
        &self,
        owner: Uuid,
        kind: FeedKind,
        offset: isize,
        limit: isize,
    ) -> Result<Vec<(Uuid, f64)>> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let stop = offset + limit - 1;
        let raw: Vec<(String, f64)> = conn
            .zrevrange_withscores(&key, offset, stop)
            .await
            .map_err(FlitError::from)?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, score)| Uuid::parse_str(&id).ok().map(|id| (id, score)))
            .collect())
    }

    pub async fn size(&self, owner: Uuid, kind: FeedKind) -> Result<usize> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let size: usize = conn.zcard(&key).await.map_err(FlitError::from)?;
        Ok(size)
    }

    pub async fn exists(&self, owner: Uuid, kind: FeedKind) -> Result<bool> {
        let key = feed_key(owner, kind);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&key).await.map_err(FlitError::from)?;
        Ok(exists)
    }

    /// Atomically replaces a user's `own` feed snapshot used during a
    /// cold-cache rebuild, so concurrent readers never see a partially
    /// populated set.
    pub async fn replace(
        &self,
        owner: Uuid,
        kind: FeedKind,
        entries: &[(Uuid, f64)],
        max_size: usize,
    ) -> Result<()> {
        let key = feed_key(owner, kind);
        let tmp_key = format!("{key}:rebuild:{}", Uuid::new_v4());
        let mut conn = self.conn.clone();

        if !entries.is_empty() {
            let members: Vec<(f64, String)> = entries
                .iter()
                .map(|(id, score)| (*score, id.to_string()))
                .collect();
            let _: () = conn.zadd_multiple(&tmp_key, &members).await.map_err(FlitError::from)?;
            let _: () = conn
                .zremrangebyrank(&tmp_key, 0, -(max_size as isize) - 1)
                .await
                .map_err(FlitError::from)?;
        }

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .rename_nx(&tmp_key, &key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }
}

const CELEBRITY_SET_KEY: &str = "celebrities";

/// Tracks authors marked "celebrity" by a Hybrid fan-out decision, so
/// the Feed Assembler knows to pull-merge their recent posts at read
/// time in addition to whatever was pushed (spec §4.5: "mark the author
/// as celebrity so future reads also pull").
#[derive(Clone)]
pub struct CelebrityRegistry {
    conn: ConnectionManager,
}

impl CelebrityRegistry {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn mark(&self, author_id: Uuid) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .sadd(CELEBRITY_SET_KEY, author_id.to_string())
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }

    pub async fn is_celebrity(&self, author_id: Uuid) -> Result<bool> {
        let mut conn = self.conn.clone();
        let is_member: bool = conn
            .sismember(CELEBRITY_SET_KEY, author_id.to_string())
            .await
            .map_err(FlitError::from)?;
        Ok(is_member)
    }

}

/// Distributed lock (spec §4.11): `SET key token NX PX ttl`, released by
/// a check-then-delete Lua script so a caller never releases a lock it
/// no longer owns (e.g. after its own TTL already expired and someone
/// else acquired it).
#[derive(Clone)]
pub struct DistributedLock {
    conn: ConnectionManager,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

pub struct LockGuard {
    key: String,
    token: String,
}

impl DistributedLock {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Attempts to acquire `key` for `ttl_secs`. Returns `None` on
    /// contention (the caller should poll briefly and retry against the
    /// cached read path per the thundering-herd note in spec §7).
    pub async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<Option<LockGuard>> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_secs * 1000)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(FlitError::from)?
            .is_some();

        if acquired {
            Ok(Some(LockGuard {
                key: key.to_string(),
                token,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, guard: LockGuard) -> Result<()> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        let _: i64 = script
            .key(&guard.key)
            .arg(&guard.token)
            .invoke_async(&mut conn)
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }
}
